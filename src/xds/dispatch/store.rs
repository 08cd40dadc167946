use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

use crate::errors::{Error, Result};
use crate::xds::dispatch::compiled::{Compiled, CompiledConfig};
use crate::xds::dispatch::key::ResourceKey;
use crate::xds::dispatch::manifest::RawResource;
use crate::xds::dispatch::registry::{Transform, TransformRegistry};

/// Compiled output keyed by source resource.
///
/// Iteration follows key order, which makes snapshot content deterministic.
#[derive(Debug, Default)]
pub struct CompiledStore {
    configs: BTreeMap<ResourceKey, CompiledConfig>,
}

impl CompiledStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `resource` with its kind's transform and replace any previous entry.
    ///
    /// On error the store is left untouched.
    pub fn upsert(
        &mut self,
        registry: &TransformRegistry,
        resource: &RawResource,
    ) -> Result<&CompiledConfig> {
        let transform =
            registry.get(&resource.kind).ok_or_else(|| Error::unknown_kind(&resource.kind))?;

        let key = resource.key();
        let mut config = compile(transform, resource, &key)?;
        config.item.source = key.clone();

        debug!(
            resource = %key,
            listeners = config.listeners.len(),
            routes = config.routes.len(),
            load_assignments = config.load_assignments.len(),
            error = config.error().unwrap_or(""),
            "Compiled resource"
        );

        self.configs.insert(key.clone(), config);
        Ok(&self.configs[&key])
    }

    /// Remove the entry for `key`, returning it if present
    pub fn remove(&mut self, key: &ResourceKey) -> Option<CompiledConfig> {
        self.configs.remove(key)
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&CompiledConfig> {
        self.configs.get(key)
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.configs.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceKey, &CompiledConfig)> {
        self.configs.iter()
    }

    pub fn configs(&self) -> impl Iterator<Item = &CompiledConfig> {
        self.configs.values()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

/// Run a transform, turning a panic into an error naming the resource
fn compile(transform: &Transform, resource: &RawResource, key: &ResourceKey) -> Result<CompiledConfig> {
    catch_unwind(AssertUnwindSafe(|| transform(resource))).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        warn!(resource = %key, error = %message, "Transform panicked");
        Error::internal_compilation(key.to_string(), message)
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "transform panicked".to_string()
    }
}
