use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

use crate::errors::{Error, Result};
use crate::xds::dispatch::compiled::CompiledConfig;
use crate::xds::dispatch::manifest::{RawResource, TypedResource};

/// Compiles one resource of a registered kind
pub type Transform = Box<dyn Fn(&RawResource) -> CompiledConfig + Send + Sync>;

/// Maps resource kinds to the transform that compiles them.
///
/// Registrations are permanent for the lifetime of the registry.
#[derive(Default)]
pub struct TransformRegistry {
    transforms: BTreeMap<String, Transform>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `kind` to a transform over the untyped resource
    pub fn register<F>(&mut self, kind: impl Into<String>, transform: F) -> Result<()>
    where
        F: Fn(&RawResource) -> CompiledConfig + Send + Sync + 'static,
    {
        let kind = kind.into();
        if self.transforms.contains_key(&kind) {
            return Err(Error::duplicate_transform(kind));
        }

        info!(kind = %kind, "Registered transform");
        self.transforms.insert(kind, Box::new(transform));
        Ok(())
    }

    /// Bind `kind` to a transform over a decoded payload.
    ///
    /// A payload that does not decode into `T` compiles to a config whose
    /// top-level error describes the decode failure.
    pub fn register_typed<T, F>(&mut self, kind: impl Into<String>, transform: F) -> Result<()>
    where
        T: DeserializeOwned + 'static,
        F: Fn(&TypedResource<T>) -> CompiledConfig + Send + Sync + 'static,
    {
        self.register(kind, move |resource: &RawResource| match resource.typed::<T>() {
            Ok(typed) => transform(&typed),
            Err(err) => CompiledConfig::failed(
                resource.key(),
                format!("invalid {} spec: {}", resource.kind, err),
            ),
        })
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.transforms.contains_key(kind)
    }

    pub fn get(&self, kind: &str) -> Option<&Transform> {
        self.transforms.get(kind)
    }

    /// Registered kinds in sorted order
    pub fn kinds(&self) -> Vec<&str> {
        self.transforms.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry").field("kinds", &self.kinds()).finish()
    }
}
