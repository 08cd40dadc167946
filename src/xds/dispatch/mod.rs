//! # Resource Dispatch
//!
//! Compiles declarative resources into Envoy configuration fragments and
//! assembles the fragments into consistent, versioned snapshots.
//!
//! ```text
//! upsert/delete ──► TransformRegistry ──► CompiledStore ──► SnapshotBuilder ──► Snapshot
//!                                               │                 │
//!                                               ▼                 ▼
//!                                        collect_errors    route_configuration
//! ```
//!
//! [`Dispatcher`] is single-writer: every method that may rebuild the snapshot
//! takes `&mut self`. Use [`SharedDispatcher`] when mutations and snapshot reads
//! come from different threads.

pub mod builder;
pub mod compiled;
pub mod diagnostics;
pub mod key;
pub mod manifest;
pub mod registry;
pub mod routes;
pub mod shared;
pub mod snapshot;
pub mod store;

pub use builder::SnapshotBuilder;
pub use compiled::{
    ClusterRef, Compiled, CompiledCluster, CompiledConfig, CompiledItem, CompiledListener,
    CompiledLoadAssignment, CompiledRoute, RoutePredicate,
};
pub use diagnostics::{collect_errors, error_report, ErrorReport};
pub use key::ResourceKey;
pub use manifest::{ManifestParser, RawResource, TypedResource, YamlManifestParser};
pub use registry::{Transform, TransformRegistry};
pub use shared::{DispatchEvent, SharedDispatcher};
pub use snapshot::Snapshot;
pub use store::CompiledStore;

use envoy_types::pb::envoy::config::listener::v3::Listener;
use envoy_types::pb::envoy::config::route::v3::RouteConfiguration;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::errors::Result;
use crate::observability::DispatchMetrics;

/// Transform registry, compiled store and snapshot builder behind one API
#[derive(Debug)]
pub struct Dispatcher {
    registry: TransformRegistry,
    store: CompiledStore,
    builder: SnapshotBuilder,
    metrics: DispatchMetrics,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_config(&DispatchConfig::default())
    }

    pub fn with_config(config: &DispatchConfig) -> Self {
        Self {
            registry: TransformRegistry::new(),
            store: CompiledStore::new(),
            builder: SnapshotBuilder::new(config),
            metrics: DispatchMetrics::new(config.observability.enable_metrics),
        }
    }

    /// Register the transform for `kind`; fails if the kind already has one
    pub fn register<F>(&mut self, kind: impl Into<String>, transform: F) -> Result<()>
    where
        F: Fn(&RawResource) -> CompiledConfig + Send + Sync + 'static,
    {
        self.registry.register(kind, transform)
    }

    /// Register a transform whose input is the payload decoded into `T`
    pub fn register_typed<T, F>(&mut self, kind: impl Into<String>, transform: F) -> Result<()>
    where
        T: DeserializeOwned + 'static,
        F: Fn(&TypedResource<T>) -> CompiledConfig + Send + Sync + 'static,
    {
        self.registry.register_typed(kind, transform)
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.registry.is_registered(kind)
    }

    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    /// Compile a new or updated resource and invalidate the snapshot.
    ///
    /// On error nothing changes, including any previously compiled state for the
    /// resource.
    pub fn upsert(&mut self, resource: &RawResource) -> Result<()> {
        let _span = crate::dispatch_span!("upsert", resource.key()).entered();

        match self.store.upsert(&self.registry, resource) {
            Ok(_) => {
                self.metrics.record_upsert(&resource.kind, true);
                self.metrics.record_store_size(self.store.len());
                self.builder.invalidate();
                Ok(())
            }
            Err(err) => {
                self.metrics.record_upsert(&resource.kind, false);
                warn!(resource = %resource.key(), error = %err, "Upsert rejected");
                Err(err)
            }
        }
    }

    /// Forget a resource; absent resources are ignored
    pub fn delete(&mut self, resource: &RawResource) {
        self.delete_resource_key(&resource.key());
    }

    /// Forget the resource identified by `(kind, namespace, name)`
    pub fn delete_key(&mut self, kind: &str, namespace: &str, name: &str) {
        self.delete_resource_key(&ResourceKey::new(kind, namespace, name));
    }

    fn delete_resource_key(&mut self, key: &ResourceKey) {
        let existed = self.store.remove(key).is_some();
        debug!(resource = %key, existed, "Deleted resource");

        self.metrics.record_delete(key.kind(), existed);
        self.metrics.record_store_size(self.store.len());
        self.builder.invalidate();
    }

    /// Parse YAML manifests and upsert each resource in order
    pub fn upsert_yaml(&mut self, manifests: &str) -> Result<usize> {
        self.upsert_bulk(&YamlManifestParser, manifests)
    }

    /// Parse manifests with `parser` and upsert each resource in order.
    ///
    /// Stops at the first error; resources upserted before it stay in place.
    pub fn upsert_bulk<P>(&mut self, parser: &P, manifests: &str) -> Result<usize>
    where
        P: ManifestParser + ?Sized,
    {
        let resources = parser.parse(manifests)?;
        for resource in &resources {
            self.upsert(resource)?;
        }

        info!(resources = resources.len(), "Upserted manifests");
        Ok(resources.len())
    }

    pub fn compiled(&self, kind: &str, namespace: &str, name: &str) -> Option<&CompiledConfig> {
        self.store.get(&ResourceKey::new(kind, namespace, name))
    }

    pub fn store(&self) -> &CompiledStore {
        &self.store
    }

    /// Every compiled entity whose error slot is set
    pub fn get_errors(&self) -> Vec<&CompiledItem> {
        let errors = collect_errors(&self.store);
        self.metrics.record_compiled_errors(errors.len());
        errors
    }

    pub fn error_report(&self) -> Vec<ErrorReport> {
        self.get_errors().into_iter().map(ErrorReport::from).collect()
    }

    /// Whether the next [`Dispatcher::get_snapshot`] call rebuilds
    pub fn needs_rebuild(&self) -> bool {
        self.builder.is_dirty()
    }

    /// The current version and snapshot, rebuilding if anything changed.
    ///
    /// `Error::Inconsistent` is fatal: the store produced a snapshot with a
    /// dangling reference and nothing was published.
    pub fn get_snapshot(&mut self) -> Result<(String, Arc<Snapshot>)> {
        self.builder.snapshot(&self.store)
    }

    pub fn get_listener(&mut self, name: &str) -> Result<Option<Listener>> {
        let (_, snapshot) = self.get_snapshot()?;
        Ok(snapshot.listener(name).cloned())
    }

    pub fn get_route_configuration(&mut self, name: &str) -> Result<Option<RouteConfiguration>> {
        let (_, snapshot) = self.get_snapshot()?;
        Ok(snapshot.route_configuration(name).cloned())
    }
}
