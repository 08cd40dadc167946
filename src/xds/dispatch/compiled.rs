//! Compiled output of a single source resource.
//!
//! Every compiled entity carries a [`CompiledItem`]: the owning resource, the
//! sub-entity name and an optional error. An entity with an error is kept for
//! diagnostics but contributes nothing to snapshots.

use envoy_types::pb::envoy::config::cluster::v3::Cluster;
use envoy_types::pb::envoy::config::endpoint::v3::ClusterLoadAssignment;
use envoy_types::pb::envoy::config::listener::v3::Listener;
use envoy_types::pb::envoy::config::route::v3::Route;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::xds::dispatch::key::ResourceKey;
use crate::xds::dispatch::manifest::RawResource;
use crate::xds::route::referenced_clusters;

/// Selects the compiled routes that belong to a delegated listener's route table
pub type RoutePredicate = Arc<dyn Fn(&CompiledRoute) -> bool + Send + Sync>;

/// Identity and error slot shared by every compiled entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledItem {
    pub source: ResourceKey,
    pub name: String,
    pub error: Option<String>,
}

impl CompiledItem {
    pub fn new(source: ResourceKey, name: impl Into<String>) -> Self {
        Self { source, name: name.into(), error: None }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Access to the [`CompiledItem`] of a compiled entity
pub trait Compiled {
    fn item(&self) -> &CompiledItem;

    fn item_mut(&mut self) -> &mut CompiledItem;

    fn error(&self) -> Option<&str> {
        self.item().error.as_deref().filter(|e| !e.is_empty())
    }

    fn is_ok(&self) -> bool {
        self.error().is_none()
    }

    fn set_error(&mut self, error: impl Into<String>)
    where
        Self: Sized,
    {
        self.item_mut().error = Some(error.into());
    }
}

macro_rules! impl_compiled {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Compiled for $ty {
                fn item(&self) -> &CompiledItem {
                    &self.item
                }

                fn item_mut(&mut self) -> &mut CompiledItem {
                    &mut self.item
                }
            }
        )+
    };
}

impl_compiled!(
    CompiledConfig,
    CompiledListener,
    CompiledRoute,
    ClusterRef,
    CompiledCluster,
    CompiledLoadAssignment,
);

/// Everything one source resource compiled to
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    pub item: CompiledItem,
    pub listeners: Vec<CompiledListener>,
    pub routes: Vec<CompiledRoute>,
    pub clusters: Vec<CompiledCluster>,
    pub load_assignments: Vec<CompiledLoadAssignment>,
}

impl CompiledConfig {
    pub fn new(source: ResourceKey) -> Self {
        Self {
            item: CompiledItem::new(source, ""),
            listeners: Vec::new(),
            routes: Vec::new(),
            clusters: Vec::new(),
            load_assignments: Vec::new(),
        }
    }

    pub fn for_resource(resource: &RawResource) -> Self {
        Self::new(resource.key())
    }

    /// A config for a resource that could not be compiled at all
    pub fn failed(source: ResourceKey, error: impl Into<String>) -> Self {
        let mut config = Self::new(source);
        config.item.error = Some(error.into());
        config
    }

    pub fn source(&self) -> &ResourceKey {
        &self.item.source
    }

    pub fn with_listener(mut self, listener: CompiledListener) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn with_route(mut self, route: CompiledRoute) -> Self {
        self.routes.push(route);
        self
    }

    pub fn with_cluster(mut self, cluster: CompiledCluster) -> Self {
        self.clusters.push(cluster);
        self
    }

    pub fn with_load_assignment(mut self, load_assignment: CompiledLoadAssignment) -> Self {
        self.load_assignments.push(load_assignment);
        self
    }
}

/// A listener plus the routing inputs used when it delegates over RDS
#[derive(Clone)]
pub struct CompiledListener {
    pub item: CompiledItem,
    pub listener: Listener,
    pub domains: Vec<String>,
    pub predicate: RoutePredicate,
}

impl CompiledListener {
    pub fn new<P>(source: ResourceKey, listener: Listener, domains: Vec<String>, predicate: P) -> Self
    where
        P: Fn(&CompiledRoute) -> bool + Send + Sync + 'static,
    {
        Self {
            item: CompiledItem::new(source, listener.name.clone()),
            listener,
            domains,
            predicate: Arc::new(predicate),
        }
    }

    /// A listener with inline routes; it never selects compiled routes
    pub fn inline(source: ResourceKey, listener: Listener) -> Self {
        Self::new(source, listener, Vec::new(), |_| false)
    }

    pub fn matches(&self, route: &CompiledRoute) -> bool {
        (self.predicate)(route)
    }
}

impl fmt::Debug for CompiledListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledListener")
            .field("item", &self.item)
            .field("listener", &self.listener.name)
            .field("domains", &self.domains)
            .finish_non_exhaustive()
    }
}

/// Route entries contributed by a resource plus the clusters they target
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRoute {
    pub item: CompiledItem,
    pub routes: Vec<Route>,
    pub cluster_refs: Vec<ClusterRef>,
}

impl CompiledRoute {
    /// Build a compiled route, deriving one cluster ref per distinct target cluster
    pub fn new(source: ResourceKey, name: impl Into<String>, routes: Vec<Route>) -> Self {
        let mut cluster_refs: Vec<ClusterRef> = Vec::new();
        for cluster in routes.iter().flat_map(referenced_clusters) {
            if !cluster_refs.iter().any(|r| r.name == cluster) {
                cluster_refs.push(ClusterRef::new(source.clone(), cluster));
            }
        }

        Self { item: CompiledItem::new(source, name), routes, cluster_refs }
    }

    pub fn source(&self) -> &ResourceKey {
        &self.item.source
    }
}

/// A named reference from a compiled route to an upstream cluster
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRef {
    pub item: CompiledItem,
    pub name: String,
}

impl ClusterRef {
    pub fn new(source: ResourceKey, name: impl Into<String>) -> Self {
        let name = name.into();
        Self { item: CompiledItem::new(source, name.clone()), name }
    }
}

/// A cluster produced by a transform; only reported, never published
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCluster {
    pub item: CompiledItem,
    pub cluster: Cluster,
}

impl CompiledCluster {
    pub fn new(source: ResourceKey, cluster: Cluster) -> Self {
        Self { item: CompiledItem::new(source, cluster.name.clone()), cluster }
    }
}

/// Endpoints for the cluster named by `load_assignment.cluster_name`
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledLoadAssignment {
    pub item: CompiledItem,
    pub load_assignment: ClusterLoadAssignment,
}

impl CompiledLoadAssignment {
    pub fn new(source: ResourceKey, load_assignment: ClusterLoadAssignment) -> Self {
        Self { item: CompiledItem::new(source, load_assignment.cluster_name.clone()), load_assignment }
    }

    pub fn cluster_name(&self) -> &str {
        &self.load_assignment.cluster_name
    }
}
