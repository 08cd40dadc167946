//! Snapshot assembly with a single-slot cache.
//!
//! Mutations only mark the slot dirty; the rebuild happens on the next read so a
//! burst of changes costs one rebuild.

use envoy_types::pb::envoy::config::cluster::v3::Cluster;
use envoy_types::pb::envoy::config::endpoint::v3::ClusterLoadAssignment;
use envoy_types::pb::envoy::config::listener::v3::Listener;
use envoy_types::pb::envoy::config::route::v3::RouteConfiguration;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::{DispatchConfig, MissingEndpointPolicy};
use crate::errors::{Error, Result};
use crate::observability::DispatchMetrics;
use crate::xds::cluster::eds_cluster;
use crate::xds::dispatch::compiled::{Compiled, CompiledListener};
use crate::xds::dispatch::routes::route_configuration;
use crate::xds::dispatch::snapshot::Snapshot;
use crate::xds::dispatch::store::CompiledStore;

/// Owns the change counter and the cached snapshot
#[derive(Debug)]
pub struct SnapshotBuilder {
    connect_timeout: Duration,
    version_prefix: String,
    missing_endpoints: MissingEndpointPolicy,
    metrics: DispatchMetrics,
    change_count: u64,
    cached: Option<Arc<Snapshot>>,
}

impl SnapshotBuilder {
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            connect_timeout: config.cluster_connect_timeout(),
            version_prefix: config.version_prefix.clone(),
            missing_endpoints: config.missing_endpoints,
            metrics: DispatchMetrics::new(config.observability.enable_metrics),
            change_count: 0,
            cached: None,
        }
    }

    /// Drop the cached snapshot so the next read rebuilds
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn is_dirty(&self) -> bool {
        self.cached.is_none()
    }

    /// Number of rebuilds attempted so far
    pub fn change_count(&self) -> u64 {
        self.change_count
    }

    /// The cached snapshot, rebuilding it from `store` if it was invalidated.
    ///
    /// An inconsistent build is never cached. The version it consumed is not
    /// reused, so the next successful build still gets a fresh version.
    pub fn snapshot(&mut self, store: &CompiledStore) -> Result<(String, Arc<Snapshot>)> {
        if let Some(snapshot) = &self.cached {
            return Ok((snapshot.version().to_string(), snapshot.clone()));
        }

        self.change_count += 1;
        let version = format!("{}{}", self.version_prefix, self.change_count);
        let _span = crate::dispatch_span!("rebuild", "-", version = %version).entered();
        let started = Instant::now();

        let result = self.build(&version, store).and_then(|snapshot| {
            snapshot.consistent()?;
            Ok(snapshot)
        });
        self.metrics.record_snapshot_build(result.is_ok(), started.elapsed().as_secs_f64());

        match result {
            Ok(snapshot) => {
                info!(
                    version = %version,
                    listeners = snapshot.listeners().len(),
                    route_configurations = snapshot.route_configurations().len(),
                    clusters = snapshot.clusters().len(),
                    endpoints = snapshot.endpoints().len(),
                    "Built snapshot"
                );
                let snapshot = Arc::new(snapshot);
                self.cached = Some(snapshot.clone());
                Ok((version, snapshot))
            }
            Err(err) => {
                error!(version = %version, error = %err, "Snapshot build failed");
                Err(err)
            }
        }
    }

    fn build(&self, version: &str, store: &CompiledStore) -> Result<Snapshot> {
        let (clusters, endpoints) = self.correlate_clusters(version, store)?;
        let (listeners, routes) = assemble_listeners(store);

        Ok(Snapshot::new(version, endpoints, clusters, routes, listeners))
    }

    /// Synthesize one EDS cluster per referenced cluster name and pair it with the
    /// last load assignment compiled for that name
    fn correlate_clusters(
        &self,
        version: &str,
        store: &CompiledStore,
    ) -> Result<(Vec<Cluster>, Vec<ClusterLoadAssignment>)> {
        let mut assignments: BTreeMap<&str, &ClusterLoadAssignment> = BTreeMap::new();
        for la in store.configs().filter(|c| c.is_ok()).flat_map(|c| c.load_assignments.iter()) {
            if la.is_ok() {
                assignments.insert(la.cluster_name(), &la.load_assignment);
            }
        }

        let referenced: BTreeSet<&str> = store
            .configs()
            .filter(|config| config.is_ok())
            .flat_map(|config| config.routes.iter())
            .filter(|route| route.is_ok())
            .flat_map(|route| route.cluster_refs.iter())
            .filter(|cluster_ref| cluster_ref.is_ok())
            .map(|cluster_ref| cluster_ref.name.as_str())
            .collect();

        let mut clusters = Vec::with_capacity(referenced.len());
        let mut endpoints = Vec::with_capacity(referenced.len());
        for name in referenced {
            clusters.push(eds_cluster(name, self.connect_timeout));
            match assignments.get(name) {
                Some(assignment) => endpoints.push((*assignment).clone()),
                None => match self.missing_endpoints {
                    MissingEndpointPolicy::Empty => {
                        debug!(cluster = %name, version, "No load assignment; publishing empty endpoints");
                        endpoints.push(ClusterLoadAssignment {
                            cluster_name: name.to_string(),
                            ..Default::default()
                        });
                    }
                    MissingEndpointPolicy::Reject => {
                        return Err(Error::inconsistent(
                            version,
                            format!("cluster '{}' has no load assignment", name),
                        ));
                    }
                },
            }
        }

        Ok((clusters, endpoints))
    }
}

/// Listeners of every compiled resource plus the route tables of the delegated ones.
///
/// Listener names are unique in a snapshot, so when two resources produce the
/// same listener name only the later one is published and assembled. Route
/// table names are unique too: listeners sharing an RDS name are all served
/// the table of the last one.
fn assemble_listeners(store: &CompiledStore) -> (Vec<Listener>, Vec<RouteConfiguration>) {
    let mut by_name: BTreeMap<&str, &CompiledListener> = BTreeMap::new();
    let listeners = store.configs().filter(|c| c.is_ok()).flat_map(|c| c.listeners.iter());
    for listener in listeners {
        if !listener.is_ok() {
            continue;
        }
        if let Some(previous) = by_name.insert(&listener.listener.name, listener) {
            warn!(
                listener = %listener.listener.name,
                replaced = %previous.item.source,
                by = %listener.item.source,
                "Duplicate listener name"
            );
        }
    }

    let mut tables: BTreeMap<String, (&CompiledListener, RouteConfiguration)> = BTreeMap::new();
    for listener in by_name.values().copied() {
        let Some(table) = route_configuration(listener, store) else { continue };
        let name = table.name.clone();
        if let Some((previous, _)) = tables.insert(name.clone(), (listener, table)) {
            warn!(
                route_config = %name,
                listener = %listener.listener.name,
                replaced_listener = %previous.listener.name,
                "Listeners share a route configuration name; keeping the last one"
            );
        }
    }

    let listeners = by_name.values().map(|l| l.listener.clone()).collect();
    let routes = tables.into_values().map(|(_, table)| table).collect();
    (listeners, routes)
}
