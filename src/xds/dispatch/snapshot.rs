//! Immutable, versioned bundle of the four xDS resource collections.

use envoy_types::pb::envoy::config::cluster::v3::Cluster;
use envoy_types::pb::envoy::config::endpoint::v3::ClusterLoadAssignment;
use envoy_types::pb::envoy::config::listener::v3::Listener;
use envoy_types::pb::envoy::config::route::v3::RouteConfiguration;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::errors::{Error, Result};
use crate::xds::cluster::eds_service_name;
use crate::xds::listener::{inline_route_config, rds_route_config_name};
use crate::xds::resources::{
    BuiltResource, CLUSTER_TYPE_URL, ENDPOINT_TYPE_URL, LISTENER_TYPE_URL, ROUTE_TYPE_URL,
};
use crate::xds::route::referenced_clusters;

/// Endpoints, clusters, route configurations and listeners at one version.
///
/// Each collection is keyed by resource name; a later resource with the same
/// name replaces an earlier one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    version: String,
    endpoints: BTreeMap<String, ClusterLoadAssignment>,
    clusters: BTreeMap<String, Cluster>,
    routes: BTreeMap<String, RouteConfiguration>,
    listeners: BTreeMap<String, Listener>,
}

impl Snapshot {
    pub fn new(
        version: impl Into<String>,
        endpoints: Vec<ClusterLoadAssignment>,
        clusters: Vec<Cluster>,
        routes: Vec<RouteConfiguration>,
        listeners: Vec<Listener>,
    ) -> Self {
        Self {
            version: version.into(),
            endpoints: index("endpoint", endpoints, |e| e.cluster_name.clone()),
            clusters: index("cluster", clusters, |c| c.name.clone()),
            routes: index("route_configuration", routes, |r| r.name.clone()),
            listeners: index("listener", listeners, |l| l.name.clone()),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn endpoints(&self) -> &BTreeMap<String, ClusterLoadAssignment> {
        &self.endpoints
    }

    pub fn clusters(&self) -> &BTreeMap<String, Cluster> {
        &self.clusters
    }

    pub fn route_configurations(&self) -> &BTreeMap<String, RouteConfiguration> {
        &self.routes
    }

    pub fn listeners(&self) -> &BTreeMap<String, Listener> {
        &self.listeners
    }

    pub fn load_assignment(&self, cluster_name: &str) -> Option<&ClusterLoadAssignment> {
        self.endpoints.get(cluster_name)
    }

    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.get(name)
    }

    pub fn route_configuration(&self, name: &str) -> Option<&RouteConfiguration> {
        self.routes.get(name)
    }

    pub fn listener(&self, name: &str) -> Option<&Listener> {
        self.listeners.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
            && self.clusters.is_empty()
            && self.routes.is_empty()
            && self.listeners.is_empty()
    }

    /// Check that every cross-collection name reference resolves.
    ///
    /// EDS clusters and endpoint assignments must pair up one to one, route
    /// configurations must pair up with the RDS names of listeners, and every
    /// cluster a route forwards to must be present.
    pub fn consistent(&self) -> Result<()> {
        let mut problems = Vec::new();

        let eds_names: BTreeSet<&str> = self.clusters.values().filter_map(eds_service_name).collect();
        for name in &eds_names {
            if !self.endpoints.contains_key(*name) {
                problems.push(format!("cluster '{}' has no endpoint assignment", name));
            }
        }
        for name in self.endpoints.keys() {
            if !eds_names.contains(name.as_str()) {
                problems.push(format!("endpoint assignment '{}' has no cluster", name));
            }
        }

        let rds_names: BTreeSet<String> =
            self.listeners.values().filter_map(rds_route_config_name).collect();
        for name in &rds_names {
            if !self.routes.contains_key(name) {
                problems.push(format!("route configuration '{}' is missing", name));
            }
        }
        for name in self.routes.keys() {
            if !rds_names.contains(name) {
                problems.push(format!("route configuration '{}' is not used by any listener", name));
            }
        }

        for route_config in self.routes.values() {
            for cluster in self.unknown_clusters(route_config) {
                problems.push(format!(
                    "route configuration '{}' references unknown cluster '{}'",
                    route_config.name, cluster
                ));
            }
        }
        for listener in self.listeners.values() {
            let Some(route_config) = inline_route_config(listener) else { continue };
            for cluster in self.unknown_clusters(&route_config) {
                problems.push(format!(
                    "listener '{}' routes inline to unknown cluster '{}'",
                    listener.name, cluster
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::inconsistent(&self.version, problems.join("; ")))
        }
    }

    fn unknown_clusters(&self, route_config: &RouteConfiguration) -> Vec<String> {
        route_config
            .virtual_hosts
            .iter()
            .flat_map(|vhost| vhost.routes.iter())
            .flat_map(referenced_clusters)
            .filter(|cluster| !self.clusters.contains_key(*cluster))
            .map(str::to_string)
            .collect()
    }

    /// Encode one collection for the distribution server; unknown type URLs yield nothing
    pub fn resources(&self, type_url: &str) -> Vec<BuiltResource> {
        match type_url {
            ENDPOINT_TYPE_URL => encode(type_url, &self.endpoints),
            CLUSTER_TYPE_URL => encode(type_url, &self.clusters),
            ROUTE_TYPE_URL => encode(type_url, &self.routes),
            LISTENER_TYPE_URL => encode(type_url, &self.listeners),
            _ => Vec::new(),
        }
    }
}

fn index<T>(collection: &str, items: Vec<T>, name: impl Fn(&T) -> String) -> BTreeMap<String, T> {
    let mut indexed = BTreeMap::new();
    for item in items {
        if indexed.insert(name(&item), item).is_some() {
            warn!(collection, "Duplicate resource name in snapshot; keeping the last one");
        }
    }
    indexed
}

fn encode<M: prost::Message>(type_url: &str, items: &BTreeMap<String, M>) -> Vec<BuiltResource> {
    items.iter().map(|(name, item)| BuiltResource::new(name.clone(), type_url, item)).collect()
}
