//! Route helpers using envoy-types
//!
//! Builders for the route entries transforms contribute, and extraction of the
//! clusters a route entry sends traffic to.

use envoy_types::pb::envoy::config::route::v3::{
    route::Action, route_action::ClusterSpecifier, route_match::PathSpecifier,
    weighted_cluster::ClusterWeight, Route, RouteAction, RouteMatch, WeightedCluster,
};
use envoy_types::pb::google::protobuf::UInt32Value;

/// Build a prefix route forwarding to a single cluster
pub fn cluster_route(name: &str, prefix: &str, cluster: &str) -> Route {
    #[allow(deprecated)]
    let route_action = RouteAction {
        cluster_specifier: Some(ClusterSpecifier::Cluster(cluster.to_string())),
        ..Default::default()
    };

    prefix_route(name, prefix, route_action)
}

/// Build a prefix route splitting traffic across weighted clusters
pub fn weighted_route(name: &str, prefix: &str, clusters: &[(&str, u32)]) -> Route {
    let weights = clusters
        .iter()
        .map(|(cluster, weight)| ClusterWeight {
            name: cluster.to_string(),
            weight: Some(UInt32Value { value: *weight }),
            ..Default::default()
        })
        .collect();

    #[allow(deprecated)]
    let route_action = RouteAction {
        cluster_specifier: Some(ClusterSpecifier::WeightedClusters(WeightedCluster {
            clusters: weights,
            ..Default::default()
        })),
        ..Default::default()
    };

    prefix_route(name, prefix, route_action)
}

fn prefix_route(name: &str, prefix: &str, route_action: RouteAction) -> Route {
    Route {
        name: name.to_string(),
        r#match: Some(RouteMatch {
            path_specifier: Some(PathSpecifier::Prefix(prefix.to_string())),
            ..Default::default()
        }),
        action: Some(Action::Route(route_action)),
        ..Default::default()
    }
}

/// Cluster names a route entry forwards to, in declaration order
pub fn referenced_clusters(route: &Route) -> Vec<&str> {
    let route_action = match route.action.as_ref() {
        Some(Action::Route(route_action)) => route_action,
        _ => return Vec::new(),
    };

    match route_action.cluster_specifier.as_ref() {
        Some(ClusterSpecifier::Cluster(name)) => vec![name.as_str()],
        Some(ClusterSpecifier::WeightedClusters(weighted)) => {
            weighted.clusters.iter().map(|c| c.name.as_str()).collect()
        }
        _ => Vec::new(),
    }
}
