//! Cluster synthesis using envoy-types
//!
//! Clusters are never compiled per resource. Every cluster name referenced by a
//! compiled route becomes an EDS cluster whose endpoints arrive over ADS.

use envoy_types::pb::envoy::config::cluster::v3::{
    cluster::{ClusterDiscoveryType, DiscoveryType, EdsClusterConfig},
    Cluster,
};
use envoy_types::pb::envoy::config::core::v3::{
    address, config_source::ConfigSourceSpecifier, socket_address, Address,
    AggregatedConfigSource, ApiVersion, ConfigSource, SocketAddress,
};
use envoy_types::pb::envoy::config::endpoint::v3::{
    lb_endpoint, ClusterLoadAssignment, Endpoint, LbEndpoint, LocalityLbEndpoints,
};
use envoy_types::pb::google::protobuf::Duration;

/// Config source pointing at the aggregated discovery stream
pub fn ads_config_source() -> ConfigSource {
    ConfigSource {
        config_source_specifier: Some(ConfigSourceSpecifier::Ads(AggregatedConfigSource::default())),
        resource_api_version: ApiVersion::V3 as i32,
        ..Default::default()
    }
}

/// Build the EDS cluster synthesized for a referenced cluster name
pub fn eds_cluster(name: &str, connect_timeout: std::time::Duration) -> Cluster {
    Cluster {
        name: name.to_string(),
        connect_timeout: Some(Duration {
            seconds: i64::try_from(connect_timeout.as_secs()).unwrap_or(i64::MAX),
            nanos: i32::try_from(connect_timeout.subsec_nanos()).unwrap_or_default(),
        }),
        cluster_discovery_type: Some(ClusterDiscoveryType::Type(DiscoveryType::Eds as i32)),
        eds_cluster_config: Some(EdsClusterConfig {
            eds_config: Some(ads_config_source()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Name of the load assignment an EDS cluster expects, `None` for other discovery types
pub fn eds_service_name(cluster: &Cluster) -> Option<&str> {
    match cluster.cluster_discovery_type {
        Some(ClusterDiscoveryType::Type(t)) if t == DiscoveryType::Eds as i32 => {
            match cluster.eds_cluster_config.as_ref() {
                Some(eds) if !eds.service_name.is_empty() => Some(eds.service_name.as_str()),
                _ => Some(cluster.name.as_str()),
            }
        }
        _ => None,
    }
}

/// Load assignment for `cluster` with one locality holding `endpoints` as `(host, port)`
pub fn load_assignment(cluster: &str, endpoints: &[(&str, u32)]) -> ClusterLoadAssignment {
    let lb_endpoints = endpoints
        .iter()
        .map(|(host, port)| LbEndpoint {
            host_identifier: Some(lb_endpoint::HostIdentifier::Endpoint(Endpoint {
                address: Some(Address {
                    address: Some(address::Address::SocketAddress(SocketAddress {
                        address: host.to_string(),
                        port_specifier: Some(socket_address::PortSpecifier::PortValue(*port)),
                        ..Default::default()
                    })),
                }),
                ..Default::default()
            })),
            ..Default::default()
        })
        .collect::<Vec<_>>();

    let localities = if lb_endpoints.is_empty() {
        Vec::new()
    } else {
        vec![LocalityLbEndpoints { lb_endpoints, ..Default::default() }]
    };

    ClusterLoadAssignment { cluster_name: cluster.to_string(), endpoints: localities, ..Default::default() }
}
