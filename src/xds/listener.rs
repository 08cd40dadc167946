//! Listener helpers using envoy-types
//!
//! Builders for HTTP listeners that either delegate routing to a named route
//! configuration (RDS) or embed their routes inline, and detection of the
//! delegated mode on an already built listener.

use envoy_types::pb::envoy::config::core::v3::{
    address::Address as AddressType, socket_address::PortSpecifier, Address, SocketAddress,
};
use envoy_types::pb::envoy::config::listener::v3::{filter::ConfigType, Filter, FilterChain, Listener};
use envoy_types::pb::envoy::config::route::v3::RouteConfiguration;
use envoy_types::pb::envoy::extensions::filters::http::router::v3::Router as RouterFilter;
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::{
    http_connection_manager::{CodecType, RouteSpecifier},
    http_filter::ConfigType as HttpFilterConfigType,
    HttpConnectionManager, HttpFilter, Rds,
};
use prost::Message;
use tracing::debug;

use crate::xds::cluster::ads_config_source;
use crate::xds::resources::{any_from_message, HTTP_CONNECTION_MANAGER_TYPE_URL, ROUTER_TYPE_URL};

pub const HTTP_CONNECTION_MANAGER_FILTER_NAME: &str = "envoy.filters.network.http_connection_manager";
pub const ROUTER_FILTER_NAME: &str = "envoy.filters.http.router";

/// Where an HTTP listener gets its routes from
#[derive(Debug, Clone)]
pub enum RouteSource {
    /// Routes are served separately under this route configuration name
    Rds(String),
    /// Routes are embedded in the listener
    Inline(RouteConfiguration),
}

/// Build an HTTP listener with a single filter chain running the connection manager
pub fn http_listener(name: &str, address: &str, port: u32, routes: RouteSource) -> Listener {
    let route_specifier = match routes {
        RouteSource::Rds(route_config_name) => RouteSpecifier::Rds(Rds {
            route_config_name,
            config_source: Some(ads_config_source()),
        }),
        RouteSource::Inline(route_config) => RouteSpecifier::RouteConfig(route_config),
    };

    let hcm = HttpConnectionManager {
        route_specifier: Some(route_specifier),
        codec_type: CodecType::Auto as i32,
        stat_prefix: "ingress_http".to_string(),
        http_filters: vec![HttpFilter {
            name: ROUTER_FILTER_NAME.to_string(),
            is_optional: false,
            disabled: false,
            config_type: Some(HttpFilterConfigType::TypedConfig(any_from_message(
                ROUTER_TYPE_URL,
                &RouterFilter::default(),
            ))),
        }],
        ..Default::default()
    };

    Listener {
        name: name.to_string(),
        address: Some(Address {
            address: Some(AddressType::SocketAddress(SocketAddress {
                address: address.to_string(),
                port_specifier: Some(PortSpecifier::PortValue(port)),
                ..Default::default()
            })),
        }),
        filter_chains: vec![FilterChain {
            filters: vec![Filter {
                name: HTTP_CONNECTION_MANAGER_FILTER_NAME.to_string(),
                config_type: Some(ConfigType::TypedConfig(any_from_message(
                    HTTP_CONNECTION_MANAGER_TYPE_URL,
                    &hcm,
                ))),
            }],
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Route configuration name of a listener that delegates routing over RDS.
///
/// Returns `None` for listeners with inline routes or without a connection manager.
pub fn rds_route_config_name(listener: &Listener) -> Option<String> {
    connection_managers(listener).into_iter().find_map(|hcm| match hcm.route_specifier {
        Some(RouteSpecifier::Rds(rds)) => Some(rds.route_config_name),
        _ => None,
    })
}

/// Route configuration a listener carries inline, `None` when it delegates over RDS
pub fn inline_route_config(listener: &Listener) -> Option<RouteConfiguration> {
    connection_managers(listener).into_iter().find_map(|hcm| match hcm.route_specifier {
        Some(RouteSpecifier::RouteConfig(routes)) => Some(routes),
        _ => None,
    })
}

fn connection_managers(listener: &Listener) -> Vec<HttpConnectionManager> {
    listener
        .filter_chains
        .iter()
        .flat_map(|chain| chain.filters.iter())
        .filter(|filter| filter.name == HTTP_CONNECTION_MANAGER_FILTER_NAME)
        .filter_map(|filter| match filter.config_type.as_ref() {
            Some(ConfigType::TypedConfig(any)) if any.type_url == HTTP_CONNECTION_MANAGER_TYPE_URL => {
                match HttpConnectionManager::decode(any.value.as_slice()) {
                    Ok(hcm) => Some(hcm),
                    Err(err) => {
                        debug!(
                            listener = %listener.name,
                            error = %err,
                            "Skipping undecodable connection manager"
                        );
                        None
                    }
                }
            }
            _ => None,
        })
        .collect()
}
