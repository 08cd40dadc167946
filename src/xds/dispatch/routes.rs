//! Route table assembly for listeners that delegate routing over RDS.

use envoy_types::pb::envoy::config::route::v3::{RouteConfiguration, VirtualHost};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

use crate::xds::dispatch::compiled::{Compiled, CompiledListener, CompiledRoute};
use crate::xds::dispatch::store::{panic_message, CompiledStore};
use crate::xds::listener::rds_route_config_name;

/// Build the route table a delegated listener expects.
///
/// Returns `None` when the listener carries its routes inline. The table has a
/// single virtual host named like the table, serving the listener's domains with
/// the entries of every compiled route its predicate selects, in store order.
pub fn route_configuration(
    listener: &CompiledListener,
    store: &CompiledStore,
) -> Option<RouteConfiguration> {
    let rds_name = rds_route_config_name(&listener.listener)?;

    let mut routes = Vec::new();
    let mut selected = 0usize;
    let candidates = store
        .configs()
        .filter(|config| config.is_ok())
        .flat_map(|config| config.routes.iter())
        .filter(|route| route.is_ok());
    for route in candidates {
        if selects(listener, route) {
            selected += 1;
            routes.extend(route.routes.iter().cloned());
        }
    }

    debug!(
        listener = %listener.listener.name,
        route_config = %rds_name,
        compiled_routes = selected,
        route_entries = routes.len(),
        "Assembled route configuration"
    );

    Some(RouteConfiguration {
        name: rds_name.clone(),
        virtual_hosts: vec![VirtualHost {
            name: rds_name,
            domains: listener.domains.clone(),
            routes,
            ..Default::default()
        }],
        ..Default::default()
    })
}

/// Run the listener's predicate; a panicking predicate selects nothing
fn selects(listener: &CompiledListener, route: &CompiledRoute) -> bool {
    catch_unwind(AssertUnwindSafe(|| listener.matches(route))).unwrap_or_else(|payload| {
        warn!(
            listener = %listener.listener.name,
            resource = %listener.item.source,
            route = %route.item.source,
            error = %panic_message(payload.as_ref()),
            "Route predicate panicked; route not selected"
        );
        false
    })
}
