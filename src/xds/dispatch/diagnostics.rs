//! Collection of compiled entities that failed, for operator tooling.

use serde::Serialize;

use crate::xds::dispatch::compiled::{Compiled, CompiledItem};
use crate::xds::dispatch::store::CompiledStore;

/// Every compiled entity in `store` whose error slot is set.
///
/// Walks configs, listeners, routes, cluster refs, clusters and load assignments.
pub fn collect_errors(store: &CompiledStore) -> Vec<&CompiledItem> {
    let mut failed: Vec<&CompiledItem> = Vec::new();

    for config in store.configs() {
        push_failed(&mut failed, config);
        for listener in &config.listeners {
            push_failed(&mut failed, listener);
        }
        for route in &config.routes {
            push_failed(&mut failed, route);
            for cluster_ref in &route.cluster_refs {
                push_failed(&mut failed, cluster_ref);
            }
        }
        for cluster in &config.clusters {
            push_failed(&mut failed, cluster);
        }
        for load_assignment in &config.load_assignments {
            push_failed(&mut failed, load_assignment);
        }
    }

    failed
}

fn push_failed<'a, C: Compiled>(failed: &mut Vec<&'a CompiledItem>, compiled: &'a C) {
    if !compiled.is_ok() {
        failed.push(compiled.item());
    }
}

/// A failed compiled entity in a form operators can read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    /// Owning resource rendered as `kind:namespace:name`
    pub resource: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    /// Sub-entity name; empty when the whole resource failed
    pub item: String,
    pub error: String,
}

impl From<&CompiledItem> for ErrorReport {
    fn from(item: &CompiledItem) -> Self {
        Self {
            resource: item.source.to_string(),
            kind: item.source.kind().to_string(),
            namespace: item.source.namespace().to_string(),
            name: item.source.name().to_string(),
            item: item.name.clone(),
            error: item.error.clone().unwrap_or_default(),
        }
    }
}

pub fn error_report(store: &CompiledStore) -> Vec<ErrorReport> {
    collect_errors(store).into_iter().map(ErrorReport::from).collect()
}
