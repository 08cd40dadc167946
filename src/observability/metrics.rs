//! # Metrics
//!
//! Dispatch metrics recorded through the `metrics` facade. Nothing is exported
//! unless the embedding process installs a recorder.

use metrics::{counter, gauge, histogram};

/// Records dispatch activity
#[derive(Debug, Clone, Copy)]
pub struct DispatchMetrics {
    enabled: bool,
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DispatchMetrics {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record an upsert outcome for a resource kind
    pub fn record_upsert(&self, kind: &str, success: bool) {
        if !self.enabled {
            return;
        }
        let status = if success { "success" } else { "error" };
        let labels = [("kind", kind.to_string()), ("status", status.to_string())];
        counter!("dispatch_upserts_total", &labels).increment(1);
    }

    /// Record a delete for a resource kind
    pub fn record_delete(&self, kind: &str, existed: bool) {
        if !self.enabled {
            return;
        }
        let labels = [("kind", kind.to_string()), ("existed", existed.to_string())];
        counter!("dispatch_deletes_total", &labels).increment(1);
    }

    /// Record a snapshot rebuild with its duration in seconds
    pub fn record_snapshot_build(&self, success: bool, duration: f64) {
        if !self.enabled {
            return;
        }
        let status = if success { "success" } else { "inconsistent" };
        let labels = [("status", status.to_string())];
        counter!("dispatch_snapshot_builds_total", &labels).increment(1);
        histogram!("dispatch_snapshot_build_duration_seconds").record(duration);
    }

    /// Record the number of stored resources
    pub fn record_store_size(&self, resources: usize) {
        if !self.enabled {
            return;
        }
        gauge!("dispatch_stored_resources").set(resources as f64);
    }

    /// Record the number of compiled items currently carrying an error
    pub fn record_compiled_errors(&self, errors: usize) {
        if !self.enabled {
            return;
        }
        gauge!("dispatch_compiled_errors").set(errors as f64);
    }
}
