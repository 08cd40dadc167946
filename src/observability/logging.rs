//! # Structured Logging
//!
//! Provides structured logging macros and subscriber setup using the tracing ecosystem.

use crate::config::{DispatchConfig, ObservabilityConfig};
use crate::errors::{Error, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Create a tracing span for dispatch operations.
///
/// ```rust,ignore
/// let span = dispatch_span!("upsert", "Mapping:default:echo");
/// let span = dispatch_span!("rebuild", "-", version = "v3");
/// ```
#[macro_export]
macro_rules! dispatch_span {
    ($operation:expr, $resource:expr) => {
        tracing::debug_span!(
            "dispatch_operation",
            operation = %$operation,
            resource = %$resource,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $resource:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "dispatch_operation",
            operation = %$operation,
            resource = %$resource,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Install the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. An already installed
/// global subscriber (e.g. from a test harness) is left in place.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            Error::config(format!("Invalid log level '{}': {}", config.log_level, e))
        })?,
    };

    let installed = if config.json_logging {
        tracing::subscriber::set_global_default(
            tracing_subscriber::fmt().json().with_env_filter(filter).finish(),
        )
    } else {
        tracing::subscriber::set_global_default(
            FmtSubscriber::builder().with_env_filter(filter).finish(),
        )
    };

    if installed.is_err() {
        // Subscriber already set elsewhere; ignore.
        tracing::debug!("Global tracing subscriber already installed");
    }
    Ok(())
}

/// Log configuration at startup
pub fn log_config_info(config: &DispatchConfig) {
    tracing::info!(
        cluster_connect_timeout_seconds = config.cluster_connect_timeout_seconds,
        version_prefix = %config.version_prefix,
        missing_endpoints = ?config.missing_endpoints,
        json_logging = config.observability.json_logging,
        metrics_enabled = config.observability.enable_metrics,
        "Dispatch core configuration"
    );
}
