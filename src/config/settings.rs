//! # Configuration Settings
//!
//! Defines the configuration structure for the dispatch core.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

/// Environment variable prefix for every dispatch setting
pub const ENV_PREFIX: &str = "FLOWPLANE_DISPATCH_";

/// Main dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatchConfig {
    /// Connect timeout applied to every synthesized cluster
    #[validate(range(
        min = 1,
        max = 300,
        message = "Connect timeout must be between 1 and 300 seconds"
    ))]
    pub cluster_connect_timeout_seconds: u64,

    /// Prefix of the snapshot version string (`v` gives `v1`, `v2`, ...)
    #[validate(length(min = 1, message = "Version prefix cannot be empty"))]
    pub version_prefix: String,

    /// What to do with a referenced cluster that has no load assignment
    pub missing_endpoints: MissingEndpointPolicy,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            cluster_connect_timeout_seconds: 10,
            version_prefix: "v".to_string(),
            missing_endpoints: MissingEndpointPolicy::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl DispatchConfig {
    /// Create DispatchConfig from environment variables.
    ///
    /// Unset or unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cluster_connect_timeout_seconds = env_var("CLUSTER_CONNECT_TIMEOUT_SECONDS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.cluster_connect_timeout_seconds);

        let version_prefix = env_var("VERSION_PREFIX").unwrap_or(defaults.version_prefix);

        let missing_endpoints = env_var("MISSING_ENDPOINTS")
            .and_then(|s| s.parse::<MissingEndpointPolicy>().ok())
            .unwrap_or(defaults.missing_endpoints);

        Self {
            cluster_connect_timeout_seconds,
            version_prefix,
            missing_endpoints,
            observability: ObservabilityConfig::from_env(),
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;

        if self.version_prefix.chars().any(|c| c.is_ascii_digit()) {
            return Err(Error::config("Version prefix cannot contain digits"));
        }

        Ok(())
    }

    /// Connect timeout for synthesized clusters as Duration
    pub fn cluster_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.cluster_connect_timeout_seconds)
    }
}

/// Handling of a cluster referenced by a route with no compiled load assignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingEndpointPolicy {
    /// Publish an empty load assignment for the cluster
    #[default]
    Empty,
    /// Fail the snapshot build
    Reject,
}

impl FromStr for MissingEndpointPolicy {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "empty" => Ok(Self::Empty),
            "reject" => Ok(Self::Reject),
            other => Err(Error::config(format!("Unknown missing endpoint policy '{}'", other))),
        }
    }
}

/// Observability configuration for logging and metrics
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Emit logs as JSON
    pub json_logging: bool,

    /// Record dispatch metrics
    pub enable_metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logging: false, enable_metrics: true }
    }
}

impl ObservabilityConfig {
    /// Create ObservabilityConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let log_level = env_var("LOG_LEVEL").unwrap_or(defaults.log_level);

        let json_logging = env_var("JSON_LOGGING")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(defaults.json_logging);

        let enable_metrics = env_var("ENABLE_METRICS")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(defaults.enable_metrics);

        Self { log_level, json_logging, enable_metrics }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, name)).ok()
}
