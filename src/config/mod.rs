//! # Configuration Management
//!
//! Configuration for the dispatch core: cluster synthesis, snapshot versioning,
//! the missing endpoint policy and observability.

pub mod settings;

pub use settings::{DispatchConfig, MissingEndpointPolicy, ObservabilityConfig};
