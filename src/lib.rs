//! # Flowplane Dispatch
//!
//! Translation core of the Flowplane control plane: declarative resources go in,
//! consistent versioned Envoy snapshots come out.
//!
//! ## Architecture
//!
//! ```text
//! manifests → TransformRegistry → CompiledStore → SnapshotBuilder → Snapshot
//!                                       ↓
//!                                error aggregation
//! ```
//!
//! ## Core Components
//!
//! - **Transform registry**: one compilation function per resource kind
//! - **Compiled store**: compiled fragments keyed by `(kind, namespace, name)`
//! - **Snapshot builder**: cluster synthesis, route assembly, consistency checks
//! - **Shared dispatcher**: mutex-guarded handle with change notifications
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use flowplane_dispatch::{CompiledConfig, DispatchConfig, Dispatcher, Result};
//!
//! fn main() -> Result<()> {
//!     let config = DispatchConfig::from_env();
//!     config.validate()?;
//!     let mut dispatcher = Dispatcher::with_config(&config);
//!     dispatcher.register("Mapping", CompiledConfig::for_resource)?;
//!     dispatcher.upsert_yaml("kind: Mapping\nmetadata:\n  name: echo\n")?;
//!     let (version, _snapshot) = dispatcher.get_snapshot()?;
//!     println!("published {version}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod observability;
pub mod xds;

// Re-export commonly used types and traits
pub use config::{DispatchConfig, MissingEndpointPolicy, ObservabilityConfig};
pub use errors::{Error, Result};
pub use observability::{init_logging, DispatchMetrics};
pub use xds::dispatch::{
    CompiledConfig, CompiledItem, DispatchEvent, Dispatcher, ErrorReport, RawResource,
    ResourceKey, SharedDispatcher, Snapshot,
};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
