//! Envoy xDS resource construction and dispatch
//!
//! - [`cluster`], [`listener`], [`route`]: builders for the Envoy resources the
//!   snapshot publishes
//! - [`resources`]: type URLs and `Any` packing
//! - [`dispatch`]: resource compilation and snapshot assembly

pub mod cluster;
pub mod dispatch;
pub mod listener;
pub mod resources;
pub mod route;

pub use dispatch::{Dispatcher, SharedDispatcher, Snapshot};
pub use resources::BuiltResource;
