//! Thread-safe handle around [`Dispatcher`] that announces changes to subscribers.

use envoy_types::pb::envoy::config::listener::v3::Listener;
use envoy_types::pb::envoy::config::route::v3::RouteConfiguration;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::errors::Result;
use crate::xds::dispatch::diagnostics::ErrorReport;
use crate::xds::dispatch::manifest::RawResource;
use crate::xds::dispatch::snapshot::Snapshot;
use crate::xds::dispatch::Dispatcher;

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Broadcast to subscribers of a [`SharedDispatcher`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchEvent {
    /// The store changed; the next snapshot read rebuilds
    Invalidated,
    /// A snapshot read rebuilt and published `version`
    SnapshotBuilt { version: String },
}

#[derive(Clone, Debug)]
pub struct SharedDispatcher {
    inner: Arc<Mutex<Dispatcher>>,
    events: broadcast::Sender<DispatchEvent>,
}

impl SharedDispatcher {
    pub fn new(dispatcher: Dispatcher) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { inner: Arc::new(Mutex::new(dispatcher)), events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    /// Run `f` with exclusive access to the dispatcher
    pub fn with<R>(&self, f: impl FnOnce(&mut Dispatcher) -> R) -> R {
        let mut dispatcher = self.inner.lock().expect("dispatcher lock poisoned");
        f(&mut dispatcher)
    }

    pub fn upsert(&self, resource: &RawResource) -> Result<()> {
        self.with(|dispatcher| dispatcher.upsert(resource))?;
        self.notify(DispatchEvent::Invalidated);
        Ok(())
    }

    pub fn upsert_yaml(&self, manifests: &str) -> Result<usize> {
        // A partial failure still leaves earlier resources upserted.
        let (result, changed) = self.with(|dispatcher| {
            let result = dispatcher.upsert_yaml(manifests);
            (result, dispatcher.needs_rebuild())
        });
        if changed {
            self.notify(DispatchEvent::Invalidated);
        }
        result
    }

    pub fn delete(&self, resource: &RawResource) {
        self.with(|dispatcher| dispatcher.delete(resource));
        self.notify(DispatchEvent::Invalidated);
    }

    pub fn delete_key(&self, kind: &str, namespace: &str, name: &str) {
        self.with(|dispatcher| dispatcher.delete_key(kind, namespace, name));
        self.notify(DispatchEvent::Invalidated);
    }

    pub fn get_snapshot(&self) -> Result<(String, Arc<Snapshot>)> {
        let (rebuilt, result) = self.with(|dispatcher| {
            let rebuilt = dispatcher.needs_rebuild();
            (rebuilt, dispatcher.get_snapshot())
        });

        let (version, snapshot) = result?;
        if rebuilt {
            self.notify(DispatchEvent::SnapshotBuilt { version: version.clone() });
        }
        Ok((version, snapshot))
    }

    pub fn get_listener(&self, name: &str) -> Result<Option<Listener>> {
        let (_, snapshot) = self.get_snapshot()?;
        Ok(snapshot.listener(name).cloned())
    }

    pub fn get_route_configuration(&self, name: &str) -> Result<Option<RouteConfiguration>> {
        let (_, snapshot) = self.get_snapshot()?;
        Ok(snapshot.route_configuration(name).cloned())
    }

    pub fn error_report(&self) -> Vec<ErrorReport> {
        self.with(|dispatcher| dispatcher.error_report())
    }

    fn notify(&self, event: DispatchEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}
