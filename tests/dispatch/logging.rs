use flowplane_dispatch::{DispatchConfig, MissingEndpointPolicy, RawResource};
use serde_json::json;
use tracing_test::traced_test;

use super::support::*;

#[traced_test]
#[test]
fn snapshot_build_is_logged_with_version() {
    let mut dispatcher = dispatcher();
    dispatcher.upsert(&mapping("echo", "svc-a")).unwrap();
    dispatcher.get_snapshot().unwrap();

    assert!(logs_contain("Registered transform"));
    assert!(logs_contain("Built snapshot"));
    assert!(logs_contain("version=v1"));
}

#[traced_test]
#[test]
fn rejected_upsert_is_logged() {
    let mut dispatcher = dispatcher();
    let _ = dispatcher.upsert(&RawResource::new("Host", NAMESPACE, "h", json!({})));

    assert!(logs_contain("Upsert rejected"));
    assert!(logs_contain("Host:default:h"));
}

#[traced_test]
#[test]
fn failed_build_is_logged() {
    let config = DispatchConfig {
        missing_endpoints: MissingEndpointPolicy::Reject,
        ..DispatchConfig::default()
    };
    let mut dispatcher = dispatcher_with(&config);
    dispatcher.upsert(&mapping("orders", "svc-b")).unwrap();
    let _ = dispatcher.get_snapshot();

    assert!(logs_contain("Snapshot build failed"));
}

#[traced_test]
#[test]
fn duplicate_listener_names_are_warned() {
    let mut dispatcher = dispatcher();
    dispatcher.upsert(&gateway("edge", 8080)).unwrap();
    dispatcher
        .upsert(&RawResource::new("Gateway", "other", "edge", json!({ "port": 9090 })))
        .unwrap();

    let (_, snapshot) = dispatcher.get_snapshot().unwrap();

    assert_eq!(snapshot.listeners().len(), 1);
    assert!(logs_contain("Duplicate listener name"));
}
