use flowplane_dispatch::xds::route::referenced_clusters;
use flowplane_dispatch::{CompiledConfig, Error, RawResource};
use serde_json::json;

use super::support::*;

#[test]
fn upsert_replaces_previous_compilation() {
    let mut dispatcher = dispatcher();
    dispatcher.upsert(&mapping("echo", "svc-a")).unwrap();
    dispatcher.upsert(&mapping("echo", "svc-b")).unwrap();

    assert_eq!(dispatcher.store().len(), 1);
    let compiled = dispatcher.compiled("Mapping", NAMESPACE, "echo").expect("compiled echo");
    let targets: Vec<&str> = compiled.routes[0].routes.iter().flat_map(referenced_clusters).collect();
    assert_eq!(targets, vec!["svc-b"]);

    let (_, snapshot) = dispatcher.get_snapshot().unwrap();
    assert!(snapshot.cluster("svc-a").is_none());
    assert!(snapshot.cluster("svc-b").is_some());
}

#[test]
fn deleting_absent_resource_still_invalidates() {
    let mut dispatcher = dispatcher();
    let (first, _) = dispatcher.get_snapshot().unwrap();

    dispatcher.delete(&mapping("never-upserted", "svc-a"));
    dispatcher.delete_key("Gateway", NAMESPACE, "nope");

    assert!(dispatcher.needs_rebuild());
    let (second, snapshot) = dispatcher.get_snapshot().unwrap();
    assert_eq!(first, "v1");
    assert_eq!(second, "v2");
    assert!(snapshot.is_empty());
}

#[test]
fn delete_removes_contribution() {
    let mut dispatcher = dispatcher();
    dispatcher.upsert(&mapping("echo", "svc-a")).unwrap();
    dispatcher.delete(&mapping("echo", "ignored"));

    assert!(dispatcher.store().is_empty());
    let (_, snapshot) = dispatcher.get_snapshot().unwrap();
    assert!(snapshot.cluster("svc-a").is_none());
}

#[test]
fn unknown_kind_leaves_snapshot_unchanged() {
    let mut dispatcher = dispatcher();
    dispatcher.upsert(&mapping("echo", "svc-a")).unwrap();
    let (before_version, before) = dispatcher.get_snapshot().unwrap();

    let err = dispatcher
        .upsert(&RawResource::new("Host", NAMESPACE, "h", json!({})))
        .unwrap_err();
    assert!(matches!(err, Error::UnknownKind { ref kind } if kind == "Host"));
    assert!(!err.is_fatal());

    let (after_version, after) = dispatcher.get_snapshot().unwrap();
    assert_eq!(before_version, after_version);
    assert_eq!(before.clusters(), after.clusters());
    assert!(dispatcher.compiled("Host", NAMESPACE, "h").is_none());
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut dispatcher = dispatcher();
    let err = dispatcher.register("Mapping", CompiledConfig::for_resource).unwrap_err();

    assert!(matches!(err, Error::DuplicateTransform { .. }));
    assert!(err.is_fatal());
}

#[test]
fn panicking_transform_is_isolated() {
    let mut dispatcher = dispatcher();
    dispatcher.upsert(&mapping("c", "svc-c")).unwrap();

    let err = dispatcher
        .upsert(&RawResource::new("Exploding", NAMESPACE, "a", json!({})))
        .unwrap_err();
    match err {
        Error::InternalCompilation { key, message } => {
            assert_eq!(key, "Exploding:default:a");
            assert_eq!(message, "transform exploded");
        }
        other => panic!("expected internal compilation error, got {:?}", other),
    }

    dispatcher.upsert(&mapping("b", "svc-b")).unwrap();

    assert!(dispatcher.compiled("Mapping", NAMESPACE, "c").is_some());
    assert!(dispatcher.compiled("Mapping", NAMESPACE, "b").is_some());
    assert!(dispatcher.compiled("Exploding", NAMESPACE, "a").is_none());
}

#[test]
fn panic_keeps_previous_compilation_of_same_resource() {
    let mut dispatcher = dispatcher();
    dispatcher
        .register("Flaky", |resource: &RawResource| {
            if resource.spec["explode"].as_bool().unwrap_or(false) {
                panic!("flaky transform");
            }
            CompiledConfig::for_resource(resource)
        })
        .unwrap();

    let stable = RawResource::new("Flaky", NAMESPACE, "f", json!({ "generation": 1 }));
    dispatcher.upsert(&stable).unwrap();
    let (version, _) = dispatcher.get_snapshot().unwrap();

    let exploding = RawResource::new("Flaky", NAMESPACE, "f", json!({ "explode": true }));
    assert!(dispatcher.upsert(&exploding).is_err());

    assert!(dispatcher.compiled("Flaky", NAMESPACE, "f").is_some());
    assert_eq!(dispatcher.get_snapshot().unwrap().0, version);
}

#[test]
fn yaml_bulk_upsert_stops_at_first_failure() {
    let mut dispatcher = dispatcher();
    let manifests = r#"
kind: Mapping
metadata:
  name: first
spec:
  prefix: /first
  service: svc-a
---
kind: Host
metadata:
  name: unknown
---
kind: Mapping
metadata:
  name: never
spec:
  prefix: /never
  service: svc-a
"#;

    let err = dispatcher.upsert_yaml(manifests).unwrap_err();

    assert!(matches!(err, Error::UnknownKind { .. }));
    assert!(dispatcher.compiled("Mapping", NAMESPACE, "first").is_some());
    assert!(dispatcher.compiled("Mapping", NAMESPACE, "never").is_none());
}

#[test]
fn yaml_manifest_errors_change_nothing() {
    let mut dispatcher = dispatcher();
    let err = dispatcher
        .upsert_yaml("kind: Mapping\nmetadata:\n  name: ok\n---\nmetadata:\n  name: kindless\n")
        .unwrap_err();

    assert!(matches!(err, Error::Manifest { .. }));
    assert!(dispatcher.store().is_empty());
}

#[test]
fn error_report_lists_failed_entities() {
    let mut dispatcher = dispatcher();
    dispatcher
        .upsert(&RawResource::new("Gateway", "edge", "bad", json!({ "port": "eighty" })))
        .unwrap();
    dispatcher.upsert(&mapping("fine", "svc-a")).unwrap();

    let report = dispatcher.error_report();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].resource, "Gateway:edge:bad");
    assert_eq!(report[0].namespace, "edge");

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json[0]["kind"], "Gateway");
    assert!(json[0]["error"].as_str().unwrap().starts_with("invalid Gateway spec"));
}
