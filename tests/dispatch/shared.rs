use flowplane_dispatch::xds::dispatch::{CompiledListener, CompiledRoute};
use flowplane_dispatch::xds::listener::{http_listener, RouteSource};
use flowplane_dispatch::{CompiledConfig, DispatchEvent, RawResource, SharedDispatcher};
use serde_json::json;

use super::support::*;

#[tokio::test]
async fn subscribers_see_invalidations_and_rebuilds() {
    let shared = SharedDispatcher::new(dispatcher());
    let mut events = shared.subscribe();

    shared.upsert(&gateway("edge", 8080)).unwrap();
    shared.upsert(&mapping("echo", "svc-a")).unwrap();
    let listener = shared.get_listener("edge").unwrap();

    assert!(listener.is_some());
    assert_eq!(events.recv().await.unwrap(), DispatchEvent::Invalidated);
    assert_eq!(events.recv().await.unwrap(), DispatchEvent::Invalidated);
    assert_eq!(
        events.recv().await.unwrap(),
        DispatchEvent::SnapshotBuilt { version: "v1".to_string() }
    );
}

#[tokio::test]
async fn partial_bulk_upsert_still_notifies() {
    let shared = SharedDispatcher::new(dispatcher());
    shared.get_snapshot().unwrap();
    let mut events = shared.subscribe();

    let result = shared.upsert_yaml(
        "kind: Mapping\nmetadata:\n  name: a\nspec:\n  prefix: /a\n  service: svc-a\n---\nkind: Host\nmetadata:\n  name: h\n",
    );

    assert!(result.is_err());
    assert_eq!(events.recv().await.unwrap(), DispatchEvent::Invalidated);
}

#[tokio::test]
async fn concurrent_writers_converge() {
    let shared = SharedDispatcher::new(dispatcher());

    let handles: Vec<_> = (0..8)
        .map(|index| {
            let writer = shared.clone();
            tokio::spawn(async move {
                writer.upsert(&mapping(&format!("m{}", index), "svc-a")).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let (_, snapshot) = shared.get_snapshot().unwrap();
    assert_eq!(shared.with(|dispatcher| dispatcher.store().len()), 8);
    assert_eq!(snapshot.clusters().len(), 1);
    assert!(shared.get_route_configuration("missing").unwrap().is_none());
}

#[tokio::test]
async fn panicking_predicate_does_not_wedge_the_dispatcher() {
    let mut inner = dispatcher();
    inner
        .register("Trap", |resource: &RawResource| {
            CompiledConfig::for_resource(resource).with_listener(CompiledListener::new(
                resource.key(),
                http_listener(&resource.name, "0.0.0.0", 9000, RouteSource::Rds(route_table(&resource.name))),
                vec!["*".to_string()],
                |_: &CompiledRoute| -> bool { panic!("bad predicate") },
            ))
        })
        .unwrap();
    let shared = SharedDispatcher::new(inner);
    shared.upsert(&mapping("echo", "svc-a")).unwrap();
    shared.upsert(&RawResource::new("Trap", NAMESPACE, "trap", json!({}))).unwrap();

    let (_, snapshot) = shared.get_snapshot().unwrap();
    let table = snapshot.route_configuration(&route_table("trap")).expect("route table");
    assert!(table.virtual_hosts[0].routes.is_empty());

    shared.delete_key("Trap", NAMESPACE, "trap");
    let (version, snapshot) = shared.get_snapshot().unwrap();
    assert_eq!(version, "v2");
    assert!(snapshot.listener("trap").is_none());
    assert!(snapshot.cluster("svc-a").is_some());
}
