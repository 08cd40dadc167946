use flowplane_dispatch::xds::route::referenced_clusters;
use proptest::prelude::*;

use super::support::*;

fn version_number(version: &str) -> u64 {
    version.trim_start_matches('v').parse().expect("numeric version")
}

proptest! {
    #[test]
    fn versions_increase_across_rebuilds_and_hold_between_mutations(
        ops in prop::collection::vec((0u8..3, 0usize..4), 1..40)
    ) {
        let mut dispatcher = dispatcher();
        let mut last: Option<u64> = None;
        let mut mutated = true;

        for (op, index) in ops {
            let name = format!("m{}", index);
            match op {
                0 => {
                    dispatcher.upsert(&mapping(&name, &format!("svc-{}", index))).unwrap();
                    mutated = true;
                }
                1 => {
                    dispatcher.delete_key("Mapping", NAMESPACE, &name);
                    mutated = true;
                }
                _ => {
                    let (version, _) = dispatcher.get_snapshot().unwrap();
                    let (again, _) = dispatcher.get_snapshot().unwrap();
                    prop_assert_eq!(&version, &again);

                    let number = version_number(&version);
                    if let Some(previous) = last {
                        if mutated {
                            prop_assert!(number > previous);
                        } else {
                            prop_assert_eq!(number, previous);
                        }
                    }
                    last = Some(number);
                    mutated = false;
                }
            }
        }
    }

    #[test]
    fn last_upsert_wins_per_key(
        first in "svc-[a-z]{1,8}",
        second in "svc-[a-z]{1,8}",
    ) {
        let mut dispatcher = dispatcher();
        dispatcher.upsert(&mapping("echo", &first)).unwrap();
        dispatcher.upsert(&mapping("echo", &second)).unwrap();

        prop_assert_eq!(dispatcher.store().len(), 1);
        let compiled = dispatcher.compiled("Mapping", NAMESPACE, "echo").unwrap();
        let targets: Vec<&str> =
            compiled.routes[0].routes.iter().flat_map(referenced_clusters).collect();
        prop_assert_eq!(targets, vec![second.as_str()]);
    }

    #[test]
    fn every_referenced_cluster_has_one_assignment(
        services in prop::collection::btree_set("svc-[a-z]{1,6}", 1..6),
        with_endpoints in prop::collection::vec(any::<bool>(), 6),
    ) {
        let mut dispatcher = dispatcher();
        for (index, service) in services.iter().enumerate() {
            dispatcher.upsert(&mapping(&format!("m{}", index), service)).unwrap();
            if with_endpoints[index] {
                dispatcher.upsert(&endpoints(service, service, &["10.0.0.1"])).unwrap();
            }
        }

        let (_, snapshot) = dispatcher.get_snapshot().unwrap();
        prop_assert_eq!(snapshot.clusters().len(), services.len());
        for service in &services {
            prop_assert!(snapshot.cluster(service).is_some());
            prop_assert!(snapshot.load_assignment(service).is_some());
        }
        prop_assert!(snapshot.consistent().is_ok());
    }
}
