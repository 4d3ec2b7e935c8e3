//! Integration tests for the resource registry façade.
//!
//! Covers class resolution across declared lineages, base-type resolution and
//! its cache, change propagation from registry parts, root part replacement
//! and URL composition.
//!
//! The `prop_tests` module registers random super-type chains in shuffled
//! order and checks that every member resolves to the chain root, that
//! repeated lookups return the same `Arc`, and that removing and re-adding the
//! root invalidates the cache.

use apiary_registry::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════════
// MODELS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Task {
    id: Option<u64>,
}
impl ResourceModel for Task {}

#[derive(Default)]
struct SpecialTask {
    id: Option<u64>,
}
impl ResourceModel for SpecialTask {
    fn superclass() -> Option<ResourceClass> {
        Some(ResourceClass::of::<Task>())
    }
}

#[derive(Default)]
struct VerySpecialTask;
impl ResourceModel for VerySpecialTask {
    fn superclass() -> Option<ResourceClass> {
        Some(ResourceClass::of::<SpecialTask>())
    }
}

#[derive(Default)]
struct Project;
impl ResourceModel for Project {}

/// Chain member type, one per position.
#[derive(Default)]
struct Link<const N: usize>;
impl<const N: usize> ResourceModel for Link<N> {}

fn tasks() -> RegistryEntry {
    RegistryEntry::new(
        ResourceInformation::builder::<Task>("tasks")
            .id("id", |task: &Task| task.id, |task, id| task.id = Some(id))
            .build(),
    )
}

fn special_tasks() -> RegistryEntry {
    RegistryEntry::new(
        ResourceInformation::builder::<SpecialTask>("specialTasks")
            .path("special-tasks")
            .super_type("tasks")
            .id(
                "id",
                |task: &SpecialTask| task.id,
                |task, id| task.id = Some(id),
            )
            .build(),
    )
}

fn registry() -> ResourceRegistry {
    let registry = ResourceRegistry::local(ConstantUrlProvider::new("http://localhost/api/"));
    registry.add_entry(tasks()).unwrap();
    registry.add_entry(special_tasks()).unwrap();
    registry
}

fn recorder() -> (Arc<dyn RegistryPartListener>, Arc<Mutex<Vec<RegistryPartEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let listener: Arc<dyn RegistryPartListener> =
        Arc::new(move |event: &RegistryPartEvent| sink.lock().push(event.clone()));
    (listener, events)
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLASS RESOLUTION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn subclass_resolves_to_its_own_entry() {
    let registry = registry();
    let entry = registry
        .find_entry(ResourceClass::of::<SpecialTask>())
        .unwrap();
    assert_eq!(entry.resource_type(), "specialTasks");
}

#[test]
fn unregistered_subclass_resolves_to_nearest_ancestor() {
    let registry = registry();
    let entry = registry
        .find_entry(ResourceClass::of::<VerySpecialTask>())
        .unwrap();
    assert_eq!(entry.resource_type(), "specialTasks");

    let object = ResourceObject::new(VerySpecialTask);
    assert_eq!(
        registry.resource_class_of(&object),
        Some(ResourceClass::of::<SpecialTask>())
    );
}

#[test]
fn unrelated_class_is_not_found() {
    let registry = registry();
    assert_eq!(registry.resource_class(ResourceClass::of::<Project>()), None);
    assert!(matches!(
        registry.find_entry(ResourceClass::of::<Project>()),
        Err(RegistryError::NotFound(_))
    ));
}

#[test]
fn concurrent_class_resolution_agrees() {
    let registry = &registry();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(move || registry.resource_class(ResourceClass::of::<VerySpecialTask>()))
            })
            .collect();
        for handle in handles {
            assert_eq!(
                handle.join().unwrap(),
                Some(ResourceClass::of::<SpecialTask>())
            );
        }
    });
}

// ═══════════════════════════════════════════════════════════════════════════════
// BASE TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn base_type_of_subtype_is_root() {
    let registry = registry();
    let base = registry.base_resource_information("specialTasks").unwrap();
    assert_eq!(base.resource_type(), "tasks");

    let again = registry.base_resource_information("specialTasks").unwrap();
    assert!(Arc::ptr_eq(&base, &again));
    assert!(Arc::ptr_eq(
        &base,
        registry.entry("tasks").unwrap().resource_information()
    ));
}

#[test]
fn concurrent_base_lookups_observe_one_instance() {
    let registry = &registry();
    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(move || registry.base_resource_information("specialTasks").unwrap()))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });
    let cached = registry.base_resource_information("specialTasks").unwrap();
    for result in results {
        assert_eq!(result.resource_type(), "tasks");
        assert!(Arc::ptr_eq(&result, &cached));
    }
}

#[test]
fn missing_super_type_is_reported() {
    let registry = ResourceRegistry::local(ConstantUrlProvider::none());
    registry.add_entry(special_tasks()).unwrap();
    assert_eq!(
        registry.base_resource_information("specialTasks").unwrap_err(),
        RegistryError::MissingSuperType {
            resource_type: "specialTasks".into(),
            super_type: "tasks".into(),
        }
    );
    assert!(matches!(
        registry.base_resource_information("comments"),
        Err(RegistryError::NotFound(_))
    ));
}

#[test]
fn super_type_cycle_is_reported() {
    let registry = ResourceRegistry::local(ConstantUrlProvider::none());
    registry
        .add_entry(RegistryEntry::new(
            ResourceInformation::builder::<Link<0>>("a").super_type("b").build(),
        ))
        .unwrap();
    registry
        .add_entry(RegistryEntry::new(
            ResourceInformation::builder::<Link<1>>("b").super_type("a").build(),
        ))
        .unwrap();
    assert_eq!(
        registry.base_resource_information("a").unwrap_err(),
        RegistryError::SuperTypeCycle("a".into())
    );
}

#[test]
fn adding_an_entry_invalidates_the_cache() {
    let registry = registry();
    let before = registry.base_resource_information("tasks").unwrap();
    registry
        .add_entry(RegistryEntry::new(
            ResourceInformation::builder::<Project>("projects").build(),
        ))
        .unwrap();
    let after = registry.base_resource_information("tasks").unwrap();
    assert_eq!(after.resource_type(), "tasks");
    assert!(Arc::ptr_eq(&before, &after));

    registry.remove_entry("tasks").unwrap();
    registry.add_entry(tasks()).unwrap();
    let replaced = registry.base_resource_information("specialTasks").unwrap();
    assert!(!Arc::ptr_eq(&before, &replaced));
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHANGE NOTIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn part_changes_reach_registry_listeners() {
    let part = Arc::new(DefaultRegistryPart::new());
    let registry = ResourceRegistry::new(Arc::clone(&part) as Arc<dyn RegistryPart>, ConstantUrlProvider::none());
    let (listener, events) = recorder();
    registry.add_listener(listener);

    part.add_entry(tasks()).unwrap();
    registry.remove_entry("tasks").unwrap();

    assert_eq!(
        *events.lock(),
        vec![
            RegistryPartEvent::Added("tasks".into()),
            RegistryPartEvent::Removed("tasks".into()),
        ]
    );
}

#[test]
fn replacing_the_root_part_moves_the_subscription() {
    let old_part = Arc::new(DefaultRegistryPart::new());
    let new_part = Arc::new(DefaultRegistryPart::new());
    let registry = ResourceRegistry::new(Arc::clone(&old_part) as Arc<dyn RegistryPart>, ConstantUrlProvider::none());
    let (listener, events) = recorder();
    registry.add_listener(listener);

    old_part.add_entry(tasks()).unwrap();
    assert!(registry.has_entry("tasks"));
    let cached = registry.base_resource_information("tasks").unwrap();

    registry.set_root_part(Arc::clone(&new_part) as Arc<dyn RegistryPart>);
    assert!(!registry.has_entry("tasks"));
    assert!(old_part.listeners().is_empty());
    assert!(matches!(
        registry.base_resource_information("tasks"),
        Err(RegistryError::NotFound(_))
    ));

    old_part.remove_entry("tasks").unwrap();
    new_part.add_entry(tasks()).unwrap();
    let fresh = registry.base_resource_information("tasks").unwrap();
    assert!(!Arc::ptr_eq(&cached, &fresh));

    assert_eq!(
        *events.lock(),
        vec![
            RegistryPartEvent::Added("tasks".into()),
            RegistryPartEvent::Added("tasks".into()),
        ]
    );
}

#[test]
fn composite_root_merges_parts() {
    let local = Arc::new(DefaultRegistryPart::new());
    let shared = Arc::new(DefaultRegistryPart::new());
    shared.add_entry(tasks()).unwrap();
    let composite = CompositeRegistryPart::new(vec![
        Arc::clone(&local) as Arc<dyn RegistryPart>,
        Arc::clone(&shared) as Arc<dyn RegistryPart>,
    ]);
    let registry = ResourceRegistry::new(Arc::new(composite), ConstantUrlProvider::none());

    registry.add_entry(special_tasks()).unwrap();
    assert!(local.has_entry("specialTasks"));
    assert_eq!(
        registry
            .base_resource_information("specialTasks")
            .unwrap()
            .resource_type(),
        "tasks"
    );

    shared.remove_entry("tasks").unwrap();
    assert!(matches!(
        registry.base_resource_information("specialTasks"),
        Err(RegistryError::MissingSuperType { .. })
    ));
}

#[test]
fn dropping_the_registry_unsubscribes() {
    let part = Arc::new(DefaultRegistryPart::new());
    let registry = ResourceRegistry::new(Arc::clone(&part) as Arc<dyn RegistryPart>, ConstantUrlProvider::none());
    assert_eq!(part.listeners().len(), 1);
    drop(registry);
    assert!(part.listeners().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════════
// URLS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn urls_use_path_and_trim_base() {
    let registry = registry();
    let special = registry.entry("specialTasks").unwrap();
    assert_eq!(
        registry.resource_url(special.resource_information()).as_deref(),
        Some("http://localhost/api/special-tasks")
    );
    assert_eq!(
        registry
            .resource_url_for_id(ResourceClass::of::<Task>(), "7")
            .unwrap()
            .as_deref(),
        Some("http://localhost/api/tasks/7")
    );

    let object = ResourceObject::new(SpecialTask { id: Some(4) });
    assert_eq!(
        registry.resource_url_of(&object).unwrap().as_deref(),
        Some("http://localhost/api/special-tasks/4")
    );
}

#[test]
fn url_of_unregistered_class_is_not_found() {
    let registry = registry();
    assert!(matches!(
        registry.resource_url_for(ResourceClass::of::<Project>()),
        Err(RegistryError::NotFound(_))
    ));
}

#[tokio::test]
async fn scoped_provider_gives_each_request_its_base() {
    let registry = ResourceRegistry::local(ScopedUrlProvider::new());
    registry.add_entry(tasks()).unwrap();
    let class = ResourceClass::of::<Task>();

    assert_eq!(registry.resource_url_for(class).unwrap(), None);
    let first = ScopedUrlProvider::scope("http://a.example/", async {
        registry.resource_url_for_id(class, "1").unwrap()
    })
    .await;
    let second = ScopedUrlProvider::scope("http://b.example", async {
        registry.resource_url_for_id(class, "1").unwrap()
    })
    .await;
    assert_eq!(first.as_deref(), Some("http://a.example/tasks/1"));
    assert_eq!(second.as_deref(), Some("http://b.example/tasks/1"));

    let context = QueryContext::new().with_base_url("http://c.example");
    let object = ResourceObject::new(Task { id: Some(2) });
    assert_eq!(
        registry.resource_url_of_in(&context, &object).unwrap().as_deref(),
        Some("http://c.example/tasks/2")
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROPERTY-BASED
// ═══════════════════════════════════════════════════════════════════════════════

mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    const MAX_CHAIN: usize = 8;

    fn link_information<const N: usize>(super_type: Option<String>) -> ResourceInformation {
        let builder = ResourceInformation::builder::<Link<N>>(format!("t{}", N));
        match super_type {
            Some(super_type) => builder.super_type(super_type).build(),
            None => builder.build(),
        }
    }

    /// Metadata of chain position `index`; `t{index}` extends `t{index - 1}`.
    fn chain_member(index: usize) -> RegistryEntry {
        let super_type = index.checked_sub(1).map(|parent| format!("t{parent}"));
        let information = match index {
            0 => link_information::<0>(super_type),
            1 => link_information::<1>(super_type),
            2 => link_information::<2>(super_type),
            3 => link_information::<3>(super_type),
            4 => link_information::<4>(super_type),
            5 => link_information::<5>(super_type),
            6 => link_information::<6>(super_type),
            _ => link_information::<7>(super_type),
        };
        RegistryEntry::new(information)
    }

    fn arb_registration_order() -> impl Strategy<Value = Vec<usize>> {
        (1..=MAX_CHAIN).prop_flat_map(|len| Just((0..len).collect::<Vec<_>>()).prop_shuffle())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        /// Every chain member resolves to the chain root, repeated lookups
        /// share the cached `Arc`, and re-adding the root invalidates it.
        #[test]
        fn prop_chain_members_resolve_to_root(order in arb_registration_order()) {
            let registry = ResourceRegistry::local(ConstantUrlProvider::none());
            for &index in &order {
                registry.add_entry(chain_member(index)).unwrap();
            }

            let mut cached = Vec::new();
            for index in 0..order.len() {
                let resource_type = format!("t{index}");
                let base = registry.base_resource_information(&resource_type).unwrap();
                prop_assert_eq!(base.resource_type(), "t0");
                let again = registry.base_resource_information(&resource_type).unwrap();
                prop_assert!(Arc::ptr_eq(&base, &again));
                cached.push(base);
            }

            registry.remove_entry("t0").unwrap();
            for index in 1..order.len() {
                let is_missing_super_type = matches!(
                    registry.base_resource_information(&format!("t{index}")),
                    Err(RegistryError::MissingSuperType { .. })
                );
                prop_assert!(is_missing_super_type);
            }

            registry.add_entry(chain_member(0)).unwrap();
            for (index, old) in cached.iter().enumerate() {
                let fresh = registry.base_resource_information(&format!("t{index}")).unwrap();
                prop_assert_eq!(fresh.resource_type(), "t0");
                prop_assert!(!Arc::ptr_eq(old, &fresh));
            }
        }
    }
}
