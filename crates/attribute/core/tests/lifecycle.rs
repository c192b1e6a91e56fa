use std::sync::Arc;

use attribute_core::{
    AttributeDefinition, AttributeInstance, AttributeSystemError, AttributeWorld, CapacityError,
    DefinitionId, EngineConfig, EntityError, EntityId, EntityRegistry, EntityTemplate,
    ErrorSeverity, ModifierError, PropagationMode, TreeConnectivity,
};

const MIGHT: DefinitionId = DefinitionId(1);
const STAMINA: DefinitionId = DefinitionId(2);

fn might() -> Arc<AttributeDefinition> {
    Arc::new(AttributeDefinition::new(MIGHT, "might").with_propagation(PropagationMode::Parent))
}

fn stamina() -> Arc<AttributeDefinition> {
    Arc::new(AttributeDefinition::new(STAMINA, "stamina").with_capacity(false, 0.0))
}

fn soldier() -> EntityTemplate {
    EntityTemplate::new("soldier")
        .with_attribute(AttributeInstance::new(might()).with_flat(10.0))
        .with_attribute(AttributeInstance::new(stamina()).with_flat(20.0))
}

fn captain() -> EntityTemplate {
    soldier().with_attribute(AttributeInstance::modifier(might()).with_flat(5.0))
}

/// Destroy scenario:
/// 1. A captain serves under a commander and leads a squad member
/// 2. The captain is destroyed
/// 3. The commander loses the captain's bonus, the squad member is orphaned, and
///    nothing references the captain's instances any more
#[test]
fn destroy_retracts_every_edge_and_purges_instances() {
    let mut world = AttributeWorld::new();

    // ================================================================
    // PHASE 1: Build the chain commander <- captain <- squad
    // ================================================================
    let commander = world.spawn(&soldier()).expect("spawn commander");
    let captain = world.spawn(&captain()).expect("spawn captain");
    let squad = world.spawn(&crate::captain()).expect("spawn squad");

    world.try_apply_to(captain, commander).expect("captain joins");
    world.try_apply_to(squad, captain).expect("squad joins");
    assert_eq!(world.value_of(commander, MIGHT), Some(15.0));
    assert_eq!(world.value_of(captain, MIGHT), Some(15.0));

    let captain_instances = world
        .entity(captain)
        .expect("captain exists")
        .container
        .instances()
        .to_vec();

    // ================================================================
    // PHASE 2: Destroy the captain
    // ================================================================
    world.destroy(captain).expect("destroy");

    // ================================================================
    // PHASE 3: Verify
    // ================================================================
    assert_eq!(world.value_of(commander, MIGHT), Some(10.0));
    assert!(world.entity(captain).is_none());
    assert!(!world.registry().is_registered(captain));
    assert!(world.tree().parents(squad).is_empty());
    assert!(world.tree().children(commander).is_empty());
    for id in captain_instances {
        assert!(world.instance(id).is_none());
    }
    assert!(
        world
            .store()
            .iter()
            .all(|(_, instance)| instance.modifiers().is_empty())
    );
    assert!(world.ledger().is_empty());

    assert_eq!(world.destroy(captain), Err(EntityError::UnknownEntity(captain)));
}

#[test]
fn spawned_entities_do_not_share_state() {
    let mut world = AttributeWorld::new();
    let template = soldier();
    let first = world.spawn(&template).expect("spawn first");
    let second = world.spawn(&template).expect("spawn second");

    let stamina_first = world.attribute(first, STAMINA).expect("stamina");
    world.add_usage(stamina_first, 5.0).expect("usage");

    let stamina_second = world.attribute(second, STAMINA).expect("stamina");
    assert_ne!(stamina_first, stamina_second);
    assert_eq!(world.instance(stamina_second).unwrap().capacity_used(), 0.0);
    assert_eq!(world.instance(stamina_first).unwrap().owner(), Some(first));
    assert_eq!(first, EntityId(1));
    assert_eq!(second, EntityId(2));
    assert!(template.attributes.iter().all(|a| a.owner().is_none()));
}

#[test]
fn manual_modifiers_go_through_the_owning_container() {
    let mut world = AttributeWorld::new();
    let target = world.spawn(&soldier()).expect("spawn target");
    let source = world.spawn(&captain()).expect("spawn source");
    let base = world.attribute(target, MIGHT).expect("might");

    let attached = world.add_modifiers(target, source).expect("bulk add");
    assert_eq!(attached.len(), 1);
    assert_eq!(world.value(base), 15.0);

    let modifier = attached[0].modifier;
    world.add_modifier(base, modifier).expect("second reference");
    assert_eq!(world.value(base), 20.0);

    world.remove_modifier(base, modifier).expect("drop one reference");
    assert_eq!(world.value(base), 15.0);

    assert_eq!(world.remove_modifiers(target, source), Ok(1));
    assert_eq!(world.value(base), 10.0);

    let missing = attribute_core::InstanceId(999);
    let err = world.add_modifier(missing, modifier).unwrap_err();
    assert_eq!(err, ModifierError::UnknownInstance(missing));
    assert_eq!(err.severity(), ErrorSeverity::Validation);
}

#[test]
fn removing_an_attribute_scrubs_it_everywhere() {
    let mut world = AttributeWorld::new();
    let parent = world.spawn(&soldier()).expect("spawn parent");
    let child = world.spawn(&captain()).expect("spawn child");
    world.try_apply_to(child, parent).expect("connect");
    assert_eq!(world.value_of(parent, MIGHT), Some(15.0));

    let bonus = world
        .entity(child)
        .expect("child exists")
        .container
        .modifier_ids(world.store())[0];
    let removed = world.remove_attribute(child, bonus).expect("child exists");

    assert!(removed.is_some());
    assert_eq!(world.value_of(parent, MIGHT), Some(10.0));
    world.disconnect_from_parent(child, parent).expect("disconnect");
    assert_eq!(world.value_of(parent, MIGHT), Some(10.0));
}

#[test]
fn capacity_bounds_follow_the_resolved_value() {
    let mut world = AttributeWorld::new();
    let parent = world.spawn(&soldier()).expect("spawn parent");
    let pool = world.attribute(parent, STAMINA).expect("stamina");

    assert_eq!(world.add_usage(pool, 50.0), Ok(20.0));
    assert_eq!(world.remove_usage(pool, 5.0), Ok(15.0));
    let err = world.add_usage(pool, -1.0).unwrap_err();
    assert_eq!(err, CapacityError::NegativeAmount(-1.0));
    assert!(!err.is_rejection());

    let might = world.attribute(parent, MIGHT).expect("might");
    assert_eq!(world.add_usage(might, 1.0), Err(CapacityError::Unsupported(might)));
}

#[test]
fn config_flows_into_spawned_containers() {
    let config = EngineConfig::new()
        .with_event_capacity(8)
        .with_missing_attribute_warnings(false);
    let mut world = AttributeWorld::with_config(config.clone());
    let id = world.spawn(&EntityTemplate::new("empty")).expect("spawn");

    assert_eq!(world.config(), &config);
    assert_eq!(world.value_of(id, MIGHT), None);
    assert_eq!(
        world.insert_attribute(EntityId(42), AttributeInstance::new(might())),
        Err(EntityError::UnknownEntity(EntityId(42)))
    );
}
