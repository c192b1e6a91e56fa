//! Per-entity attribute collections.
//!
//! An [`AttributeContainer`] lists the instances an entity owns and indexes them by
//! definition. It is the only entry point that mutates modifier lists: every attach
//! goes through the modifier's application conditions, evaluated against this
//! container.

use std::collections::HashMap;

use crate::condition::all_can_apply;
use crate::definition::DefinitionId;
use crate::entity::EntityId;
use crate::instance::{AttributeInstance, InstanceId};
use crate::store::{InstanceStore, ModifierError};

/// One modifier reference created on a target instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attachment {
    pub target: InstanceId,
    pub modifier: InstanceId,
}

/// The attributes of one entity.
///
/// The index maps each definition to the first instance of it in insertion order,
/// and is rebuilt for that definition whenever an instance is removed.
#[derive(Clone, Debug)]
pub struct AttributeContainer {
    owner: EntityId,
    instances: Vec<InstanceId>,
    index: HashMap<DefinitionId, InstanceId>,
    warn_on_missing: bool,
}

impl AttributeContainer {
    pub fn new(owner: EntityId) -> Self {
        Self {
            owner,
            instances: Vec::new(),
            index: HashMap::new(),
            warn_on_missing: true,
        }
    }

    /// Chooses whether missing lookups log at `warn` (default) or `debug`.
    pub fn with_missing_attribute_warnings(mut self, enabled: bool) -> Self {
        self.warn_on_missing = enabled;
        self
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// Instance ids in insertion order.
    pub fn instances(&self) -> &[InstanceId] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains(&id)
    }

    /// Iterates `(id, instance)` pairs in insertion order.
    pub fn iter<'s>(
        &'s self,
        store: &'s InstanceStore,
    ) -> impl Iterator<Item = (InstanceId, &'s AttributeInstance)> + 's {
        self.instances
            .iter()
            .filter_map(move |&id| store.get(id).map(|instance| (id, instance)))
    }

    /// Moves `instance` into `store` under this container's ownership.
    pub fn insert(&mut self, store: &mut InstanceStore, mut instance: AttributeInstance) -> InstanceId {
        instance.set_owner(self.owner);
        let definition = instance.definition_id();
        let id = store.insert(instance);

        self.instances.push(id);
        if let Some(definition) = definition {
            self.index.entry(definition).or_insert(id);
        }
        id
    }

    /// Removes an instance this container owns, scrubbing it from every modifier list.
    pub fn remove(&mut self, store: &mut InstanceStore, id: InstanceId) -> Option<AttributeInstance> {
        let position = self.instances.iter().position(|&i| i == id)?;
        self.instances.remove(position);

        let removed = store.remove(id)?;
        if let Some(definition) = removed.definition_id() {
            self.reindex(store, definition);
        }
        Some(removed)
    }

    /// Removes every instance, returning how many were dropped.
    pub fn clear(&mut self, store: &mut InstanceStore) -> usize {
        let ids = std::mem::take(&mut self.instances);
        self.index.clear();
        ids.into_iter().filter_map(|id| store.remove(id)).count()
    }

    fn reindex(&mut self, store: &InstanceStore, definition: DefinitionId) {
        let first = self
            .instances
            .iter()
            .copied()
            .find(|&id| store.get(id).and_then(AttributeInstance::definition_id) == Some(definition));
        match first {
            Some(id) => {
                self.index.insert(definition, id);
            }
            None => {
                self.index.remove(&definition);
            }
        }
    }

    /// Looks up the instance of `definition` without logging a miss.
    pub fn find(&self, definition: DefinitionId) -> Option<InstanceId> {
        self.index.get(&definition).copied()
    }

    /// Looks up the instance of `definition`, logging a diagnostic on a miss.
    pub fn lookup(&self, definition: DefinitionId) -> Option<InstanceId> {
        let found = self.find(definition);
        if found.is_none() {
            if self.warn_on_missing {
                tracing::warn!(owner = %self.owner, definition = %definition, "attribute not found");
            } else {
                tracing::debug!(owner = %self.owner, definition = %definition, "attribute not found");
            }
        }
        found
    }

    /// Resolved value of this entity's `definition` attribute.
    pub fn value_of(&self, store: &InstanceStore, definition: DefinitionId) -> Option<f64> {
        self.lookup(definition).map(|id| store.value(id))
    }

    /// Ids of every modifier-kind instance, in insertion order.
    pub fn modifier_ids(&self, store: &InstanceStore) -> Vec<InstanceId> {
        self.iter(store)
            .filter(|(_, instance)| instance.is_modifier())
            .map(|(id, _)| id)
            .collect()
    }

    /// Attaches `modifier` to `target`, which this container must own.
    ///
    /// Every application condition of the modifier that applies to the target's
    /// definition is evaluated against this container first; a failing one rejects
    /// the attachment without changing anything.
    pub fn add_modifier(
        &self,
        store: &mut InstanceStore,
        target: InstanceId,
        modifier: InstanceId,
    ) -> Result<(), ModifierError> {
        if !self.contains(target) {
            return Err(ModifierError::ForeignTarget {
                target,
                owner: self.owner,
            });
        }
        let target_definition = store
            .get(target)
            .ok_or(ModifierError::UnknownInstance(target))?
            .definition_id();
        let conditions = &store
            .get(modifier)
            .ok_or(ModifierError::UnknownInstance(modifier))?
            .conditions;

        if !all_can_apply(conditions, target_definition, self, store) {
            tracing::debug!(
                owner = %self.owner,
                target = %target,
                modifier = %modifier,
                "modifier rejected by application conditions"
            );
            return Err(ModifierError::ConditionsNotMet { target, modifier });
        }

        store.attach(target, modifier)
    }

    /// Removes one reference to `modifier` from `target`, which this container must own.
    pub fn remove_modifier(
        &self,
        store: &mut InstanceStore,
        target: InstanceId,
        modifier: InstanceId,
    ) -> Result<(), ModifierError> {
        if !self.contains(target) {
            return Err(ModifierError::ForeignTarget {
                target,
                owner: self.owner,
            });
        }
        store.detach(target, modifier)
    }

    /// Attaches `modifier` to this container's instance of the same definition.
    ///
    /// If there is none, a zeroed base instance is created when the modifier opts in
    /// with `force_apply_if_missing` and its application conditions hold here;
    /// otherwise the attach fails with [`ModifierError::MissingTarget`] and nothing
    /// is created. Returns the target the modifier landed on.
    pub fn attach(
        &mut self,
        store: &mut InstanceStore,
        modifier: InstanceId,
    ) -> Result<InstanceId, ModifierError> {
        let (definition, force) = {
            let instance = store
                .get(modifier)
                .ok_or(ModifierError::UnknownInstance(modifier))?;
            let definition = instance
                .definition()
                .cloned()
                .ok_or(ModifierError::Unbound(modifier))?;
            (definition, instance.force_apply_if_missing)
        };

        let target = match self.target_for(store, definition.id, modifier) {
            Some(target) => target,
            None if force => {
                let conditions = &store
                    .get(modifier)
                    .ok_or(ModifierError::UnknownInstance(modifier))?
                    .conditions;
                if !all_can_apply(conditions, Some(definition.id), self, store) {
                    tracing::debug!(
                        owner = %self.owner,
                        modifier = %modifier,
                        "forced modifier rejected by application conditions"
                    );
                    return Err(ModifierError::MissingTarget(modifier));
                }
                tracing::debug!(
                    owner = %self.owner,
                    definition = %definition.id,
                    "creating missing attribute for forced modifier"
                );
                let created = self.insert(store, AttributeInstance::new(definition));
                if let Err(err) = self.add_modifier(store, created, modifier) {
                    self.remove(store, created);
                    return Err(err);
                }
                return Ok(created);
            }
            None => return Err(ModifierError::MissingTarget(modifier)),
        };

        self.add_modifier(store, target, modifier)?;
        Ok(target)
    }

    /// Removes one reference to `modifier` from whichever local instance holds it.
    pub fn detach(
        &self,
        store: &mut InstanceStore,
        modifier: InstanceId,
    ) -> Result<InstanceId, ModifierError> {
        let target = self
            .instances
            .iter()
            .copied()
            .find(|&id| store.get(id).is_some_and(|i| i.modifiers().contains(&modifier)))
            .ok_or(ModifierError::MissingTarget(modifier))?;
        store.detach(target, modifier)?;
        Ok(target)
    }

    /// Indexed instance of `definition`, skipping `exclude` (a modifier is never its own target).
    fn target_for(
        &self,
        store: &InstanceStore,
        definition: DefinitionId,
        exclude: InstanceId,
    ) -> Option<InstanceId> {
        match self.find(definition) {
            Some(id) if id != exclude => Some(id),
            Some(_) => self.instances.iter().copied().find(|&id| {
                id != exclude && store.get(id).and_then(AttributeInstance::definition_id) == Some(definition)
            }),
            None => None,
        }
    }

    /// Attaches every modifier of `source` to the matching local attribute.
    pub fn add_modifiers(&mut self, store: &mut InstanceStore, source: &AttributeContainer) -> Vec<Attachment> {
        let modifiers = source.modifier_ids(store);
        self.add_modifiers_from(store, &modifiers)
    }

    /// Attaches each of `modifiers`, skipping the ones that are rejected or have no
    /// target. Returns the attachments that were made.
    pub fn add_modifiers_from(
        &mut self,
        store: &mut InstanceStore,
        modifiers: &[InstanceId],
    ) -> Vec<Attachment> {
        let mut attached = Vec::with_capacity(modifiers.len());
        for &modifier in modifiers {
            match self.attach(store, modifier) {
                Ok(target) => attached.push(Attachment { target, modifier }),
                Err(err) => {
                    tracing::debug!(owner = %self.owner, modifier = %modifier, %err, "skipped modifier");
                }
            }
        }
        attached
    }

    /// Removes every modifier owned by `source` from every local attribute.
    pub fn remove_modifiers(&self, store: &mut InstanceStore, source: &AttributeContainer) -> usize {
        self.remove_modifiers_from(store, source.owner())
    }

    /// Removes every modifier owned by `owner`, returning how many references went.
    pub fn remove_modifiers_from(&self, store: &mut InstanceStore, owner: EntityId) -> usize {
        self.instances
            .iter()
            .map(|&target| store.detach_owned_by(target, owner))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{ApplicationCondition, ConditionOperator, ModifierCondition};
    use crate::definition::AttributeDefinition;
    use crate::events::AttributeEvent;
    use std::sync::Arc;

    const ARMOR: DefinitionId = DefinitionId(1);
    const LEVEL: DefinitionId = DefinitionId(2);

    fn armor() -> Arc<AttributeDefinition> {
        Arc::new(AttributeDefinition::new(ARMOR, "armor"))
    }

    fn level() -> Arc<AttributeDefinition> {
        Arc::new(AttributeDefinition::new(LEVEL, "level"))
    }

    #[test]
    fn index_tracks_first_instance_per_definition() {
        let mut store = InstanceStore::new();
        let mut container = AttributeContainer::new(EntityId(1));
        let first = container.insert(&mut store, AttributeInstance::new(armor()).with_flat(1.0));
        let second = container.insert(&mut store, AttributeInstance::new(armor()).with_flat(2.0));

        assert_eq!(container.find(ARMOR), Some(first));
        container.remove(&mut store, first);
        assert_eq!(container.find(ARMOR), Some(second));
        container.remove(&mut store, second);
        assert_eq!(container.find(ARMOR), None);
        assert!(container.is_empty());
    }

    #[test]
    fn inserted_instances_are_owned_by_the_container() {
        let mut store = InstanceStore::new();
        let mut container = AttributeContainer::new(EntityId(7));
        let id = container.insert(&mut store, AttributeInstance::new(armor()));

        assert_eq!(store.get(id).unwrap().owner(), Some(EntityId(7)));
    }

    #[test]
    fn add_then_remove_restores_the_value() {
        let mut store = InstanceStore::new();
        let mut target = AttributeContainer::new(EntityId(1));
        let mut source = AttributeContainer::new(EntityId(2));
        let base = target.insert(&mut store, AttributeInstance::new(armor()).with_flat(10.0));
        let buff = source.insert(&mut store, AttributeInstance::modifier(armor()).with_flat(5.0));

        target.add_modifier(&mut store, base, buff).unwrap();
        assert_eq!(store.value(base), 15.0);

        target.remove_modifier(&mut store, base, buff).unwrap();
        assert_eq!(store.value(base), 10.0);
        assert_eq!(
            target.remove_modifier(&mut store, base, buff),
            Err(ModifierError::NotAttached {
                target: base,
                modifier: buff
            })
        );
    }

    #[test]
    fn conditions_are_evaluated_against_the_target_container() {
        let mut store = InstanceStore::new();
        let mut rookie = AttributeContainer::new(EntityId(1));
        let mut veteran = AttributeContainer::new(EntityId(2));
        let mut source = AttributeContainer::new(EntityId(3));

        let rookie_armor = rookie.insert(&mut store, AttributeInstance::new(armor()).with_flat(10.0));
        rookie.insert(&mut store, AttributeInstance::new(level()).with_flat(1.0));
        let veteran_armor = veteran.insert(&mut store, AttributeInstance::new(armor()).with_flat(10.0));
        veteran.insert(&mut store, AttributeInstance::new(level()).with_flat(20.0));

        let gated = source.insert(
            &mut store,
            AttributeInstance::modifier(armor())
                .with_flat(5.0)
                .with_condition(ApplicationCondition::new("veterans").with_condition(
                    ModifierCondition::new(LEVEL, ConditionOperator::GreaterOrEquals, 10.0),
                )),
        );

        let mut rx = store.subscribe();
        let err = rookie.add_modifier(&mut store, rookie_armor, gated).unwrap_err();
        assert!(matches!(err, ModifierError::ConditionsNotMet { .. }));
        assert!(rx.try_recv().is_err());
        assert_eq!(store.value(rookie_armor), 10.0);

        veteran.add_modifier(&mut store, veteran_armor, gated).unwrap();
        assert_eq!(store.value(veteran_armor), 15.0);
        assert_eq!(
            rx.try_recv().unwrap(),
            AttributeEvent::ModifierAdded {
                target: veteran_armor,
                modifier: gated
            }
        );
    }

    #[test]
    fn foreign_targets_are_rejected() {
        let mut store = InstanceStore::new();
        let mut mine = AttributeContainer::new(EntityId(1));
        let mut other = AttributeContainer::new(EntityId(2));
        let theirs = other.insert(&mut store, AttributeInstance::new(armor()));
        let buff = mine.insert(&mut store, AttributeInstance::modifier(armor()));

        assert_eq!(
            mine.add_modifier(&mut store, theirs, buff),
            Err(ModifierError::ForeignTarget {
                target: theirs,
                owner: EntityId(1)
            })
        );
    }

    #[test]
    fn attach_skips_missing_targets_unless_forced() {
        let mut store = InstanceStore::new();
        let mut target = AttributeContainer::new(EntityId(1));
        let mut source = AttributeContainer::new(EntityId(2));
        let plain = source.insert(&mut store, AttributeInstance::modifier(armor()).with_flat(3.0));
        let forced = source.insert(
            &mut store,
            AttributeInstance::modifier(armor())
                .with_flat(4.0)
                .force_apply_if_missing(),
        );

        assert_eq!(
            target.attach(&mut store, plain),
            Err(ModifierError::MissingTarget(plain))
        );
        let created = target.attach(&mut store, forced).unwrap();
        assert_eq!(target.find(ARMOR), Some(created));
        assert_eq!(store.value(created), 4.0);
    }

    #[test]
    fn forced_attach_creates_nothing_when_conditions_fail() {
        let mut store = InstanceStore::new();
        let mut target = AttributeContainer::new(EntityId(1));
        let mut source = AttributeContainer::new(EntityId(2));
        target.insert(&mut store, AttributeInstance::new(level()).with_flat(1.0));
        let forced = source.insert(
            &mut store,
            AttributeInstance::modifier(armor())
                .with_flat(4.0)
                .force_apply_if_missing()
                .with_condition(ApplicationCondition::new("veterans").with_condition(
                    ModifierCondition::new(LEVEL, ConditionOperator::Greater, 10.0),
                )),
        );
        let mut rx = store.subscribe();

        assert_eq!(
            target.attach(&mut store, forced),
            Err(ModifierError::MissingTarget(forced))
        );
        assert_eq!(target.len(), 1);
        assert_eq!(target.find(ARMOR), None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn a_modifier_is_never_attached_to_itself() {
        let mut store = InstanceStore::new();
        let mut container = AttributeContainer::new(EntityId(1));
        let buff = container.insert(&mut store, AttributeInstance::modifier(armor()).with_flat(2.0));
        let base = container.insert(&mut store, AttributeInstance::new(armor()).with_flat(10.0));

        assert_eq!(container.attach(&mut store, buff), Ok(base));
        assert_eq!(store.value(base), 12.0);
        assert!(store.get(buff).unwrap().modifiers().is_empty());
    }

    #[test]
    fn bulk_add_and_remove_by_source() {
        let mut store = InstanceStore::new();
        let mut target = AttributeContainer::new(EntityId(1));
        let mut source = AttributeContainer::new(EntityId(2));
        let base_armor = target.insert(&mut store, AttributeInstance::new(armor()).with_flat(10.0));
        let base_level = target.insert(&mut store, AttributeInstance::new(level()).with_flat(1.0));
        source.insert(&mut store, AttributeInstance::new(armor()).with_flat(100.0));
        source.insert(&mut store, AttributeInstance::modifier(armor()).with_flat(5.0));
        source.insert(&mut store, AttributeInstance::modifier(level()).with_flat(2.0));

        let attached = target.add_modifiers(&mut store, &source);
        assert_eq!(attached.len(), 2);
        assert_eq!(store.value(base_armor), 15.0);
        assert_eq!(store.value(base_level), 3.0);

        assert_eq!(target.remove_modifiers(&mut store, &source), 2);
        assert_eq!(store.value(base_armor), 10.0);
        assert_eq!(store.value(base_level), 1.0);
        assert_eq!(target.remove_modifiers(&mut store, &source), 0);
    }

    #[test]
    fn detach_finds_the_holding_instance() {
        let mut store = InstanceStore::new();
        let mut target = AttributeContainer::new(EntityId(1));
        let mut source = AttributeContainer::new(EntityId(2));
        let base = target.insert(&mut store, AttributeInstance::new(armor()).with_flat(1.0));
        let buff = source.insert(&mut store, AttributeInstance::modifier(armor()).with_flat(1.0));

        target.attach(&mut store, buff).unwrap();
        assert_eq!(target.detach(&mut store, buff), Ok(base));
        assert_eq!(
            target.detach(&mut store, buff),
            Err(ModifierError::MissingTarget(buff))
        );
    }

    #[test]
    fn value_of_reports_missing_attributes() {
        let mut store = InstanceStore::new();
        let mut container = AttributeContainer::new(EntityId(1)).with_missing_attribute_warnings(false);
        container.insert(&mut store, AttributeInstance::new(level()).with_flat(4.0));

        assert_eq!(container.value_of(&store, LEVEL), Some(4.0));
        assert_eq!(container.value_of(&store, ARMOR), None);
    }
}
