//! The attribute world: entities, their attributes and the tree that connects them.
//!
//! [`AttributeWorld`] owns the [`InstanceStore`], every [`Entity`], the tree and
//! registry collaborators and the [`PropagationLedger`]. Edge operations run the
//! [`PropagationEngine`] so modifiers follow connections automatically:
//!
//! - connect: filter check, edge creation, then propagation
//! - disconnect: retraction, then edge removal
//! - destroy: retract from all parents, detach all children, deregister, purge

use std::collections::BTreeMap;

use tokio::sync::broadcast;

use crate::config::EngineConfig;
use crate::container::{Attachment, AttributeContainer};
use crate::definition::DefinitionId;
use crate::entity::{Entity, EntityError, EntityId, EntityTemplate};
use crate::events::{AttributeEvent, EventBus};
use crate::instance::{AttributeInstance, CapacityError, InstanceId};
use crate::propagation::{PropagationEngine, PropagationLedger, PropagationReport};
use crate::registry::{EntityManager, EntityRegistry};
use crate::store::{InstanceStore, ModifierError};
use crate::tree::{ConnectError, Edge, MultiParentTree, TreeConnectivity};

pub struct AttributeWorld<T = MultiParentTree, R = EntityManager>
where
    T: TreeConnectivity,
    R: EntityRegistry,
{
    config: EngineConfig,
    store: InstanceStore,
    entities: BTreeMap<EntityId, Entity>,
    tree: T,
    registry: R,
    ledger: PropagationLedger,
    next_entity: u32,
}

impl AttributeWorld {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_collaborators(config, MultiParentTree::new(), EntityManager::new())
    }
}

impl Default for AttributeWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R> AttributeWorld<T, R>
where
    T: TreeConnectivity,
    R: EntityRegistry,
{
    pub fn with_collaborators(config: EngineConfig, tree: T, registry: R) -> Self {
        let events = EventBus::with_capacity(config.event_capacity);
        Self {
            config,
            store: InstanceStore::with_events(events),
            entities: BTreeMap::new(),
            tree,
            registry,
            ledger: PropagationLedger::new(),
            next_entity: 1,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &InstanceStore {
        &self.store
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn ledger(&self) -> &PropagationLedger {
        &self.ledger
    }

    /// Subscribe to modifier and capacity changes across the world.
    pub fn subscribe(&self) -> broadcast::Receiver<AttributeEvent> {
        self.store.subscribe()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    fn engine(&mut self) -> PropagationEngine<'_, T> {
        PropagationEngine::new(
            &self.tree,
            &mut self.entities,
            &mut self.store,
            &mut self.ledger,
        )
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Creates an entity from `template`, registering it and cloning every template
    /// attribute into a fresh container.
    pub fn spawn(&mut self, template: &EntityTemplate) -> Result<EntityId, EntityError> {
        let id = EntityId(self.next_entity);
        if !self.registry.register(id) {
            return Err(EntityError::AlreadyRegistered(id));
        }
        self.next_entity += 1;

        let mut container = AttributeContainer::new(id)
            .with_missing_attribute_warnings(self.config.warn_on_missing_attribute);
        for attribute in &template.attributes {
            container.insert(&mut self.store, attribute.clone_for(id));
        }

        tracing::debug!(entity = %id, name = %template.name, attributes = container.len(), "spawned");
        self.entities
            .insert(id, Entity::new(id, template, container));
        Ok(id)
    }

    /// Tears an entity down.
    ///
    /// Its modifiers are retracted from every parent, every child is disconnected
    /// (retracting the child's modifiers from it), the entity is deregistered, and
    /// its instances are purged from any modifier list still referencing them.
    pub fn destroy(&mut self, id: EntityId) -> Result<(), EntityError> {
        if !self.entities.contains_key(&id) {
            return Err(EntityError::UnknownEntity(id));
        }

        let retracted = self.disconnect_from_all_parents(id);
        tracing::trace!(entity = %id, edges = retracted.len(), "retracted from parents");
        for child in self.tree.children(id) {
            if let Err(err) = self.disconnect_from_parent(child, id) {
                tracing::warn!(entity = %id, child = %child, %err, "failed to detach child");
            }
        }

        self.registry.deregister(id);
        if let Some(mut entity) = self.entities.remove(&id) {
            let purged = entity.container.clear(&mut self.store);
            tracing::debug!(entity = %id, purged, "destroyed");
        }
        Ok(())
    }

    // ========================================================================
    // Tree edges
    // ========================================================================

    /// Connects `child` under `parent` and propagates the child's modifiers.
    ///
    /// The parent's accept-filter is evaluated against the child's tags first; a
    /// mismatch rejects the edge without changing anything.
    pub fn try_apply_to(
        &mut self,
        child: EntityId,
        parent: EntityId,
    ) -> Result<PropagationReport, ConnectError> {
        let child_entity = self
            .entities
            .get(&child)
            .ok_or(ConnectError::UnknownEntity(child))?;
        let parent_entity = self
            .entities
            .get(&parent)
            .ok_or(ConnectError::UnknownEntity(parent))?;

        if !parent_entity.accepts(child_entity) {
            let edge = Edge::new(child, parent);
            tracing::debug!(%edge, "rejected by accept filter");
            return Err(ConnectError::Rejected(edge));
        }

        let edge = self.tree.connect_to_parent(child, parent)?;
        Ok(self.engine().apply(edge))
    }

    /// Retracts the child's modifiers from `parent`'s side, then drops the edge.
    pub fn disconnect_from_parent(
        &mut self,
        child: EntityId,
        parent: EntityId,
    ) -> Result<PropagationReport, ConnectError> {
        let edge = Edge::new(child, parent);
        if !self.tree.is_connected(child, parent) {
            return Err(ConnectError::NotConnected(edge));
        }

        let report = self.engine().retract(edge);
        self.tree.disconnect_from_parent(child, parent);
        Ok(report)
    }

    /// Disconnects `child` from every parent, one edge at a time.
    pub fn disconnect_from_all_parents(&mut self, child: EntityId) -> Vec<PropagationReport> {
        self.tree
            .parents(child)
            .into_iter()
            .filter_map(|parent| self.disconnect_from_parent(child, parent).ok())
            .collect()
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Adds an attribute to an existing entity.
    pub fn insert_attribute(
        &mut self,
        entity: EntityId,
        attribute: AttributeInstance,
    ) -> Result<InstanceId, EntityError> {
        let target = self
            .entities
            .get_mut(&entity)
            .ok_or(EntityError::UnknownEntity(entity))?;
        Ok(target.container.insert(&mut self.store, attribute))
    }

    /// Removes an attribute from an entity, scrubbing every reference to it.
    pub fn remove_attribute(
        &mut self,
        entity: EntityId,
        id: InstanceId,
    ) -> Result<Option<AttributeInstance>, EntityError> {
        let target = self
            .entities
            .get_mut(&entity)
            .ok_or(EntityError::UnknownEntity(entity))?;
        Ok(target.container.remove(&mut self.store, id))
    }

    /// Instance of `definition` on `entity`.
    pub fn attribute(&self, entity: EntityId, definition: DefinitionId) -> Option<InstanceId> {
        self.entities.get(&entity)?.container.lookup(definition)
    }

    pub fn instance(&self, id: InstanceId) -> Option<&AttributeInstance> {
        self.store.get(id)
    }

    /// Resolved value of an instance.
    pub fn value(&self, id: InstanceId) -> f64 {
        self.store.value(id)
    }

    /// Resolved value of `entity`'s `definition` attribute.
    pub fn value_of(&self, entity: EntityId, definition: DefinitionId) -> Option<f64> {
        self.entities
            .get(&entity)?
            .container
            .value_of(&self.store, definition)
    }

    /// Attaches `modifier` to `target` through the target owner's container.
    pub fn add_modifier(&mut self, target: InstanceId, modifier: InstanceId) -> Result<(), ModifierError> {
        let owner = self.owner_of(target)?;
        let entity = self
            .entities
            .get(&owner)
            .ok_or(ModifierError::UnknownInstance(target))?;
        entity.container.add_modifier(&mut self.store, target, modifier)
    }

    /// Removes one reference to `modifier` from `target`.
    pub fn remove_modifier(&mut self, target: InstanceId, modifier: InstanceId) -> Result<(), ModifierError> {
        let owner = self.owner_of(target)?;
        let entity = self
            .entities
            .get(&owner)
            .ok_or(ModifierError::UnknownInstance(target))?;
        entity.container.remove_modifier(&mut self.store, target, modifier)
    }

    fn owner_of(&self, target: InstanceId) -> Result<EntityId, ModifierError> {
        self.store
            .get(target)
            .and_then(AttributeInstance::owner)
            .ok_or(ModifierError::UnknownInstance(target))
    }

    /// Attaches every modifier of `source` to matching attributes of `entity`.
    pub fn add_modifiers(
        &mut self,
        entity: EntityId,
        source: EntityId,
    ) -> Result<Vec<Attachment>, EntityError> {
        let modifiers = self
            .entities
            .get(&source)
            .ok_or(EntityError::UnknownEntity(source))?
            .container
            .modifier_ids(&self.store);
        let target = self
            .entities
            .get_mut(&entity)
            .ok_or(EntityError::UnknownEntity(entity))?;
        Ok(target.container.add_modifiers_from(&mut self.store, &modifiers))
    }

    /// Removes every modifier owned by `source` from `entity`.
    pub fn remove_modifiers(&mut self, entity: EntityId, source: EntityId) -> Result<usize, EntityError> {
        let target = self
            .entities
            .get(&entity)
            .ok_or(EntityError::UnknownEntity(entity))?;
        Ok(target.container.remove_modifiers_from(&mut self.store, source))
    }

    pub fn add_usage(&mut self, id: InstanceId, amount: f64) -> Result<f64, CapacityError> {
        self.store.add_usage(id, amount)
    }

    pub fn remove_usage(&mut self, id: InstanceId, amount: f64) -> Result<f64, CapacityError> {
        self.store.remove_usage(id, amount)
    }
}
