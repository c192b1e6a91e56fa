//! Entity registration.

use std::collections::BTreeSet;

use crate::entity::EntityId;

/// Tracks which entities are alive. Each entity is registered once on spawn and
/// deregistered once on destroy.
pub trait EntityRegistry {
    /// Returns false if `id` was already registered.
    fn register(&mut self, id: EntityId) -> bool;

    /// Returns false if `id` was not registered.
    fn deregister(&mut self, id: EntityId) -> bool;

    fn is_registered(&self, id: EntityId) -> bool;
}

/// In-memory registry.
#[derive(Clone, Debug, Default)]
pub struct EntityManager {
    registered: BTreeSet<EntityId>,
}

impl EntityManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.registered.iter().copied()
    }
}

impl EntityRegistry for EntityManager {
    fn register(&mut self, id: EntityId) -> bool {
        self.registered.insert(id)
    }

    fn deregister(&mut self, id: EntityId) -> bool {
        self.registered.remove(&id)
    }

    fn is_registered(&self, id: EntityId) -> bool {
        self.registered.contains(&id)
    }
}
