//! Instance storage.
//!
//! Every attribute instance of every entity lives in one [`InstanceStore`], addressed by
//! [`InstanceId`]. Ids are never reused, so a stale id resolves to "absent" rather than
//! to an unrelated instance. Modifier references between instances are plain ids, which
//! lets an instance owned by one entity modify attributes of many others.
//!
//! The store exposes read access publicly. Structural mutation of modifier lists is
//! crate-internal: callers go through [`AttributeContainer`](crate::AttributeContainer),
//! which evaluates application conditions first.

use tokio::sync::broadcast;

use crate::entity::EntityId;
use crate::error::{AttributeSystemError, ErrorSeverity};
use crate::events::{AttributeEvent, EventBus};
use crate::instance::{AttributeInstance, InstanceId};

/// Errors that can occur while attaching or detaching modifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ModifierError {
    #[error("instance {0} not found")]
    UnknownInstance(InstanceId),

    #[error("instance {target} is not owned by {owner}")]
    ForeignTarget { target: InstanceId, owner: EntityId },

    #[error("modifier {modifier} rejected by application conditions for {target}")]
    ConditionsNotMet {
        target: InstanceId,
        modifier: InstanceId,
    },

    #[error("attaching {modifier} to {target} would create a modifier cycle")]
    WouldCycle {
        target: InstanceId,
        modifier: InstanceId,
    },

    #[error("modifier {modifier} is not attached to {target}")]
    NotAttached {
        target: InstanceId,
        modifier: InstanceId,
    },

    #[error("modifier {0} has no attribute to modify on the receiving entity")]
    MissingTarget(InstanceId),

    #[error("instance {0} has no definition")]
    Unbound(InstanceId),
}

impl AttributeSystemError for ModifierError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ConditionsNotMet { .. } | Self::NotAttached { .. } | Self::MissingTarget(_) => {
                ErrorSeverity::Recoverable
            }
            Self::UnknownInstance(_) | Self::ForeignTarget { .. } | Self::Unbound(_) => {
                ErrorSeverity::Validation
            }
            Self::WouldCycle { .. } => ErrorSeverity::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownInstance(_) => "MODIFIER_UNKNOWN_INSTANCE",
            Self::ForeignTarget { .. } => "MODIFIER_FOREIGN_TARGET",
            Self::ConditionsNotMet { .. } => "MODIFIER_CONDITIONS_NOT_MET",
            Self::WouldCycle { .. } => "MODIFIER_WOULD_CYCLE",
            Self::NotAttached { .. } => "MODIFIER_NOT_ATTACHED",
            Self::MissingTarget(_) => "MODIFIER_MISSING_TARGET",
            Self::Unbound(_) => "MODIFIER_UNBOUND",
        }
    }
}

/// Arena of attribute instances plus the event channel for their changes.
#[derive(Debug, Default)]
pub struct InstanceStore {
    slots: Vec<Option<AttributeInstance>>,
    live: usize,
    events: EventBus,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store publishing to `events`.
    pub fn with_events(events: EventBus) -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
            events,
        }
    }

    /// Adds an instance and returns its id.
    pub fn insert(&mut self, instance: AttributeInstance) -> InstanceId {
        let id = InstanceId(self.slots.len() as u32);
        self.slots.push(Some(instance));
        self.live += 1;
        id
    }

    pub fn get(&self, id: InstanceId) -> Option<&AttributeInstance> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: InstanceId) -> Option<&mut AttributeInstance> {
        self.slots.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &AttributeInstance)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|i| (InstanceId(index as u32), i)))
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to modifier and capacity changes.
    pub fn subscribe(&self) -> broadcast::Receiver<AttributeEvent> {
        self.events.subscribe()
    }

    /// Removes an instance and scrubs every reference to it from other modifier lists.
    pub(crate) fn remove(&mut self, id: InstanceId) -> Option<AttributeInstance> {
        let removed = self.slots.get_mut(id.0 as usize)?.take()?;
        self.live -= 1;

        let mut scrubbed = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(instance) = slot else { continue };
            let target = InstanceId(index as u32);
            scrubbed.extend(
                instance
                    .drain_modifiers(|m| m == id)
                    .into_iter()
                    .map(|modifier| (target, modifier)),
            );
        }
        for (target, modifier) in scrubbed {
            self.events
                .publish(AttributeEvent::ModifierRemoved { target, modifier });
        }

        Some(removed)
    }

    /// Appends `modifier` to `target`'s list.
    ///
    /// Conditions are not evaluated here; that is the container's job. The same
    /// modifier may be attached more than once; each attachment is one reference.
    pub(crate) fn attach(
        &mut self,
        target: InstanceId,
        modifier: InstanceId,
    ) -> Result<(), ModifierError> {
        if !self.contains(modifier) {
            return Err(ModifierError::UnknownInstance(modifier));
        }
        if self.reaches(modifier, target) {
            tracing::warn!(target = %target, modifier = %modifier, "rejected cyclic modifier");
            return Err(ModifierError::WouldCycle { target, modifier });
        }
        let instance = self
            .get_mut(target)
            .ok_or(ModifierError::UnknownInstance(target))?;
        instance.push_modifier(modifier);

        self.events
            .publish(AttributeEvent::ModifierAdded { target, modifier });
        Ok(())
    }

    /// Removes one reference to `modifier` from `target`.
    pub(crate) fn detach(
        &mut self,
        target: InstanceId,
        modifier: InstanceId,
    ) -> Result<(), ModifierError> {
        let instance = self
            .get_mut(target)
            .ok_or(ModifierError::UnknownInstance(target))?;
        if !instance.remove_modifier(modifier) {
            return Err(ModifierError::NotAttached { target, modifier });
        }

        self.events
            .publish(AttributeEvent::ModifierRemoved { target, modifier });
        Ok(())
    }

    /// Removes every modifier owned by `owner` from `target`, returning how many
    /// references were dropped.
    pub(crate) fn detach_owned_by(&mut self, target: InstanceId, owner: EntityId) -> usize {
        let owned: Vec<InstanceId> = match self.get(target) {
            Some(instance) => instance
                .modifiers()
                .iter()
                .copied()
                .filter(|&m| self.get(m).and_then(AttributeInstance::owner) == Some(owner))
                .collect(),
            None => return 0,
        };
        if owned.is_empty() {
            return 0;
        }

        let Some(instance) = self.get_mut(target) else {
            return 0;
        };
        let removed = instance.drain_modifiers(|m| owned.contains(&m));
        for &modifier in &removed {
            self.events
                .publish(AttributeEvent::ModifierRemoved { target, modifier });
        }
        removed.len()
    }
}
