//! Entities: an attribute container plus tags and an accept-filter.
//!
//! Tree edges are not stored on the entity; they live in the
//! [`TreeConnectivity`](crate::TreeConnectivity) collaborator.

pub mod tags;

use std::fmt;

use crate::container::AttributeContainer;
use crate::error::{AttributeSystemError, ErrorSeverity};
use crate::instance::AttributeInstance;

pub use tags::{Tag, TagFilter, TagFilterMatch, TagFilterRule, Taggable};

/// Identity of an entity inside an [`AttributeWorld`](crate::AttributeWorld).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Errors that can occur while spawning, destroying or addressing entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EntityError {
    #[error("entity {0} not found")]
    UnknownEntity(EntityId),

    #[error("entity {0} is already registered")]
    AlreadyRegistered(EntityId),
}

impl AttributeSystemError for EntityError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnknownEntity(_) => ErrorSeverity::Validation,
            Self::AlreadyRegistered(_) => ErrorSeverity::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownEntity(_) => "ENTITY_UNKNOWN",
            Self::AlreadyRegistered(_) => "ENTITY_ALREADY_REGISTERED",
        }
    }
}

/// Blueprint a new entity is cloned from.
///
/// Every attribute is copied with [`AttributeInstance::clone_for`], so spawned
/// entities never share live modifier lists with the template.
#[derive(Clone, Debug, Default)]
pub struct EntityTemplate {
    pub name: String,
    pub tags: Vec<Tag>,
    pub accept_filter: Vec<TagFilterMatch>,
    pub attributes: Vec<AttributeInstance>,
}

impl EntityTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(Tag::new(tag));
        self
    }

    pub fn with_filter(mut self, filter: TagFilterMatch) -> Self {
        self.accept_filter.push(filter);
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeInstance) -> Self {
        self.attributes.push(attribute);
        self
    }
}

impl Taggable for EntityTemplate {
    fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

/// A live node: its attributes, its tags and the filter it applies to children.
#[derive(Clone, Debug)]
pub struct Entity {
    id: EntityId,
    pub name: String,
    pub tags: Vec<Tag>,
    pub accept_filter: Vec<TagFilterMatch>,
    pub container: AttributeContainer,
}

impl Entity {
    pub(crate) fn new(id: EntityId, template: &EntityTemplate, container: AttributeContainer) -> Self {
        Self {
            id,
            name: template.name.clone(),
            tags: template.tags.clone(),
            accept_filter: template.accept_filter.clone(),
            container,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns true if `candidate` passes every accept-filter rule.
    pub fn accepts(&self, candidate: &dyn Taggable) -> bool {
        self.accept_filter.as_slice().matches(candidate)
    }
}

impl Taggable for Entity {
    fn tags(&self) -> &[Tag] {
        &self.tags
    }
}
