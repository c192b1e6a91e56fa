//! Attribute resolution and propagation for hierarchical entities.
//!
//! `attribute-core` computes numeric attributes whose values are shaped by stacked,
//! conditional modifiers. Modifiers travel across a multi-parent entity tree as edges
//! are created and removed. Values are pull-based: reading an attribute walks its
//! live modifier graph; nothing numeric is cached.
//!
//! [`AttributeWorld`] is the usual entry point. The building blocks
//! ([`InstanceStore`], [`AttributeContainer`], [`PropagationEngine`]) are public for
//! callers that bring their own tree or registry.
pub mod condition;
pub mod config;
pub mod container;
pub mod definition;
pub mod entity;
pub mod error;
pub mod events;
pub mod flags;
pub mod instance;
pub mod propagation;
pub mod registry;
pub mod store;
pub mod tree;
pub mod world;

pub use condition::{
    ApplicationCondition, ConditionGate, ConditionOperator, ModifierCondition, all_can_apply,
};
pub use config::EngineConfig;
pub use container::{Attachment, AttributeContainer};
pub use definition::{
    AttributeDefinition, DefinitionCatalog, DefinitionId, PropagationMode, ValueRange,
};
pub use entity::{
    Entity, EntityError, EntityId, EntityTemplate, Tag, TagFilter, TagFilterMatch, TagFilterRule,
    Taggable,
};
pub use error::{AttributeSystemError, ErrorSeverity};
pub use events::{AttributeEvent, EventBus};
pub use instance::{AttributeInstance, AttributeKind, CapacityError, FlagOperator, InstanceId};
pub use propagation::{PropagationEngine, PropagationLedger, PropagationReport};
pub use registry::{EntityManager, EntityRegistry};
pub use store::{InstanceStore, ModifierError};
pub use tree::{ConnectError, Edge, MultiParentTree, TreeConnectivity};
pub use world::AttributeWorld;
