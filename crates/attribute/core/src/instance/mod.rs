//! Attribute instances - the live numeric slots on an entity.
//!
//! An instance binds a shared [`AttributeDefinition`] to per-entity state: base
//! `flat`/`factor` values, capacity usage, and the list of modifiers currently
//! attached to it. Modifiers are themselves instances (of kind
//! [`AttributeKind::Modifier`]) owned by some container, referenced here by
//! [`InstanceId`]; a modifier may carry modifiers of its own.
//!
//! Instances live in an [`InstanceStore`](crate::InstanceStore). Value resolution
//! ([`resolve`]) and capacity bookkeeping ([`capacity`]) are store operations
//! because they need to follow modifier references.

pub mod capacity;
pub mod resolve;

use std::fmt;
use std::sync::Arc;

use crate::condition::ApplicationCondition;
use crate::definition::{AttributeDefinition, DefinitionId};
use crate::entity::EntityId;

pub use capacity::CapacityError;

/// Identity of an attribute instance inside an [`InstanceStore`](crate::InstanceStore).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct InstanceId(pub u32);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attr#{}", self.0)
    }
}

/// Role of an instance on its owning entity.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AttributeKind {
    /// A value the entity has.
    #[default]
    Base,
    /// A contribution the entity pushes onto matching attributes of related entities.
    Modifier,
}

/// How a modifier combines with a flag-typed target.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FlagOperator {
    /// Bitwise OR.
    #[default]
    AddFlag,
    /// Bitwise AND-NOT.
    RemoveFlag,
    /// Replace the running pattern.
    Set,
}

/// A live attribute slot.
///
/// # Invariants
///
/// - The resolved value derives only from `flat`, `factor`, the definition and the
///   transitive closure of `modifiers`; nothing numeric is cached
/// - `capacity_used` is the only state that persists between reads
/// - `modifiers` is mutated only through the owning container
#[derive(Clone, Debug)]
pub struct AttributeInstance {
    definition: Option<Arc<AttributeDefinition>>,
    pub kind: AttributeKind,
    pub flat: f64,
    pub factor: f64,
    pub flag_operator: FlagOperator,
    /// When acting as a modifier, create the target attribute if the receiving
    /// entity lacks one.
    pub force_apply_if_missing: bool,
    pub conditions: Vec<ApplicationCondition>,
    capacity_used: f64,
    modifiers: Vec<InstanceId>,
    owner: Option<EntityId>,
}

impl AttributeInstance {
    /// Creates a base attribute of `definition`.
    pub fn new(definition: Arc<AttributeDefinition>) -> Self {
        Self {
            definition: Some(definition),
            ..Self::unbound()
        }
    }

    /// Creates a modifier of `definition`.
    pub fn modifier(definition: Arc<AttributeDefinition>) -> Self {
        Self {
            kind: AttributeKind::Modifier,
            ..Self::new(definition)
        }
    }

    /// Creates an instance with no definition. Its value is always zero.
    pub fn unbound() -> Self {
        Self {
            definition: None,
            kind: AttributeKind::Base,
            flat: 0.0,
            factor: 0.0,
            flag_operator: FlagOperator::default(),
            force_apply_if_missing: false,
            conditions: Vec::new(),
            capacity_used: 0.0,
            modifiers: Vec::new(),
            owner: None,
        }
    }

    pub fn with_flat(mut self, flat: f64) -> Self {
        self.flat = flat;
        self
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_flag_operator(mut self, operator: FlagOperator) -> Self {
        self.flag_operator = operator;
        self
    }

    pub fn with_condition(mut self, condition: ApplicationCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Opts this modifier into creating missing targets (builder pattern).
    pub fn force_apply_if_missing(mut self) -> Self {
        self.force_apply_if_missing = true;
        self
    }

    pub fn definition(&self) -> Option<&Arc<AttributeDefinition>> {
        self.definition.as_ref()
    }

    pub fn definition_id(&self) -> Option<DefinitionId> {
        self.definition.as_ref().map(|d| d.id)
    }

    /// Entity whose container holds this instance.
    pub fn owner(&self) -> Option<EntityId> {
        self.owner
    }

    /// Modifiers attached directly to this instance, in attachment order.
    pub fn modifiers(&self) -> &[InstanceId] {
        &self.modifiers
    }

    pub fn capacity_used(&self) -> f64 {
        self.capacity_used
    }

    pub fn is_modifier(&self) -> bool {
        self.kind == AttributeKind::Modifier
    }

    pub fn has_options(&self) -> bool {
        self.definition.as_ref().is_some_and(|d| d.has_options())
    }

    pub fn is_flags(&self) -> bool {
        self.definition.as_ref().is_some_and(|d| d.is_flags())
    }

    /// Capacity applies to base, non-option attributes whose definition tracks it.
    pub fn can_use_capacity(&self) -> bool {
        self.kind == AttributeKind::Base
            && self
                .definition
                .as_ref()
                .is_some_and(|d| d.has_capacity && !d.has_options())
    }

    /// Copies this instance for a new owner.
    ///
    /// Scalar fields and application conditions are copied; the copy starts with
    /// no attached modifiers. Cloning instantiates a fresh entity from a template,
    /// it does not duplicate live state.
    pub fn clone_for(&self, owner: EntityId) -> Self {
        Self {
            definition: self.definition.clone(),
            kind: self.kind,
            flat: self.flat,
            factor: self.factor,
            flag_operator: self.flag_operator,
            force_apply_if_missing: self.force_apply_if_missing,
            conditions: self.conditions.clone(),
            capacity_used: self.capacity_used,
            modifiers: Vec::new(),
            owner: Some(owner),
        }
    }

    pub(crate) fn set_owner(&mut self, owner: EntityId) {
        self.owner = Some(owner);
    }

    pub(crate) fn set_capacity_used(&mut self, used: f64) {
        self.capacity_used = used;
    }

    pub(crate) fn push_modifier(&mut self, modifier: InstanceId) {
        self.modifiers.push(modifier);
    }

    /// Removes the most recent reference to `modifier`.
    pub(crate) fn remove_modifier(&mut self, modifier: InstanceId) -> bool {
        match self.modifiers.iter().rposition(|&m| m == modifier) {
            Some(index) => {
                self.modifiers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Removes every reference matching `predicate`, returning them in list order.
    pub(crate) fn drain_modifiers(
        &mut self,
        mut predicate: impl FnMut(InstanceId) -> bool,
    ) -> Vec<InstanceId> {
        let mut removed = Vec::new();
        self.modifiers.retain(|&m| {
            if predicate(m) {
                removed.push(m);
                false
            } else {
                true
            }
        });
        removed
    }
}

impl Default for AttributeInstance {
    fn default() -> Self {
        Self::unbound()
    }
}
