//! Attribute definitions - the shared, read-only schema behind every instance.
//!
//! A definition is authored data: it is loaded once (see the content crate), wrapped
//! in an [`Arc`] and referenced by every [`AttributeInstance`](crate::AttributeInstance)
//! of that kind. Nothing in the engine mutates a definition after load.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Identity of an attribute definition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DefinitionId(pub u32);

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "def#{}", self.0)
    }
}

/// Where a modifier of this definition lands when its owner attaches to a parent.
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
pub enum PropagationMode {
    /// Only the parent's matching attribute.
    #[default]
    Parent,
    /// Every descendant of the parent, but not the parent itself.
    Child,
    /// The parent and every descendant.
    Both,
}

impl PropagationMode {
    /// Returns true if the parent itself receives the modifier.
    pub const fn reaches_parent(self) -> bool {
        matches!(self, Self::Parent | Self::Both)
    }

    /// Returns true if the parent's descendants receive the modifier.
    pub const fn reaches_descendants(self) -> bool {
        matches!(self, Self::Child | Self::Both)
    }
}

/// Inclusive clamp range for resolved values.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamps `value` into the range.
    ///
    /// Unlike [`f64::clamp`] this never panics on an inverted range; the lower
    /// bound wins.
    pub fn clamp(&self, value: f64) -> f64 {
        value.min(self.max).max(self.min)
    }
}

/// Schema describing one kind of attribute.
///
/// # Invariants
///
/// - `options` non-empty ⇔ [`has_options`](Self::has_options)
/// - Flag semantics ([`is_flags`](Self::is_flags)) require both options and
///   `options_are_flags`
/// - `range` present ⇔ [`has_min_max`](Self::has_min_max)
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AttributeDefinition {
    pub id: DefinitionId,
    pub name: String,

    /// Options are bit positions rather than enumeration indices.
    pub options_are_flags: bool,
    /// Enumeration labels (or flag labels, one per bit).
    pub options: Vec<String>,

    pub has_capacity: bool,
    pub allow_exceed_capacity: bool,
    pub min_capacity: f64,

    pub range: Option<ValueRange>,

    /// Multiplier per modifier rank; ranks past the end reuse the last entry.
    pub stack_penalty: Vec<f64>,

    pub propagation: PropagationMode,
}

impl AttributeDefinition {
    pub fn new(id: DefinitionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    /// Enumeration options (builder pattern).
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self.options_are_flags = false;
        self
    }

    /// Flag options, one label per bit (builder pattern).
    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = flags.into_iter().map(Into::into).collect();
        self.options_are_flags = true;
        self
    }

    /// Enables capacity tracking (builder pattern).
    pub fn with_capacity(mut self, allow_exceed: bool, min_capacity: f64) -> Self {
        self.has_capacity = true;
        self.allow_exceed_capacity = allow_exceed;
        self.min_capacity = min_capacity;
        self
    }

    /// Clamps resolved values to `[min, max]` (builder pattern).
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = Some(ValueRange::new(min, max));
        self
    }

    /// Sets the stacking-penalty curve (builder pattern).
    pub fn with_stack_penalty(mut self, penalty: impl IntoIterator<Item = f64>) -> Self {
        self.stack_penalty = penalty.into_iter().collect();
        self
    }

    /// Sets the propagation mode (builder pattern).
    pub fn with_propagation(mut self, propagation: PropagationMode) -> Self {
        self.propagation = propagation;
        self
    }

    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }

    /// Returns true if values of this definition are bit patterns.
    pub fn is_flags(&self) -> bool {
        self.has_options() && self.options_are_flags
    }

    pub fn has_min_max(&self) -> bool {
        self.range.is_some()
    }

    pub fn has_stack_penalty(&self) -> bool {
        !self.stack_penalty.is_empty()
    }

    /// Penalty multiplier for the modifier at `rank` (0-based, after sorting).
    ///
    /// Returns `None` when the definition has no penalty table.
    pub fn stack_penalty_at(&self, rank: usize) -> Option<f64> {
        let last = self.stack_penalty.len().checked_sub(1)?;
        self.stack_penalty.get(rank.min(last)).copied()
    }

    /// Bit pattern with every option flag set: `2^|options| - 1`.
    pub fn flag_everything_value(&self) -> u64 {
        match self.options.len() {
            0 => 0,
            n if n >= 64 => u64::MAX,
            n => (1u64 << n) - 1,
        }
    }
}

/// Read-only set of loaded definitions, keyed by id.
#[derive(Clone, Debug, Default)]
pub struct DefinitionCatalog {
    definitions: BTreeMap<DefinitionId, Arc<AttributeDefinition>>,
}

impl DefinitionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition, returning the shared handle.
    ///
    /// Returns `None` (and leaves the catalog unchanged) if the id is already taken.
    pub fn insert(&mut self, definition: AttributeDefinition) -> Option<Arc<AttributeDefinition>> {
        if self.definitions.contains_key(&definition.id) {
            return None;
        }
        let id = definition.id;
        let shared = Arc::new(definition);
        self.definitions.insert(id, Arc::clone(&shared));
        Some(shared)
    }

    pub fn get(&self, id: DefinitionId) -> Option<&Arc<AttributeDefinition>> {
        self.definitions.get(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<AttributeDefinition>> {
        self.definitions.values().find(|d| d.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AttributeDefinition>> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
