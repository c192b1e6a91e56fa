//! Application conditions - gates a modifier must pass before it attaches.
//!
//! A [`ModifierCondition`] compares one attribute of the *target* entity against a
//! threshold. An [`ApplicationCondition`] groups several of them under an ALL/ANY
//! gate. Modifiers carry a list of groups; every applicable group must pass.

use crate::container::AttributeContainer;
use crate::definition::DefinitionId;
use crate::flags;
use crate::store::InstanceStore;

/// Comparison applied between the target's resolved value and a threshold.
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
pub enum ConditionOperator {
    #[default]
    Equals,
    Greater,
    Less,
    GreaterOrEquals,
    LessOrEquals,
    NotEquals,
    /// Every bit of the threshold is set in the value.
    ContainsFlag,
    /// At least one bit of the threshold is missing from the value.
    NotContainsFlag,
}

impl ConditionOperator {
    /// Applies the operator as `current <op> threshold`.
    ///
    /// Equality is exact: thresholds are authored data and resolved values of
    /// unmodified attributes reproduce them bit for bit.
    pub fn evaluate(self, current: f64, threshold: f64) -> bool {
        match self {
            Self::Equals => current == threshold,
            Self::Greater => current > threshold,
            Self::Less => current < threshold,
            Self::GreaterOrEquals => current >= threshold,
            Self::LessOrEquals => current <= threshold,
            Self::NotEquals => current != threshold,
            Self::ContainsFlag => flags::contains(current, threshold),
            Self::NotContainsFlag => !flags::contains(current, threshold),
        }
    }
}

/// A single comparison rule against another attribute of the target entity.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModifierCondition {
    /// Attribute of the target entity to read.
    pub definition: DefinitionId,
    pub operator: ConditionOperator,
    pub threshold: f64,
}

impl ModifierCondition {
    pub fn new(definition: DefinitionId, operator: ConditionOperator, threshold: f64) -> Self {
        Self {
            definition,
            operator,
            threshold,
        }
    }

    /// Evaluates the rule against `container`.
    ///
    /// A container without the referenced attribute fails the rule. The miss is
    /// reported through [`AttributeContainer::lookup`].
    pub fn evaluate(&self, container: &AttributeContainer, store: &InstanceStore) -> bool {
        container
            .value_of(store, self.definition)
            .is_some_and(|current| self.operator.evaluate(current, self.threshold))
    }
}

/// How the rules of a group combine.
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
pub enum ConditionGate {
    #[default]
    AllMustBeTrue,
    AnyMustBeTrue,
}

/// A named group of rules gating a modifier's attachment.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ApplicationCondition {
    pub name: String,
    /// Only gate attachment to instances of this definition; `None` gates every target.
    pub target: Option<DefinitionId>,
    pub gate: ConditionGate,
    pub conditions: Vec<ModifierCondition>,
}

impl ApplicationCondition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Restricts this group to targets of `definition` (builder pattern).
    pub fn targeting(mut self, definition: DefinitionId) -> Self {
        self.target = Some(definition);
        self
    }

    /// Sets the gate (builder pattern).
    pub fn with_gate(mut self, gate: ConditionGate) -> Self {
        self.gate = gate;
        self
    }

    /// Appends a rule (builder pattern).
    pub fn with_condition(mut self, condition: ModifierCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Returns true if this group gates attachment to an instance of `definition`.
    pub fn applies_to(&self, definition: Option<DefinitionId>) -> bool {
        match self.target {
            None => true,
            Some(target) => Some(target) == definition,
        }
    }

    /// Evaluates the group against the target's container.
    ///
    /// An empty group always passes.
    pub fn can_apply(&self, container: &AttributeContainer, store: &InstanceStore) -> bool {
        if self.conditions.is_empty() {
            return true;
        }
        match self.gate {
            ConditionGate::AllMustBeTrue => self
                .conditions
                .iter()
                .all(|c| c.evaluate(container, store)),
            ConditionGate::AnyMustBeTrue => self
                .conditions
                .iter()
                .any(|c| c.evaluate(container, store)),
        }
    }
}

/// Evaluates every group in `conditions` that applies to `definition`.
pub fn all_can_apply(
    conditions: &[ApplicationCondition],
    definition: Option<DefinitionId>,
    container: &AttributeContainer,
    store: &InstanceStore,
) -> bool {
    conditions
        .iter()
        .filter(|group| group.applies_to(definition))
        .all(|group| group.can_apply(container, store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::AttributeDefinition;
    use crate::entity::EntityId;
    use crate::instance::AttributeInstance;
    use std::sync::Arc;

    const LEVEL: DefinitionId = DefinitionId(1);
    const ELEMENT: DefinitionId = DefinitionId(2);

    fn container_with_level(level: f64) -> (AttributeContainer, InstanceStore) {
        let mut store = InstanceStore::new();
        let mut container = AttributeContainer::new(EntityId(1));
        let level_def = Arc::new(AttributeDefinition::new(LEVEL, "level"));
        let element_def = Arc::new(
            AttributeDefinition::new(ELEMENT, "element").with_flags(["fire", "water", "air"]),
        );
        container.insert(
            &mut store,
            AttributeInstance::new(level_def).with_flat(level),
        );
        container.insert(
            &mut store,
            AttributeInstance::new(element_def).with_flat(0b101 as f64),
        );
        (container, store)
    }

    #[test]
    fn operators_compare_current_against_threshold() {
        use ConditionOperator::*;
        assert!(Equals.evaluate(10.0, 10.0));
        assert!(Greater.evaluate(11.0, 10.0));
        assert!(Less.evaluate(9.0, 10.0));
        assert!(GreaterOrEquals.evaluate(10.0, 10.0));
        assert!(LessOrEquals.evaluate(10.0, 10.0));
        assert!(NotEquals.evaluate(9.0, 10.0));
        assert!(ContainsFlag.evaluate(0b110 as f64, 0b100 as f64));
        assert!(NotContainsFlag.evaluate(0b010 as f64, 0b100 as f64));
    }

    #[test]
    fn empty_group_always_passes() {
        let (container, store) = container_with_level(1.0);
        assert!(ApplicationCondition::new("empty").can_apply(&container, &store));
    }

    #[test]
    fn all_gate_fails_on_any_failing_rule() {
        let (container, store) = container_with_level(10.0);
        let group = ApplicationCondition::new("veteran")
            .with_condition(ModifierCondition::new(
                LEVEL,
                ConditionOperator::GreaterOrEquals,
                5.0,
            ))
            .with_condition(ModifierCondition::new(
                ELEMENT,
                ConditionOperator::ContainsFlag,
                0b010 as f64,
            ));
        assert!(!group.can_apply(&container, &store));
    }

    #[test]
    fn any_gate_passes_on_first_passing_rule() {
        let (container, store) = container_with_level(10.0);
        let group = ApplicationCondition::new("either")
            .with_gate(ConditionGate::AnyMustBeTrue)
            .with_condition(ModifierCondition::new(LEVEL, ConditionOperator::Less, 5.0))
            .with_condition(ModifierCondition::new(
                ELEMENT,
                ConditionOperator::ContainsFlag,
                0b100 as f64,
            ));
        assert!(group.can_apply(&container, &store));
    }

    #[test]
    fn missing_attribute_fails_the_rule() {
        let (container, store) = container_with_level(10.0);
        let group = ApplicationCondition::new("ghost").with_condition(ModifierCondition::new(
            DefinitionId(99),
            ConditionOperator::NotEquals,
            0.0,
        ));
        assert!(!group.can_apply(&container, &store));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn log_of_missing_rule(warn_on_missing: bool) -> String {
        let (container, store) = container_with_level(10.0);
        let container = container.with_missing_attribute_warnings(warn_on_missing);
        let rule = ModifierCondition::new(DefinitionId(99), ConditionOperator::Equals, 0.0);
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();

        let passed = tracing::subscriber::with_default(subscriber, || rule.evaluate(&container, &store));
        assert!(!passed);

        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn missing_rule_attributes_follow_the_warning_setting() {
        let loud = log_of_missing_rule(true);
        assert!(loud.contains("WARN"));
        assert!(loud.contains("attribute not found"));

        let quiet = log_of_missing_rule(false);
        assert!(!quiet.contains("WARN"));
        assert!(quiet.contains("DEBUG"));
        assert!(quiet.contains("attribute not found"));
    }

    #[test]
    fn targeted_groups_only_gate_their_definition() {
        let (container, store) = container_with_level(1.0);
        let strict = ApplicationCondition::new("strict")
            .targeting(ELEMENT)
            .with_condition(ModifierCondition::new(LEVEL, ConditionOperator::Greater, 50.0));

        let groups = [strict];
        assert!(all_can_apply(&groups, Some(LEVEL), &container, &store));
        assert!(!all_can_apply(&groups, Some(ELEMENT), &container, &store));
    }

    #[test]
    fn cloned_groups_are_independent() {
        let original = ApplicationCondition::new("gate").with_condition(ModifierCondition::new(
            LEVEL,
            ConditionOperator::Equals,
            10.0,
        ));
        let mut copy = original.clone();
        copy.conditions[0].threshold = 20.0;

        assert_eq!(original.conditions.len(), copy.conditions.len());
        assert_eq!(original.conditions[0].threshold, 10.0);
    }
}
