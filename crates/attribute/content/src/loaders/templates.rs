//! Entity template loader.
//!
//! Templates name their definitions instead of using numeric ids, so data files
//! stay readable:
//!
//! ```ron
//! (
//!     templates: [
//!         (
//!             name: "squire",
//!             tags: ["soldier"],
//!             attributes: [
//!                 (definition: "armor", flat: 4.0),
//!                 (definition: "armor", kind: Modifier, flat: 2.0),
//!             ],
//!         ),
//!     ],
//! )
//! ```

use std::path::Path;
use std::sync::Arc;

use attribute_core::{
    ApplicationCondition, AttributeDefinition, AttributeInstance, AttributeKind, ConditionGate,
    ConditionOperator, DefinitionCatalog, DefinitionId, EntityTemplate, FlagOperator,
    ModifierCondition, Tag, TagFilterMatch,
};
use serde::{Deserialize, Serialize};

use crate::loaders::{LoadResult, read_file};

/// Template file structure for RON files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateFile {
    pub templates: Vec<EntityTemplateSpec>,
}

/// Authoring form of an [`EntityTemplate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityTemplateSpec {
    pub name: String,
    pub tags: Vec<Tag>,
    pub accept_filter: Vec<TagFilterMatch>,
    pub attributes: Vec<AttributeSpec>,
}

/// Authoring form of an [`AttributeInstance`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeSpec {
    /// Definition name.
    pub definition: String,
    pub kind: AttributeKind,
    pub flat: f64,
    pub factor: f64,
    pub flag_operator: FlagOperator,
    pub force_apply_if_missing: bool,
    pub conditions: Vec<ConditionSpec>,
}

/// Authoring form of an [`ApplicationCondition`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionSpec {
    pub name: String,
    /// Definition name this group is restricted to.
    pub target: Option<String>,
    pub gate: ConditionGate,
    pub rules: Vec<RuleSpec>,
}

/// Authoring form of a [`ModifierCondition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Definition name of the attribute read on the target entity.
    pub definition: String,
    pub operator: ConditionOperator,
    pub threshold: f64,
}

fn definition_named(catalog: &DefinitionCatalog, name: &str) -> LoadResult<Arc<AttributeDefinition>> {
    catalog
        .by_name(name)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Unknown attribute definition '{}'", name))
}

fn id_named(catalog: &DefinitionCatalog, name: &str) -> LoadResult<DefinitionId> {
    definition_named(catalog, name).map(|d| d.id)
}

impl RuleSpec {
    pub fn resolve(&self, catalog: &DefinitionCatalog) -> LoadResult<ModifierCondition> {
        Ok(ModifierCondition::new(
            id_named(catalog, &self.definition)?,
            self.operator,
            self.threshold,
        ))
    }
}

impl ConditionSpec {
    pub fn resolve(&self, catalog: &DefinitionCatalog) -> LoadResult<ApplicationCondition> {
        let mut condition = ApplicationCondition::new(self.name.clone()).with_gate(self.gate);
        if let Some(target) = &self.target {
            condition = condition.targeting(id_named(catalog, target)?);
        }
        for rule in &self.rules {
            condition = condition.with_condition(rule.resolve(catalog)?);
        }
        Ok(condition)
    }
}

impl AttributeSpec {
    pub fn resolve(&self, catalog: &DefinitionCatalog) -> LoadResult<AttributeInstance> {
        let definition = definition_named(catalog, &self.definition)?;
        let mut instance = match self.kind {
            AttributeKind::Base => AttributeInstance::new(definition),
            AttributeKind::Modifier => AttributeInstance::modifier(definition),
        }
        .with_flat(self.flat)
        .with_factor(self.factor)
        .with_flag_operator(self.flag_operator);

        if self.force_apply_if_missing {
            instance = instance.force_apply_if_missing();
        }
        for condition in &self.conditions {
            instance = instance.with_condition(condition.resolve(catalog)?);
        }
        Ok(instance)
    }
}

impl EntityTemplateSpec {
    pub fn resolve(&self, catalog: &DefinitionCatalog) -> LoadResult<EntityTemplate> {
        let attributes = self
            .attributes
            .iter()
            .map(|spec| spec.resolve(catalog))
            .collect::<LoadResult<Vec<_>>>()
            .map_err(|e| anyhow::anyhow!("Template '{}': {}", self.name, e))?;

        Ok(EntityTemplate {
            name: self.name.clone(),
            tags: self.tags.clone(),
            accept_filter: self.accept_filter.clone(),
            attributes,
        })
    }
}

/// Loader for entity templates from RON files.
pub struct TemplateLoader;

impl TemplateLoader {
    /// Load templates from a RON file, resolving names against `catalog`.
    pub fn load(path: &Path, catalog: &DefinitionCatalog) -> LoadResult<Vec<EntityTemplate>> {
        let content = read_file(path)?;
        Self::parse(&content, catalog)
    }

    pub fn parse(content: &str, catalog: &DefinitionCatalog) -> LoadResult<Vec<EntityTemplate>> {
        let file: TemplateFile = ron::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse template RON: {}", e))?;

        let templates = file
            .templates
            .iter()
            .map(|spec| spec.resolve(catalog))
            .collect::<LoadResult<Vec<_>>>()?;

        tracing::debug!(count = templates.len(), "loaded entity templates");
        Ok(templates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attribute_core::{AttributeDefinition, TagFilterRule, Taggable};
    use std::io::Write;

    fn catalog() -> DefinitionCatalog {
        let mut catalog = DefinitionCatalog::new();
        catalog.insert(AttributeDefinition::new(DefinitionId(1), "armor"));
        catalog.insert(AttributeDefinition::new(DefinitionId(2), "level"));
        catalog
    }

    const SAMPLE: &str = r#"(
        templates: [
            (
                name: "squire",
                tags: ["soldier"],
                accept_filter: [(tag: "page", rule: Include), (tag: "undead", rule: Exclude)],
                attributes: [
                    (definition: "armor", flat: 4.0),
                    (
                        definition: "armor",
                        kind: Modifier,
                        flat: 2.0,
                        force_apply_if_missing: true,
                        conditions: [
                            (
                                name: "seasoned",
                                target: Some("armor"),
                                gate: AnyMustBeTrue,
                                rules: [(definition: "level", operator: GreaterOrEquals, threshold: 3.0)],
                            ),
                        ],
                    ),
                ],
            ),
        ],
    )"#;

    #[test]
    fn resolves_names_into_core_types() {
        let templates = TemplateLoader::parse(SAMPLE, &catalog()).unwrap();

        assert_eq!(templates.len(), 1);
        let squire = &templates[0];
        assert!(squire.contains_tag("soldier"));
        assert_eq!(squire.accept_filter[1].rule, TagFilterRule::Exclude);
        assert_eq!(squire.attributes.len(), 2);

        let modifier = &squire.attributes[1];
        assert!(modifier.is_modifier());
        assert!(modifier.force_apply_if_missing);
        assert_eq!(modifier.definition_id(), Some(DefinitionId(1)));

        let condition = &modifier.conditions[0];
        assert_eq!(condition.target, Some(DefinitionId(1)));
        assert_eq!(condition.gate, ConditionGate::AnyMustBeTrue);
        assert_eq!(
            condition.conditions,
            vec![ModifierCondition::new(
                DefinitionId(2),
                ConditionOperator::GreaterOrEquals,
                3.0
            )]
        );
    }

    #[test]
    fn unknown_definition_names_fail_with_the_template_name() {
        let content = r#"(templates: [(name: "broken", attributes: [(definition: "mana")])])"#;
        let err = TemplateLoader::parse(content, &catalog()).unwrap_err();

        let message = err.to_string();
        assert!(message.contains("broken"));
        assert!(message.contains("mana"));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{SAMPLE}").unwrap();

        let templates = TemplateLoader::load(file.path(), &catalog()).unwrap();
        assert_eq!(templates[0].name, "squire");
    }
}
