//! Attribute definition loader.

use std::path::Path;

use attribute_core::{AttributeDefinition, DefinitionCatalog};
use serde::{Deserialize, Serialize};

use crate::loaders::{LoadResult, read_file};

/// Definition file structure for RON files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionFile {
    pub definitions: Vec<AttributeDefinition>,
}

/// Loader for attribute definitions from RON files.
pub struct DefinitionLoader;

impl DefinitionLoader {
    /// Load a definition catalog from a RON file.
    ///
    /// # Errors
    ///
    /// Fails on unreadable files, malformed RON, duplicate ids or duplicate names.
    pub fn load(path: &Path) -> LoadResult<DefinitionCatalog> {
        let content = read_file(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> LoadResult<DefinitionCatalog> {
        let file: DefinitionFile = ron::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse definition RON: {}", e))?;

        let mut catalog = DefinitionCatalog::new();
        for definition in file.definitions {
            if definition.options_are_flags && definition.options.is_empty() {
                tracing::warn!(
                    definition = %definition.id,
                    name = %definition.name,
                    "options_are_flags set without options; treated as numeric"
                );
            }
            if catalog.by_name(&definition.name).is_some() {
                anyhow::bail!("Duplicate definition name '{}'", definition.name);
            }
            let id = definition.id;
            if catalog.insert(definition).is_none() {
                anyhow::bail!("Duplicate definition id {}", id);
            }
        }

        tracing::debug!(count = catalog.len(), "loaded attribute definitions");
        Ok(catalog)
    }
}
