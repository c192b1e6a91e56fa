//! Content factory for loading every data file from one directory.

use std::path::{Path, PathBuf};

use attribute_core::{AttributeWorld, DefinitionCatalog, EngineConfig, EntityTemplate};

use crate::loaders::{ConfigLoader, DefinitionLoader, LoadResult, TemplateLoader};

/// Content factory that loads attribute content from a data directory.
///
/// # Directory Structure
///
/// ```text
/// data_dir/
/// ├── engine.toml       (optional)
/// ├── definitions.ron
/// └── templates.ron
/// ```
pub struct ContentFactory {
    data_dir: PathBuf,
}

impl ContentFactory {
    pub const CONFIG_FILE: &'static str = "engine.toml";
    pub const DEFINITIONS_FILE: &'static str = "definitions.ron";
    pub const TEMPLATES_FILE: &'static str = "templates.ron";

    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load engine configuration from `engine.toml`, or the defaults if it is absent.
    pub fn load_config(&self) -> LoadResult<EngineConfig> {
        let path = self.data_dir.join(Self::CONFIG_FILE);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no engine config; using defaults");
            return Ok(EngineConfig::default());
        }
        ConfigLoader::load(&path)
    }

    /// Load the definition catalog from `definitions.ron`.
    pub fn load_definitions(&self) -> LoadResult<DefinitionCatalog> {
        DefinitionLoader::load(&self.data_dir.join(Self::DEFINITIONS_FILE))
    }

    /// Load entity templates from `templates.ron`.
    pub fn load_templates(&self, catalog: &DefinitionCatalog) -> LoadResult<Vec<EntityTemplate>> {
        TemplateLoader::load(&self.data_dir.join(Self::TEMPLATES_FILE), catalog)
    }

    /// Load everything and build an empty world configured from `engine.toml`.
    pub fn load_world(&self) -> LoadResult<(AttributeWorld, DefinitionCatalog, Vec<EntityTemplate>)> {
        let config = self.load_config()?;
        let catalog = self.load_definitions()?;
        let templates = self.load_templates(&catalog)?;
        Ok((AttributeWorld::with_config(config), catalog, templates))
    }
}
