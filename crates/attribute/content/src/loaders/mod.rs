//! Content loaders for reading attribute data from files.

pub mod config;
pub mod definitions;
pub mod factory;
pub mod templates;

pub use config::ConfigLoader;
pub use definitions::DefinitionLoader;
pub use factory::ContentFactory;
pub use templates::{AttributeSpec, ConditionSpec, EntityTemplateSpec, RuleSpec, TemplateLoader};

use std::path::Path;

/// Common result type for loaders.
pub type LoadResult<T> = anyhow::Result<T>;

/// Helper function to read file contents.
pub(crate) fn read_file(path: &Path) -> LoadResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read file {}: {}", path.display(), e))
}
