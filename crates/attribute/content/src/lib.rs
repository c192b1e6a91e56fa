//! Data-driven attribute content and loaders.
//!
//! This crate turns RON/TOML data files into `attribute-core` values:
//! - Attribute definitions (data-driven via RON)
//! - Entity templates with attributes, tags and accept-filters (data-driven via RON)
//! - Engine configuration (data-driven via TOML)
//!
//! Templates reference definitions and condition targets by name; names are resolved
//! against the loaded [`DefinitionCatalog`](attribute_core::DefinitionCatalog).

#[cfg(feature = "loaders")]
pub mod loaders;

#[cfg(feature = "loaders")]
pub use loaders::{
    AttributeSpec, ConditionSpec, ConfigLoader, ContentFactory, DefinitionLoader,
    EntityTemplateSpec, RuleSpec, TemplateLoader,
};
