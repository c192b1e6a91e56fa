//! Validate content files
//!
//! Parses definitions, templates and configuration and prints what was found.

use std::path::PathBuf;

use anyhow::{Context, Result};
use attribute_content::{ConfigLoader, DefinitionLoader, TemplateLoader};
use attribute_core::PropagationMode;
use clap::Parser;
use console::style;

/// Load content files and report problems without spawning anything
#[derive(Parser)]
pub struct Validate {
    /// Attribute definitions file
    #[arg(long, value_name = "RON")]
    definitions: PathBuf,

    /// Entity templates file
    #[arg(long, value_name = "RON")]
    templates: Option<PathBuf>,

    /// Engine configuration file
    #[arg(long, value_name = "TOML")]
    config: Option<PathBuf>,
}

impl Validate {
    pub fn execute(self) -> Result<()> {
        let catalog = DefinitionLoader::load(&self.definitions).with_context(|| {
            format!("Failed to load definitions: {}", self.definitions.display())
        })?;

        println!(
            "{} {} ({} definitions)",
            style("Definitions:").bold().cyan(),
            self.definitions.display(),
            catalog.len()
        );
        for definition in catalog.iter() {
            let shape = if definition.is_flags() {
                format!("flags[{}]", definition.options.len())
            } else if definition.has_options() {
                format!("options[{}]", definition.options.len())
            } else {
                "numeric".to_string()
            };
            let reach = match definition.propagation {
                PropagationMode::Parent => "parent",
                PropagationMode::Child => "descendants",
                PropagationMode::Both => "parent+descendants",
            };
            println!(
                "  {:<6} {:<16} {:<12} reaches {}",
                definition.id.to_string(),
                definition.name,
                shape,
                reach
            );
        }

        if let Some(path) = &self.templates {
            let templates = TemplateLoader::load(path, &catalog)
                .with_context(|| format!("Failed to load templates: {}", path.display()))?;
            println!(
                "{} {} ({} templates)",
                style("Templates:").bold().cyan(),
                path.display(),
                templates.len()
            );
            for template in &templates {
                let modifiers = template.attributes.iter().filter(|a| a.is_modifier()).count();
                println!(
                    "  {:<20} {} attributes, {} modifiers",
                    template.name,
                    template.attributes.len(),
                    modifiers
                );
            }
        }

        if let Some(path) = &self.config {
            let config = ConfigLoader::load(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?;
            println!(
                "{} {} (event_capacity = {})",
                style("Config:").bold().cyan(),
                path.display(),
                config.event_capacity
            );
        }

        println!("{}", style("OK").bold().green());
        Ok(())
    }
}
