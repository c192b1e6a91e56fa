//! Spawn content templates and print resolved attribute values
//!
//! Loads definitions and templates from RON, optionally connects spawned entities,
//! and prints every attribute with its resolved value.

use std::path::PathBuf;

use anyhow::{Context, Result};
use attribute_content::{ConfigLoader, DefinitionLoader, TemplateLoader};
use attribute_core::{
    AttributeInstance, AttributeSystemError, AttributeWorld, EngineConfig, Entity, EntityId, InstanceId,
};
use clap::Parser;
use console::style;

/// Spawn every template and print resolved attribute values
#[derive(Parser)]
pub struct Inspect {
    /// Attribute definitions file
    #[arg(long, value_name = "RON")]
    definitions: PathBuf,

    /// Entity templates file
    #[arg(long, value_name = "RON")]
    templates: PathBuf,

    /// Engine configuration file (defaults apply when omitted)
    #[arg(long, value_name = "TOML")]
    config: Option<PathBuf>,

    /// Connect two spawned templates before printing, by template name (repeatable)
    #[arg(long = "connect", value_name = "CHILD:PARENT", value_parser = parse_edge)]
    connect: Vec<(String, String)>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "summary")]
    format: OutputFormat,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    /// Human-readable listing
    Summary,
    /// Full JSON output
    Json,
}

fn parse_edge(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once(':') {
        Some((child, parent)) if !child.is_empty() && !parent.is_empty() => {
            Ok((child.to_string(), parent.to_string()))
        }
        _ => Err(format!("expected CHILD:PARENT, got '{raw}'")),
    }
}

impl Inspect {
    pub fn execute(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => ConfigLoader::load(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => EngineConfig::default(),
        };
        let catalog = DefinitionLoader::load(&self.definitions).with_context(|| {
            format!("Failed to load definitions: {}", self.definitions.display())
        })?;
        let templates = TemplateLoader::load(&self.templates, &catalog)
            .with_context(|| format!("Failed to load templates: {}", self.templates.display()))?;

        let mut world = AttributeWorld::with_config(config);
        let mut spawned = Vec::with_capacity(templates.len());
        for template in &templates {
            let id = world
                .spawn(template)
                .with_context(|| format!("Failed to spawn template '{}'", template.name))?;
            spawned.push((template.name.as_str(), id));
        }

        let find = |name: &str| {
            spawned
                .iter()
                .find(|(template, _)| *template == name)
                .map(|&(_, id)| id)
                .with_context(|| format!("No template named '{name}'"))
        };
        let mut connections = Vec::new();
        for (child, parent) in &self.connect {
            let (child_id, parent_id) = (find(child.as_str())?, find(parent.as_str())?);
            match world.try_apply_to(child_id, parent_id) {
                Ok(report) => connections.push(format!(
                    "{child} -> {parent}: {} attached, {} skipped",
                    report.changed, report.skipped
                )),
                Err(err) => {
                    tracing::warn!(%child, %parent, error = %err, "connection refused");
                    connections.push(format!(
                        "{child} -> {parent}: {err} ({})",
                        err.severity().as_str()
                    ));
                }
            }
        }

        match self.format {
            OutputFormat::Summary => print_summary(&world, &connections),
            OutputFormat::Json => print_json(&world)?,
        }
        Ok(())
    }
}

fn print_summary(world: &AttributeWorld, connections: &[String]) {
    println!("{}", style("=== Attribute Inspection ===").bold().green());
    println!();

    if !connections.is_empty() {
        println!("{}", style("Connections:").bold().yellow());
        for line in connections {
            println!("  {line}");
        }
        println!();
    }

    for entity in world.entities() {
        print_entity(world, entity);
    }
}

fn print_entity(world: &AttributeWorld, entity: &Entity) {
    let tags: Vec<&str> = entity.tags.iter().map(|t| t.as_str()).collect();
    println!(
        "{} {} {}",
        style(format!("{}", entity.id())).bold().cyan(),
        style(&entity.name).bold(),
        style(format!("[{}]", tags.join(", "))).dim()
    );
    let parents = parent_names(world, entity.id());
    if !parents.is_empty() {
        println!("  parents: {}", parents.join(", "));
    }

    for (id, instance) in entity.container.iter(world.store()) {
        println!(
            "  {:<16} {:<8} {:>10} {}",
            definition_name(instance),
            instance.kind.as_ref(),
            format!("{:.2}", world.value(id)),
            describe(world, id, instance)
        );
    }
    println!();
}

fn parent_names(world: &AttributeWorld, id: EntityId) -> Vec<String> {
    use attribute_core::TreeConnectivity;

    world
        .tree()
        .parents(id)
        .into_iter()
        .filter_map(|parent| world.entity(parent))
        .map(|parent| format!("{} ({})", parent.name, parent.id()))
        .collect()
}

fn definition_name(instance: &AttributeInstance) -> &str {
    instance
        .definition()
        .map(|d| d.name.as_str())
        .unwrap_or("<unbound>")
}

fn describe(world: &AttributeWorld, id: InstanceId, instance: &AttributeInstance) -> String {
    let store = world.store();
    let mut notes = Vec::new();
    if instance.is_flags() {
        notes.push(format!("flags={:?}", store.value_as_flags(id)));
    } else if instance.has_options() {
        notes.push(format!("option={:?}", store.value_as_option(id)));
    }
    if instance.can_use_capacity() {
        notes.push(format!("used={:.2}", instance.capacity_used()));
    }
    if !instance.modifiers().is_empty() {
        notes.push(format!("modifiers={}", instance.modifiers().len()));
    }
    notes.join(" ")
}

fn print_json(world: &AttributeWorld) -> Result<()> {
    let entities: Vec<serde_json::Value> = world
        .entities()
        .map(|entity| {
            let attributes: Vec<serde_json::Value> = entity
                .container
                .iter(world.store())
                .map(|(id, instance)| {
                    serde_json::json!({
                        "instance": id.0,
                        "definition": definition_name(instance),
                        "kind": instance.kind.as_ref(),
                        "value": world.value(id),
                        "modifiers": instance.modifiers().iter().map(|m| m.0).collect::<Vec<_>>(),
                    })
                })
                .collect();
            serde_json::json!({
                "id": entity.id().0,
                "name": entity.name,
                "tags": entity.tags.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
                "attributes": attributes,
            })
        })
        .collect();

    let json = serde_json::to_string_pretty(&serde_json::json!({ "entities": entities }))
        .context("Failed to serialize inspection to JSON")?;
    println!("{}", json);
    Ok(())
}
