//! CLI commands for semantic-protocol

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::classifier::Classifier;
use crate::config::Config;
use crate::engine::Engine;
use crate::models::{FieldDefinition, FieldType, Manifest, RenderContext};
use crate::validation::{lint_manifest, validate_document};

#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Summary,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Summary
        }
    }
}

/// Read a manifests file: either a JSON array or `{"manifests": [...]}`
pub fn read_manifests(path: &Path) -> Result<Vec<Value>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let document: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    match document {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("manifests") {
            Some(Value::Array(items)) => Ok(items),
            _ => bail!(
                "{} must contain a JSON array or an object with a \"manifests\" array",
                path.display()
            ),
        },
        _ => bail!("{} must contain a JSON array of manifests", path.display()),
    }
}

/// Build an engine and register every manifest in `path`, skipping rejects
pub fn load_engine(path: &Path, config: &Config) -> Result<Engine> {
    let engine = Engine::from_config(config)?;
    for document in read_manifests(path)? {
        let outcome = engine.register_value(document)?;
        if let Some(error) = outcome.error() {
            warn!(id = %outcome.id, %error, "skipping invalid manifest");
        }
    }
    Ok(engine)
}

/// Classify a single field
pub fn analyze(
    config: &Config,
    name: &str,
    field_type: &str,
    value: Option<&str>,
    context: &str,
    threshold: Option<u8>,
    format: OutputFormat,
) -> Result<()> {
    let field_type: FieldType = field_type.parse().map_err(anyhow::Error::msg)?;
    let context: RenderContext = context.parse().map_err(anyhow::Error::msg)?;

    let mut field = FieldDefinition::new(name, field_type);
    if let Some(raw) = value {
        // bare words are strings, anything else is read as JSON
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        field = field.with_value(value);
    }

    let classifier = Classifier::from_config(&config.classifier)?;
    let threshold = threshold.unwrap_or(classifier.threshold());
    if threshold > 100 {
        bail!("threshold must be between 0 and 100, got {}", threshold);
    }
    let result = classifier.analyze_with_threshold(&field, context, threshold);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Summary => {
            println!("Field: {} ({})", result.field, result.data_type);
            println!("{}", "=".repeat(50));
            println!("Semantic:   {}", result.semantic().unwrap_or("none"));
            println!("Confidence: {}", result.metadata.confidence);
            println!("Context:    {}", result.context);
            let render = &result.render_instruction;
            match &render.variant {
                Some(variant) => println!("Render:     {}/{}", render.component, variant),
                None => println!("Render:     {}", render.component),
            }
            if !result.metadata.all_matches.is_empty() {
                println!();
                println!("Matches:");
                for m in &result.metadata.all_matches {
                    println!("  {:<14} {:>3}  {}", m.semantic, m.confidence, m.reason);
                }
            }
        }
    }

    Ok(())
}

/// Run a discovery query over a manifests file
pub fn find(config: &Config, manifests: &Path, query: &str, format: OutputFormat) -> Result<()> {
    let query: Value = serde_json::from_str(query).context("Query must be valid JSON")?;
    let engine = load_engine(manifests, config)?;
    let results = engine.find(&query);

    match format {
        OutputFormat::Json => {
            let docs: Vec<&Manifest> = results.iter().map(|m| m.as_ref()).collect();
            println!("{}", serde_json::to_string_pretty(&docs)?);
        }
        OutputFormat::Summary => {
            if results.is_empty() {
                println!("No manifests matched.");
                return Ok(());
            }
            println!("{:<30} {:<12} {:<30}", "ID", "TYPE", "INTENT");
            println!("{}", "-".repeat(72));
            for manifest in &results {
                println!(
                    "{:<30} {:<12} {:<30}",
                    truncate(&manifest.id, 28),
                    truncate(&manifest.element.kind, 10),
                    truncate(manifest.element.intent.as_deref().unwrap_or("-"), 28)
                );
            }
            println!();
            println!("{} of {} manifest(s) matched", results.len(), engine.len());
        }
    }

    Ok(())
}

/// Print the relationship graph
pub fn graph(
    config: &Config,
    manifests: &Path,
    keys: Option<&[String]>,
    format: OutputFormat,
) -> Result<()> {
    let engine = load_engine(manifests, config)?;
    let graph = match keys {
        Some(keys) => engine.relationship_graph_for(keys),
        None => engine.relationship_graph(),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&graph)?),
        OutputFormat::Summary => {
            println!(
                "Graph: {} node(s), {} edge(s)",
                graph.node_count(),
                graph.edge_count()
            );
            println!("{}", "=".repeat(50));
            for node in graph.nodes() {
                let edges: Vec<_> = graph.outgoing(node).collect();
                if edges.is_empty() {
                    continue;
                }
                println!("{}", node);
                for edge in edges {
                    let marker = if graph.contains_node(&edge.to) { "" } else { " (missing)" };
                    println!("  --{}--> {}{}", edge.relation, edge.to, marker);
                }
            }
        }
    }

    Ok(())
}

/// Validate every manifest in a file, then the relationships between them
pub fn validate(config: &Config, manifests: &Path, strict: bool) -> Result<()> {
    let documents = read_manifests(manifests)?;
    let engine = Engine::from_config(config)?;

    println!("Validating {} manifest(s) from {}", documents.len(), manifests.display());
    println!();

    let mut failures = 0;
    let mut warnings = Vec::new();

    for (i, document) in documents.into_iter().enumerate() {
        let label = document
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", i));

        let schema = validate_document(&document);
        if !schema.valid {
            failures += 1;
            println!("✗ {}", label);
            for issue in &schema.errors {
                println!("    {}", issue);
            }
            continue;
        }

        let outcome = engine
            .register_value(document)
            .with_context(|| format!("Failed to register {}", label))?;
        if !outcome.success {
            failures += 1;
            println!("✗ {}", label);
            for issue in &outcome.errors {
                println!("    {}", issue);
            }
            continue;
        }

        println!("✓ {}", label);
        if let Some(manifest) = engine.get(&outcome.id) {
            warnings.extend(lint_manifest(&manifest));
        }
    }

    let issues = engine.validate_relationships();

    println!();
    if warnings.is_empty() && issues.is_empty() {
        println!("✓ no warnings");
    } else {
        println!("⚠ {} warning(s)", warnings.len() + issues.len());
        for warning in &warnings {
            println!("  ⚠ {}", warning);
        }
        for issue in &issues {
            println!("  ⚠ [{}] {}", issue.kind(), issue);
        }
    }

    if failures > 0 {
        bail!("{} manifest(s) failed validation", failures);
    }
    if strict && !(warnings.is_empty() && issues.is_empty()) {
        bail!("Validation failed in strict mode due to warnings");
    }

    println!();
    println!("Validation complete!");
    Ok(())
}

/// Look for a cycle starting at `id` along `key`
pub fn cycles(config: &Config, manifests: &Path, id: &str, key: Option<&str>) -> Result<()> {
    let engine = load_engine(manifests, config)?;
    if !engine.has(id) {
        bail!("Manifest not found: {}", id);
    }

    let key = key.unwrap_or(config.relationships.cycle_key.as_str());
    match engine.detect_circular_relationships(id, key) {
        Some(cycle) => {
            println!("Cycle along '{}': {}", key, cycle.join(" -> "));
            bail!("circular relationship detected");
        }
        None => println!("✓ no cycle reachable from {} along '{}'", id, key),
    }
    Ok(())
}

/// List the semantics and render contexts the configured classifier knows
pub fn semantics(config: &Config, format: OutputFormat) -> Result<()> {
    let classifier = Classifier::from_config(&config.classifier)?;
    let semantics = classifier.supported_semantics();
    let contexts = classifier.supported_contexts();

    match format {
        OutputFormat::Json => {
            let payload = serde_json::json!({
                "threshold": classifier.threshold(),
                "semantics": semantics,
                "contexts": contexts,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        OutputFormat::Summary => {
            println!("Threshold: {}", classifier.threshold());
            println!();
            println!("Semantics ({}):", semantics.len());
            for semantic in &semantics {
                println!("  {}", semantic);
            }
            println!();
            let names: Vec<_> = contexts.iter().map(|c| c.as_str()).collect();
            println!("Contexts: {}", names.join(", "));
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
