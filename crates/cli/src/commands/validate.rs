//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::DaqBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::load_blueprint;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    node_count: usize,
    trigger: String,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match load_blueprint(&args.config) {
        Ok(blueprint) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&blueprint),
            summary: Some(ConfigSummary {
                version: format!("{:?}", blueprint.version),
                node_count: blueprint.nodes.len(),
                trigger: blueprint
                    .trigger_node()
                    .map(|n| n.name.clone())
                    .unwrap_or_default(),
                sink_count: blueprint.sinks.len(),
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &DaqBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - committed events will only be counted".to_string());
    }

    if blueprint.nodes.len() == 1 {
        warnings.push("Only the trigger node is configured - nothing to correlate".to_string());
    }

    let source = &blueprint.source;
    for node in blueprint.nodes.iter().filter(|n| !n.trigger) {
        if source.jitter_ticks >= node.window_width {
            warnings.push(format!(
                "Node '{}' window ±{} does not cover source jitter ±{}",
                node.name, node.window_width, source.jitter_ticks
            ));
        }
    }

    if !blueprint.output.accepted_types.is_empty()
        && !blueprint.output.accepted_types.contains(&contracts::TYPE_PHYSICS)
    {
        warnings.push("output.accepted_types excludes physics events".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Nodes: {}", summary.node_count);
            println!("  Trigger: {}", summary.trigger);
            println!("  Sinks: {}", summary.sink_count);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {warning}");
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
    }
}
