//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{HardwareMode, ServerBlueprint, SinkType};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

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
    listen: String,
    path: String,
    hardware_mode: String,
    waypoint_count: usize,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
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

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: Vec::new(),
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&blueprint),
            summary: Some(ConfigSummary {
                version: format!("{:?}", blueprint.version),
                listen: blueprint.server.bind_addr(),
                path: blueprint.server.path.clone(),
                hardware_mode: format!("{:?}", blueprint.hardware.mode),
                waypoint_count: blueprint.position.route.len(),
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

/// Non-fatal configuration issues
fn collect_warnings(blueprint: &ServerBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No cloud sinks configured - snapshots go to WebSocket clients only".to_string());
    }
    if !blueprint.sinks.iter().any(|s| s.sink_type == SinkType::Network) && !blueprint.sinks.is_empty() {
        warnings.push("Only log sinks configured - cloud connectivity will always report true".to_string());
    }
    if blueprint.hardware.mode == HardwareMode::Hardware && !cfg!(feature = "hardware") {
        warnings.push(
            "hardware.mode = hardware but this binary was built without the `hardware` feature"
                .to_string(),
        );
    }
    if blueprint.server.send_timeout_ms >= blueprint.server.broadcast_interval_ms {
        warnings.push(format!(
            "server.send_timeout_ms ({}) >= broadcast_interval_ms ({}) - a stalled client can delay the next tick",
            blueprint.server.send_timeout_ms, blueprint.server.broadcast_interval_ms
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Listen: {}{}", summary.listen, summary.path);
            println!("  Hardware mode: {}", summary.hardware_mode);
            println!("  Route waypoints: {}", summary.waypoint_count);
            println!("  Sinks: {}", summary.sink_count);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
