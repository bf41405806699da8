//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::ServerBlueprint;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::commands::load_blueprint;
use crate::runtime::ServerRuntime;

/// Execute the `run` command
pub async fn run_server(args: &RunArgs) -> Result<()> {
    let mut blueprint = load_blueprint(args.config.as_deref())?;
    apply_overrides(&mut blueprint, args);
    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after CLI overrides")?;

    info!(
        addr = %blueprint.server.bind_addr(),
        path = %blueprint.server.path,
        mode = ?blueprint.hardware.mode,
        interval_ms = blueprint.server.broadcast_interval_ms,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    let stats = ServerRuntime::new(blueprint)
        .run(shutdown_signal())
        .await
        .context("Server failed")?;

    stats.print_summary();
    info!("EV telemetry server finished");
    Ok(())
}

fn apply_overrides(blueprint: &mut ServerBlueprint, args: &RunArgs) {
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding listen host from CLI");
        blueprint.server.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port, "Overriding listen port from CLI");
        blueprint.server.port = port;
    }
    if let Some(mode) = args.hardware_mode {
        info!(mode = ?mode, "Overriding hardware mode from CLI");
        blueprint.hardware.mode = mode.into();
    }
    match args.metrics_port {
        Some(0) => blueprint.server.metrics_port = None,
        Some(port) => blueprint.server.metrics_port = Some(port),
        None => {}
    }
    if let Some(seed) = args.seed {
        blueprint.simulation.seed = Some(seed);
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, stopping server...");
}
