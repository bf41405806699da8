//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::ServerBlueprint;
use sensors::{resolve_backend, PlatformReport};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::commands::load_blueprint;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    server: ServerInfo,
    platform: PlatformInfo,
    pins: Vec<PinInfo>,
    route: RouteInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct ServerInfo {
    listen: String,
    path: String,
    broadcast_interval_ms: u64,
    send_timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics_port: Option<u16>,
}

#[derive(Serialize)]
struct PlatformInfo {
    arch: String,
    gpio_device: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    board_model: Option<String>,
    driver_compiled: bool,
    hardware_mode: String,
    /// Backend `run` would pick, or why it cannot start
    backend: String,
}

#[derive(Serialize)]
struct PinInfo {
    role: String,
    bcm: u8,
}

#[derive(Serialize)]
struct RouteInfo {
    waypoints: usize,
    steps_per_waypoint: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = ?args.config, "Loading configuration info");

    let blueprint = load_blueprint(args.config.as_deref())?;
    let report = PlatformReport::detect();
    let info = build_config_info(&blueprint, &report);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &ServerBlueprint, report: &PlatformReport) -> ConfigInfo {
    let backend = match resolve_backend(blueprint.hardware.mode, report) {
        Ok(backend) => backend.to_string(),
        Err(e) => format!("unavailable ({e})"),
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        server: ServerInfo {
            listen: blueprint.server.bind_addr(),
            path: blueprint.server.path.clone(),
            broadcast_interval_ms: blueprint.server.broadcast_interval_ms,
            send_timeout_ms: blueprint.server.send_timeout_ms,
            metrics_port: blueprint.server.metrics_port,
        },
        platform: PlatformInfo {
            arch: report.arch.to_string(),
            gpio_device: report.gpio_device,
            board_model: report.board_model.clone(),
            driver_compiled: report.driver_compiled,
            hardware_mode: format!("{:?}", blueprint.hardware.mode),
            backend,
        },
        pins: blueprint
            .hardware
            .pin_roles()
            .into_iter()
            .map(|(role, bcm)| PinInfo {
                role: role.to_string(),
                bcm,
            })
            .collect(),
        route: RouteInfo {
            waypoints: blueprint.position.route.len(),
            steps_per_waypoint: blueprint.position.steps_per_waypoint,
            seed: blueprint.simulation.seed,
        },
        sinks: blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
            })
            .collect(),
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               EV Telemetry Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🌐 Server");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Listen: {}{}", info.server.listen, info.server.path);
    println!("   ├─ Broadcast interval: {} ms", info.server.broadcast_interval_ms);
    println!("   ├─ Send timeout: {} ms", info.server.send_timeout_ms);
    match info.server.metrics_port {
        Some(port) => println!("   └─ Metrics: :{}", port),
        None => println!("   └─ Metrics: disabled"),
    }

    println!("\n🔌 Platform");
    println!("   ├─ Arch: {}", info.platform.arch);
    println!("   ├─ GPIO device: {}", info.platform.gpio_device);
    println!(
        "   ├─ Board: {}",
        info.platform.board_model.as_deref().unwrap_or("unknown")
    );
    println!("   ├─ Hardware drivers compiled: {}", info.platform.driver_compiled);
    println!("   ├─ Mode: {}", info.platform.hardware_mode);
    println!("   └─ Backend: {}", info.platform.backend);

    println!("\n📌 Pins (BCM)");
    for (i, pin) in info.pins.iter().enumerate() {
        let prefix = if i == info.pins.len() - 1 { "└─" } else { "├─" };
        println!("   {} {}: {}", prefix, pin.role, pin.bcm);
    }

    println!("\n🗺  Route");
    println!("   ├─ Waypoints: {}", info.route.waypoints);
    println!("   ├─ Steps per waypoint: {}", info.route.steps_per_waypoint);
    match info.route.seed {
        Some(seed) => println!("   └─ Seed: {}", seed),
        None => println!("   └─ Seed: random"),
    }

    if !info.sinks.is_empty() {
        println!("\n📤 Sinks ({})", info.sinks.len());
        for (i, sink) in info.sinks.iter().enumerate() {
            let prefix = if i == info.sinks.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {} {} ({}, queue {})",
                prefix, sink.name, sink.sink_type, sink.queue_capacity
            );
        }
    }

    println!();
}
