//! # Integration Tests
//!
//! Cross-crate tests:
//! - config text -> blueprint -> running server
//! - WebSocket end-to-end scenarios over a real HTTP transport
//! - fault isolation across the full collect/broadcast path

use std::sync::Arc;
use std::time::Duration;

use aggregator::{Drivers, SharedState, TelemetryAggregator};
use contracts::ServerBlueprint;
use dispatcher::{ClientRegistry, Dispatcher, DispatcherConfig};
use gateway::{AppState, CommandHandler};
use sensors::DriverSet;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A fully wired server: drivers, state, broadcast loop and router.
pub struct Harness {
    pub router: axum::Router,
    pub state: Arc<SharedState>,
    pub registry: Arc<ClientRegistry>,
    /// Keeps the driver handles alive for the run
    pub drivers: DriverSet,
    shutdown: watch::Sender<bool>,
    loop_handle: JoinHandle<()>,
}

impl Harness {
    /// Simulated drivers from `blueprint`, optionally with some replaced
    pub fn start(blueprint: &ServerBlueprint, customize: impl FnOnce(&mut Drivers)) -> Self {
        let drivers = sensors::simulated_set(blueprint).expect("simulated drivers");
        let mut polled = Drivers::from(&drivers);
        customize(&mut polled);

        let state = Arc::new(SharedState::from_blueprint(blueprint));
        let aggregator = Arc::new(TelemetryAggregator::new(polled, Arc::clone(&state)));
        let registry = Arc::new(ClientRegistry::new());

        let dispatcher = Dispatcher::new(
            aggregator,
            Arc::clone(&registry),
            DispatcherConfig {
                interval: Duration::from_millis(blueprint.server.broadcast_interval_ms),
                send_timeout: blueprint.server.send_timeout(),
            },
        );
        let (shutdown, rx) = watch::channel(false);
        let loop_handle = dispatcher.spawn(rx);

        let commands = Arc::new(CommandHandler::new(
            Arc::clone(&state),
            Arc::clone(&drivers.position),
            Arc::clone(&drivers.link),
        ));
        let router = gateway::create_router(
            AppState::new(
                Arc::clone(&registry),
                commands,
                blueprint.server.client_queue_capacity,
            ),
            &blueprint.server.path,
        );

        Self {
            router,
            state,
            registry,
            drivers,
            shutdown,
            loop_handle,
        }
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.loop_handle.await;
        self.drivers.release();
    }
}

/// Defaults with a fast broadcast tick and a fixed seed
pub fn fast_blueprint() -> ServerBlueprint {
    let mut blueprint = ServerBlueprint::default();
    blueprint.server.broadcast_interval_ms = 50;
    blueprint.simulation.seed = Some(2024);
    blueprint
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_full_config_document() {
        let toml = r#"
[server]
port = 9100
broadcast_interval_ms = 500

[hardware]
mode = "simulated"

[simulation]
seed = 7

[settings]
drive_mode = "sport"
twin_mode = "2d"

[[sinks]]
name = "collector"
sink_type = "network"
params = { addr = "127.0.0.1:9999", format = "json" }
"#;
        let blueprint = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.server.port, 9100);
        assert_eq!(blueprint.simulation.seed, Some(7));
        assert_eq!(blueprint.sinks.len(), 1);

        let json = serde_json::to_value(blueprint.settings).unwrap();
        assert_eq!(json["drive_mode"], "sport");
        assert_eq!(json["twin_mode"], "2d");
    }

    #[test]
    fn test_duplicate_pins_rejected() {
        let toml = r#"
[hardware]
reverse_pin = 17
"#;
        assert!(ConfigLoader::load_from_str(toml, ConfigFormat::Toml).is_err());
    }
}

#[cfg(test)]
mod e2e_tests {
    use super::*;
    use axum_test::{TestServer, TestWebSocket};
    use contracts::{ContractError, VehicleBus, VehicleDynamics};
    use sensors::{PhaseClock, ProximityPhase, SimRng, SimulatedLines, SimulatedProximity};
    use serde_json::{json, Value};

    const WAIT: Duration = Duration::from_secs(3);

    fn server(harness: &Harness) -> TestServer {
        TestServer::builder()
            .http_transport()
            .build(harness.router.clone())
            .unwrap()
    }

    async fn connect(server: &TestServer) -> TestWebSocket {
        let mut ws = server.get_websocket("/ws").await.into_websocket().await;
        let ack: Value = ws.receive_json().await;
        assert_eq!(ack["type"], "connection");
        assert_eq!(ack["status"], "connected");
        ws
    }

    /// Next frame of the given `type`, skipping interleaved telemetry
    async fn next_of_type(ws: &mut TestWebSocket, kind: &str) -> Value {
        tokio::time::timeout(WAIT, async {
            loop {
                let frame: Value = ws.receive_json().await;
                if frame["type"] == kind {
                    return frame;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("no '{kind}' frame within {WAIT:?}"))
    }

    /// First telemetry frame satisfying `accept`. A cycle collected just
    /// before a command may still be in flight when the response lands.
    async fn telemetry_where(ws: &mut TestWebSocket, accept: impl Fn(&Value) -> bool) -> Value {
        tokio::time::timeout(WAIT, async {
            loop {
                let frame = next_of_type(ws, "telemetry").await;
                if accept(&frame) {
                    return frame;
                }
            }
        })
        .await
        .expect("matching telemetry frame")
    }

    #[tokio::test]
    async fn test_setting_change_reaches_next_snapshot() {
        let harness = Harness::start(&fast_blueprint(), |_| {});
        let server = server(&harness);
        let mut ws = connect(&server).await;

        ws.send_json(&json!({"action": "set_brightness", "value": 75}))
            .await;
        let response = next_of_type(&mut ws, "response").await;
        assert_eq!(
            response,
            json!({"type": "response", "action": "set_brightness", "status": "success", "value": 75})
        );

        let snapshot = telemetry_where(&mut ws, |s| s["settings"]["brightness"] == 75).await;
        assert_eq!(snapshot["settings"]["charge_limit"], 80);
        assert_eq!(harness.state.settings().brightness, 75);

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_rejected_commands_keep_connection_open() {
        let harness = Harness::start(&fast_blueprint(), |_| {});
        let server = server(&harness);
        let mut ws = connect(&server).await;
        let before = harness.state.settings();

        ws.send_json(&json!({"action": "drive_warp"})).await;
        let error = next_of_type(&mut ws, "error").await;
        assert_eq!(error, json!({"type": "error", "message": "Invalid action: drive_warp"}));

        ws.send_text("{not json").await;
        let error = next_of_type(&mut ws, "error").await;
        assert_eq!(error["message"], "Invalid JSON format");

        ws.send_json(&json!({"action": "set_charge_limit", "value": 30}))
            .await;
        let error = next_of_type(&mut ws, "error").await;
        assert!(error["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid value for set_charge_limit"));
        assert_eq!(harness.state.settings(), before);

        // still open and serving
        ws.send_json(&json!({"action": "play_music"})).await;
        let response = next_of_type(&mut ws, "response").await;
        assert_eq!(response["status"], "success");
        telemetry_where(&mut ws, |s| s["media"]["is_playing"] == true).await;

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_high_phase_reports_high_warning() {
        let blueprint = fast_blueprint();
        let harness = Harness::start(&blueprint, |drivers| {
            let rng = SimRng::new(Some(5));
            let clock = PhaseClock::fixed(ProximityPhase::High);
            drivers.proximity = Arc::new(SimulatedProximity::new(clock, rng.clone(), 5.0));
            drivers.lines = Arc::new(SimulatedLines::new(clock, rng, 0.0));
        });
        let server = server(&harness);
        let mut ws = connect(&server).await;

        let snapshot = next_of_type(&mut ws, "telemetry").await;
        let parking = &snapshot["parking"];
        assert_eq!(parking["reverse_engaged"], true);
        assert_eq!(parking["rear_left"]["warning_level"], "high");
        let left = parking["rear_left"]["distance_cm"].as_f64().unwrap();
        assert!((5.0..=9.0).contains(&left));
        let right = parking["rear_right"]["distance_cm"].as_f64().unwrap();
        assert!((10.0..=14.0).contains(&right));

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_reverse_off_reports_absent_proximity() {
        let harness = Harness::start(&fast_blueprint(), |drivers| {
            let rng = SimRng::new(Some(5));
            let clock = PhaseClock::fixed(ProximityPhase::Low);
            drivers.proximity = Arc::new(SimulatedProximity::new(clock, rng.clone(), 5.0));
            drivers.lines = Arc::new(SimulatedLines::new(clock, rng, 1.0));
        });
        let server = server(&harness);
        let mut ws = connect(&server).await;

        let snapshot = next_of_type(&mut ws, "telemetry").await;
        let parking = &snapshot["parking"];
        assert_eq!(parking["reverse_engaged"], false);
        assert!(parking["rear_left"]["distance_cm"].is_null());
        assert!(parking["rear_left"]["warning_level"].is_null());
        assert!(parking["rear_right"]["warning_level"].is_null());

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_update_gps_hands_off_position() {
        let harness = Harness::start(&fast_blueprint(), |_| {});
        let server = server(&harness);
        let mut ws = connect(&server).await;

        ws.send_json(&json!({
            "action": "update_gps",
            "latitude": 12.9716,
            "longitude": 77.5946,
            "altitude": 920.0
        }))
        .await;
        let response = next_of_type(&mut ws, "response").await;
        assert_eq!(response["value"], json!({"latitude": 12.9716, "longitude": 77.5946}));

        let snapshot = telemetry_where(&mut ws, |s| s["gps"]["altitude_m"] == 920.0).await;
        let gps = &snapshot["gps"];
        assert!((gps["latitude"].as_f64().unwrap() - 12.9716).abs() < 0.01);
        assert!((gps["longitude"].as_f64().unwrap() - 77.5946).abs() < 0.01);
        assert!(harness.drivers.position.is_handed_off());

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_bluetooth_connect_updates_media_block() {
        let harness = Harness::start(&fast_blueprint(), |_| {});
        let server = server(&harness);
        let mut ws = connect(&server).await;

        ws.send_json(&json!({"action": "connect_bluetooth", "device_address": "AA:BB:CC:DD:EE:FF"}))
            .await;
        let response = next_of_type(&mut ws, "response").await;
        assert_eq!(response["status"], "success");

        let snapshot =
            telemetry_where(&mut ws, |s| s["media"]["device_name"] == "Mock Phone").await;
        assert_eq!(snapshot["connectivity"]["bluetooth"], true);

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_clients_receive_identical_snapshots() {
        let harness = Harness::start(&fast_blueprint(), |_| {});
        let server = server(&harness);
        let mut a = connect(&server).await;
        let mut b = connect(&server).await;

        // align both clients on a sequence both have seen
        let first_a = next_of_type(&mut a, "telemetry").await;
        let target = first_a["sequence"].as_u64().unwrap() + 1;

        let mut from_a = next_of_type(&mut a, "telemetry").await;
        while from_a["sequence"].as_u64().unwrap() < target {
            from_a = next_of_type(&mut a, "telemetry").await;
        }
        let mut from_b = next_of_type(&mut b, "telemetry").await;
        while from_b["sequence"].as_u64().unwrap() < from_a["sequence"].as_u64().unwrap() {
            from_b = next_of_type(&mut b, "telemetry").await;
        }
        assert_eq!(from_a, from_b);

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_disconnect_leaves_other_clients_served() {
        let harness = Harness::start(&fast_blueprint(), |_| {});
        let server = server(&harness);
        let gone = connect(&server).await;
        let mut stays = connect(&server).await;
        assert_eq!(harness.registry.len(), 2);

        gone.close().await;

        tokio::time::timeout(WAIT, async {
            while harness.registry.len() != 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("client unregistered");

        let health: Value = server.get("/health").await.json();
        assert_eq!(health, json!({"status": "ok", "clients": 1}));

        let before = next_of_type(&mut stays, "telemetry").await["sequence"]
            .as_u64()
            .unwrap();
        let after = next_of_type(&mut stays, "telemetry").await["sequence"]
            .as_u64()
            .unwrap();
        assert!(after > before);

        harness.stop().await;
    }

    struct BrokenBus;

    impl VehicleBus for BrokenBus {
        fn read(&self) -> Result<VehicleDynamics, ContractError> {
            Err(ContractError::sensor_fault("can", "bus off"))
        }

        fn is_connected(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_failing_driver_yields_neutral_values_only() {
        let harness = Harness::start(&fast_blueprint(), |drivers| {
            drivers.vehicle = Arc::new(BrokenBus);
        });
        let server = server(&harness);
        let mut ws = connect(&server).await;

        let snapshot = next_of_type(&mut ws, "telemetry").await;
        assert_eq!(snapshot["degraded"], false);
        assert_eq!(
            snapshot["dynamics"],
            serde_json::to_value(VehicleDynamics::neutral()).unwrap()
        );
        assert!(snapshot["ambient_temp"].is_number());
        assert!(snapshot["gps"].is_object());
        assert_eq!(snapshot["connectivity"]["can_bus"], false);

        harness.stop().await;
    }
}
