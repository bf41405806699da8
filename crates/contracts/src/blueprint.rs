//! ServerBlueprint - Config Loader output
//!
//! Describes the complete server configuration: listener, hardware pin map,
//! driver tuning, simulated route, initial settings, static vehicle data and
//! cloud sink routing. Every section has defaults so an empty document is a
//! runnable configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

use crate::{BatteryCells, TirePressure, VehicleSettings};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete server blueprint
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ServerBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,

    #[serde(default)]
    #[validate(nested)]
    pub hardware: HardwareConfig,

    #[serde(default)]
    #[validate(nested)]
    pub environment: EnvironmentConfig,

    #[serde(default)]
    #[validate(nested)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    #[validate(nested)]
    pub position: PositionConfig,

    /// Initial shared settings
    #[serde(default)]
    #[validate(nested)]
    pub settings: VehicleSettings,

    #[serde(default)]
    pub vehicle: VehicleStaticConfig,

    /// Cloud sink routing
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

// ===== [server] =====

/// Listener and broadcast loop
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    #[validate(range(min = 1))]
    pub port: u16,

    /// WebSocket route
    #[validate(length(min = 1))]
    pub path: String,

    #[validate(range(min = 10))]
    pub broadcast_interval_ms: u64,

    /// Per-client send budget inside one broadcast tick
    #[validate(range(min = 1))]
    pub send_timeout_ms: u64,

    /// Outbound frames buffered per client
    #[validate(range(min = 1))]
    pub client_queue_capacity: usize,

    /// Prometheus exporter port, disabled when absent
    pub metrics_port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8765,
            path: "/ws".to_string(),
            broadcast_interval_ms: 1000,
            send_timeout_ms: 500,
            client_queue_capacity: 16,
            metrics_port: None,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

// ===== [hardware] =====

/// Driver backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareMode {
    /// Probe the platform once at startup
    #[default]
    Auto,
    /// Require GPIO; startup fails without it
    Hardware,
    /// Never touch GPIO
    Simulated,
}

/// Trigger/echo pin pair of one ultrasonic channel (BCM numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UltrasonicPins {
    pub trigger: u8,
    pub echo: u8,
}

/// GPIO pin map and pulse timing
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HardwareConfig {
    pub mode: HardwareMode,

    pub rear_left: UltrasonicPins,
    pub rear_right: UltrasonicPins,

    /// Reverse-gear input (pull-down, active high)
    pub reverse_pin: u8,

    /// PIR motion input
    pub motion_pin: u8,

    /// DHT11 data line
    pub dht_pin: u8,

    /// Wait for echo rising edge
    #[validate(range(min = 1))]
    pub echo_start_timeout_ms: u64,

    /// Wait for echo falling edge
    #[validate(range(min = 1))]
    pub echo_end_timeout_ms: u64,

    /// Pause between sequential channel reads
    pub channel_settle_ms: u64,

    /// Upper bound of a plausible distance
    #[validate(range(exclusive_min = 0.0))]
    pub max_distance_cm: f64,

    /// Interface polled for the wifi flag
    pub wifi_interface: String,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            mode: HardwareMode::Auto,
            rear_left: UltrasonicPins {
                trigger: 20,
                echo: 21,
            },
            rear_right: UltrasonicPins {
                trigger: 23,
                echo: 24,
            },
            reverse_pin: 22,
            motion_pin: 27,
            dht_pin: 17,
            echo_start_timeout_ms: 20,
            echo_end_timeout_ms: 40,
            channel_settle_ms: 60,
            max_distance_cm: 500.0,
            wifi_interface: "wlan0".to_string(),
        }
    }
}

impl HardwareConfig {
    /// Every configured pin with its role, in declaration order
    pub fn pin_roles(&self) -> Vec<(&'static str, u8)> {
        vec![
            ("rear_left.trigger", self.rear_left.trigger),
            ("rear_left.echo", self.rear_left.echo),
            ("rear_right.trigger", self.rear_right.trigger),
            ("rear_right.echo", self.rear_right.echo),
            ("reverse_pin", self.reverse_pin),
            ("motion_pin", self.motion_pin),
            ("dht_pin", self.dht_pin),
        ]
    }
}

// ===== [environment] =====

/// Slow environmental sensor cache and retry policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Minimum spacing between hardware reads
    pub min_interval_ms: u64,

    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,

    pub retry_backoff_ms: u64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 2500,
            max_attempts: 3,
            retry_backoff_ms: 400,
        }
    }
}

// ===== [simulation] =====

/// Simulated-driver tuning
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SimulationConfig {
    /// Length of one proximity phase
    #[validate(range(min = 1))]
    pub phase_interval_ms: u64,

    /// Added to rear-right distances so channels differ
    #[validate(range(min = 0.0))]
    pub right_channel_offset_cm: f64,

    /// Chance of motion per read while reversing
    #[validate(range(min = 0.0, max = 1.0))]
    pub motion_probability: f64,

    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            phase_interval_ms: 5000,
            right_channel_offset_cm: 5.0,
            motion_probability: 0.15,
            seed: None,
        }
    }
}

// ===== [position] =====

/// Route point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct Waypoint {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

impl Waypoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Simulated route
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PositionConfig {
    #[validate(length(min = 1), nested)]
    pub route: Vec<Waypoint>,

    /// Reads spent approaching one waypoint
    #[validate(range(min = 1))]
    pub steps_per_waypoint: u32,

    /// Fraction of remaining distance covered per read
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub smoothing: f64,

    /// Reported-coordinate jitter (degrees)
    #[validate(range(min = 0.0))]
    pub jitter_deg: f64,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            route: vec![
                Waypoint::new(28.4595, 77.0266),
                Waypoint::new(28.4605, 77.0276),
                Waypoint::new(28.4615, 77.0286),
                Waypoint::new(28.4625, 77.0296),
                Waypoint::new(28.4635, 77.0306),
                Waypoint::new(28.4645, 77.0316),
            ],
            steps_per_waypoint: 10,
            smoothing: 0.1,
            jitter_deg: 0.0001,
        }
    }
}

// ===== [vehicle] =====

/// Static vehicle data reported in every snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleStaticConfig {
    pub tire_pressure: TirePressure,
    pub battery_cells: BatteryCells,
}

impl Default for VehicleStaticConfig {
    fn default() -> Self {
        Self {
            tire_pressure: TirePressure {
                front_left: 35.2,
                front_right: 35.1,
                rear_left: 34.9,
                rear_right: 35.0,
            },
            battery_cells: BatteryCells {
                block_a: 28.5,
                block_b: 29.1,
                block_c: 29.0,
            },
        }
    }
}

// ===== [[sinks]] =====

/// Cloud sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// Network output (UDP)
    Network,
}
