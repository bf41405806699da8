//! TelemetrySnapshot - Aggregator output
//!
//! One immutable aggregate per broadcast cycle. Owns no sensor objects, only
//! copies of their output values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ParkingState, VehicleSettings};

/// Temperature / humidity pair
///
/// Either field is absent only when no valid sample has ever been obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CabinEnvironment {
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
}

impl CabinEnvironment {
    /// No sample yet
    pub const EMPTY: Self = Self {
        temperature_c: None,
        humidity_pct: None,
    };

    pub fn new(temperature_c: f64, humidity_pct: f64) -> Self {
        Self {
            temperature_c: Some(temperature_c),
            humidity_pct: Some(humidity_pct),
        }
    }

    /// Both values present
    pub fn is_complete(&self) -> bool {
        self.temperature_c.is_some() && self.humidity_pct.is_some()
    }
}

/// Traction battery
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryState {
    /// State of charge (%)
    pub soc_pct: f64,
    /// Pack voltage (V)
    pub voltage_v: f64,
    /// Pack current (A), negative while charging
    pub current_a: f64,
    /// State of health (%)
    pub health_pct: f64,
}

/// Traction motor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorState {
    pub rpm: f64,
    pub temperature_c: f64,
}

/// Powertrain telemetry
///
/// `Default` is the neutral all-zero reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleDynamics {
    pub speed_kmh: f64,
    pub battery: BatteryState,
    pub motor: MotorState,
    pub range_km: f64,
    pub power_kw: f64,
    pub efficiency_score: f64,
    pub wheel_speed: f64,
}

impl VehicleDynamics {
    /// All-zero reading used when the source faults
    pub fn neutral() -> Self {
        Self::default()
    }
}

/// GNSS fix
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Degrees, [0, 360)
    pub heading_deg: f64,
    pub altitude_m: f64,
    pub satellites: u8,
    pub ground_speed_kmh: f64,
}

/// Client-reported position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude_m: Option<f64>,
    #[serde(default)]
    pub heading_deg: Option<f64>,
}

/// Media player block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaStatus {
    pub connected: bool,
    pub device_name: String,
    pub track_title: String,
    pub track_artist: String,
    /// Seconds
    pub duration: u32,
    /// Seconds
    pub position: u32,
    pub is_playing: bool,
    /// 0.0 - 1.0
    pub volume: f64,
}

impl Default for MediaStatus {
    fn default() -> Self {
        Self {
            connected: false,
            device_name: "No Device".to_string(),
            track_title: "No Track Playing".to_string(),
            track_artist: "Unknown Artist".to_string(),
            duration: 180,
            position: 0,
            is_playing: false,
            volume: 0.5,
        }
    }
}

/// Link status block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityStatus {
    pub wifi: bool,
    pub bluetooth: bool,
    pub can_bus: bool,
    pub cloud: bool,
}

/// Tire pressure (psi)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TirePressure {
    pub front_left: f64,
    pub front_right: f64,
    pub rear_left: f64,
    pub rear_right: f64,
}

/// Battery block temperatures (°C)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryCells {
    pub block_a: f64,
    pub block_b: f64,
    pub block_c: f64,
}

/// Full telemetry aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Broadcast cycle number
    pub sequence: u64,

    pub timestamp: DateTime<Utc>,

    /// Set only on the terminal fallback snapshot
    #[serde(default)]
    pub degraded: bool,

    // Environmental (single source: the environmental driver)
    pub ambient_temp: Option<f64>,
    pub humidity: Option<f64>,
    pub cabin_temp: Option<f64>,

    pub dynamics: VehicleDynamics,

    pub gps: Option<PositionFix>,

    pub parking: ParkingState,

    pub tire_pressure: TirePressure,

    pub battery_cells: BatteryCells,

    pub connectivity: ConnectivityStatus,

    pub media: MediaStatus,

    pub settings: VehicleSettings,
}

/// Offset between ambient and reported cabin temperature (°C)
pub const CABIN_TEMP_OFFSET_C: f64 = 3.0;

impl TelemetrySnapshot {
    /// Fully-neutral snapshot with explicit null/zero fields.
    pub fn fallback(sequence: u64) -> Self {
        Self {
            sequence,
            timestamp: Utc::now(),
            degraded: true,
            ambient_temp: None,
            humidity: None,
            cabin_temp: None,
            dynamics: VehicleDynamics::neutral(),
            gps: None,
            parking: ParkingState::disengaged(),
            tire_pressure: TirePressure::default(),
            battery_cells: BatteryCells::default(),
            connectivity: ConnectivityStatus::default(),
            media: MediaStatus::default(),
            settings: VehicleSettings::default(),
        }
    }

    /// Derived cabin temperature for an ambient reading
    pub fn cabin_temp_for(ambient: Option<f64>) -> Option<f64> {
        ambient.map(|t| round1(t - CABIN_TEMP_OFFSET_C))
    }
}

/// Round to one decimal place
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
