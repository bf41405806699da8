//! Driver traits - sensors crate implements, aggregator consumes.
//!
//! Every driver is constructed once at startup and shared between the
//! broadcast loop and the command handler, so all methods take `&self` and
//! implementations carry their own interior locking.
//!
//! Reads are synchronous; the aggregator runs them on a blocking thread.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{CabinEnvironment, ContractError, PositionFix, PositionUpdate, ProximityChannel, VehicleDynamics};

/// Time-of-flight distance measurement
pub trait ProximitySensor: Send + Sync {
    /// Distance in cm, or `None` on any fault or implausible echo.
    fn measure(&self, channel: ProximityChannel) -> Option<f64>;

    /// Pause required between sequential channel reads in one cycle
    fn settle_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Return held hardware to a safe state. Idempotent.
    fn release(&self) {}
}

/// How an environmental reading was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStatus {
    /// New sample taken this call
    Fresh,
    /// Inside the validity window, hardware untouched
    Cached,
    /// Retries exhausted, last known-good values returned
    Degraded,
}

/// Result of one environmental read
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentReading {
    pub environment: CabinEnvironment,
    pub status: ReadStatus,
}

/// Slow temperature/humidity sensor with cache and retry
pub trait EnvironmentalSensor: Send + Sync {
    fn read(&self) -> EnvironmentReading;

    fn release(&self) {}
}

/// Boolean input lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigitalLine {
    ReverseGear,
    RearMotion,
}

impl DigitalLine {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReverseGear => "reverse_gear",
            Self::RearMotion => "rear_motion",
        }
    }
}

/// Reverse-gear and motion-detect lines
pub trait DigitalInputs: Send + Sync {
    /// Never fails; a hardware fault reads as `false`.
    fn read_line(&self, line: DigitalLine) -> bool;

    fn release(&self) {}
}

/// Powertrain data source (bus decoder or simulator)
pub trait VehicleBus: Send + Sync {
    fn read(&self) -> Result<VehicleDynamics, ContractError>;

    /// Whether a physical bus is attached
    fn is_connected(&self) -> bool;
}

/// Position feed with one-way client hand-off
pub trait PositionSource: Send + Sync {
    /// Current fix, advancing internal state
    fn read(&self) -> Result<PositionFix, ContractError>;

    /// Adopt a client-reported fix as the new baseline
    fn hand_off(&self, update: PositionUpdate);

    fn is_handed_off(&self) -> bool;
}

/// Short-range wireless pairing
pub trait ShortRangeLink: Send + Sync {
    /// Connect to a device; returns its display name.
    fn connect(&self, device_address: &str) -> Result<String, ContractError>;
}

/// Network interface state
pub trait LinkMonitor: Send + Sync {
    fn is_up(&self) -> bool;
}
