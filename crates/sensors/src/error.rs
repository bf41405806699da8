//! Sensor driver error types
//!
//! None of these reach a client: drivers and the aggregator turn them into
//! absent, cached or neutral values.

use contracts::ContractError;
use thiserror::Error;

/// Sensor driver specific error
#[derive(Debug, Error)]
pub enum SensorError {
    /// GPIO access failed
    #[error("gpio pin {pin}: {message}")]
    Gpio { pin: u8, message: String },

    /// Expected edge never arrived
    #[error("timed out waiting for {edge} edge on pin {pin}")]
    EdgeTimeout { pin: u8, edge: &'static str },

    /// Echo decoded to a distance outside (0, max]
    #[error("implausible distance {distance_cm:.1} cm")]
    Implausible { distance_cm: f64 },

    /// DHT11 frame checksum mismatch
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    Checksum { expected: u8, actual: u8 },

    /// DHT11 frame decoded to values out of sensor range
    #[error("reading out of range: {message}")]
    OutOfRange { message: String },

    /// Requested backend not available on this platform/build
    #[error("hardware backend unavailable: {message}")]
    Unavailable { message: String },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl SensorError {
    /// Create GPIO error
    pub fn gpio(pin: u8, message: impl Into<String>) -> Self {
        Self::Gpio {
            pin,
            message: message.into(),
        }
    }

    /// Create backend unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create out-of-range error
    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::OutOfRange {
            message: message.into(),
        }
    }
}

impl From<SensorError> for ContractError {
    fn from(e: SensorError) -> Self {
        match e {
            SensorError::Contract(inner) => inner,
            SensorError::Unavailable { message } => ContractError::hardware_unavailable(message),
            other => ContractError::Other(other.to_string()),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, SensorError>;
