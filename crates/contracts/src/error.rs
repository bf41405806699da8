//! Layered error definitions
//!
//! Categorized by source: config / sensor / serialization / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Sensor Errors =====
    /// A single driver read failed
    #[error("sensor '{source_name}' fault: {message}")]
    SensorFault {
        source_name: String,
        message: String,
    },

    /// The hardware backend could not be opened
    #[error("hardware unavailable: {message}")]
    HardwareUnavailable { message: String },

    // ===== Wire Errors =====
    /// Message serialization error
    #[error("serialization error: {message}")]
    Serialization { message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create sensor fault error
    pub fn sensor_fault(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SensorFault {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create hardware unavailable error
    pub fn hardware_unavailable(message: impl Into<String>) -> Self {
        Self::HardwareUnavailable {
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ContractError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}
