//! Server -> client wire messages.
//!
//! Every outbound frame is a JSON object tagged by `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CommandRejection, ContractError, TelemetrySnapshot};

/// Outcome of an accepted command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Success,
    Failed,
}

impl CommandStatus {
    pub fn from_success(ok: bool) -> Self {
        if ok {
            Self::Success
        } else {
            Self::Failed
        }
    }
}

/// Outbound message kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// One-shot acknowledgement after the connection opens
    Connection { status: String, message: String },

    /// Periodic snapshot
    Telemetry(TelemetrySnapshot),

    /// One per accepted command
    Response {
        action: String,
        status: CommandStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },

    /// One per rejected or malformed command
    Error { message: String },
}

impl ServerMessage {
    pub fn connected() -> Self {
        Self::Connection {
            status: "connected".to_string(),
            message: "Connected to EV telemetry server".to_string(),
        }
    }

    pub fn response(action: impl Into<String>, status: CommandStatus, value: Option<Value>) -> Self {
        Self::Response {
            action: action.into(),
            status,
            value,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize to a text frame
    pub fn to_json(&self) -> Result<String, ContractError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Borrowing twin of [`ServerMessage::Telemetry`]
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TelemetryFrame<'a> {
    Telemetry(&'a TelemetrySnapshot),
}

/// Encode a snapshot as a `telemetry` frame without copying it
pub fn telemetry_json(snapshot: &TelemetrySnapshot) -> Result<String, ContractError> {
    Ok(serde_json::to_string(&TelemetryFrame::Telemetry(snapshot))?)
}

impl From<CommandRejection> for ServerMessage {
    fn from(rejection: CommandRejection) -> Self {
        Self::error(rejection.to_string())
    }
}
