//! Dispatcher error types

use thiserror::Error;

use crate::clients::ClientId;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Outbound send to one client failed or timed out
    #[error("send to client {client_id} failed: {message}")]
    ClientSend { client_id: ClientId, message: String },

    /// Snapshot could not be encoded
    #[error("snapshot encoding failed: {0}")]
    Encode(String),

    /// Sink write error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a client send error
    pub fn client_send(client_id: ClientId, message: impl Into<String>) -> Self {
        Self::ClientSend {
            client_id,
            message: message.into(),
        }
    }
}
