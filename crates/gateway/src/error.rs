//! Gateway error types

use thiserror::Error;

/// Transport errors
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Listener could not be opened; fatal at startup
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Server stopped with an I/O error
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

impl GatewayError {
    pub fn bind(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
