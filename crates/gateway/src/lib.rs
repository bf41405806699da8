//! # Gateway
//!
//! WebSocket transport for the telemetry server.
//!
//! - [`create_router`]: the WebSocket route and `GET /health`
//! - [`CommandHandler`]: validated command -> state mutation -> reply
//! - [`serve`]: axum server with graceful shutdown

pub mod commands;
mod connection;
pub mod error;
pub mod server;

pub use commands::CommandHandler;
pub use error::{GatewayError, Result};
pub use server::{bind, create_router, serve, AppState};
