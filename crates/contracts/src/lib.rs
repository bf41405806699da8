//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Snapshots carry a wall-clock UTC timestamp (RFC 3339 on the wire)
//! - `sequence` increases by one per broadcast cycle and is only used for
//!   ordering/diagnostics

mod blueprint;
mod command;
mod error;
mod message;
mod proximity;
mod sensor;
mod settings;
mod sink;
mod telemetry;

pub use blueprint::*;
pub use command::*;
pub use error::*;
pub use message::*;
pub use proximity::*;
pub use sensor::*;
pub use settings::*;
pub use sink::*;
pub use telemetry::*;
