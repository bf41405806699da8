//! Cloud sink implementations
//!
//! `LogSink` traces each snapshot; `NetworkSink` streams it over UDP.

mod log;
mod network;

pub use self::log::LogSink;
pub use self::network::{NetworkFormat, NetworkSink, NetworkSinkConfig};
