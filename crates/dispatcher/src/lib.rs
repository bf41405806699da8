//! # Dispatcher
//!
//! Outbound delivery.
//!
//! - [`ClientRegistry`]: the live client set, one bounded queue per client
//! - [`fan_out`]: concurrent, per-client isolated delivery of one payload
//! - [`Dispatcher`]: the periodic collect/serialize/fan-out loop
//! - [`SinkHandle`]: a cloud sink behind its own queue and worker task, so
//!   a slow or failing sink never stalls a tick

pub mod broadcast;
pub mod clients;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use broadcast::{fan_out, BroadcastReport};
pub use clients::{ClientHandle, ClientId, ClientRegistry};
pub use contracts::{CloudSink, TelemetrySnapshot};
pub use dispatcher::{create_sink_handles, Dispatcher, DispatcherConfig, TickReport};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{LogSink, NetworkFormat, NetworkSink, NetworkSinkConfig};
