//! # Aggregator
//!
//! Per-cycle telemetry composition.
//!
//! - [`SharedState`]: settings, media player and cloud-link flags shared by
//!   the command handler and the broadcast loop
//! - [`TelemetryAggregator`]: polls the drivers and builds one
//!   [`contracts::TelemetrySnapshot`], isolating per-driver failure

pub mod collect;
pub mod media;
pub mod state;

pub use collect::{Drivers, TelemetryAggregator};
pub use media::MediaPlayer;
pub use state::SharedState;
