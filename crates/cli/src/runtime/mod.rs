//! Server orchestration.

mod server;
mod stats;

pub use server::ServerRuntime;
pub use stats::RunStats;
