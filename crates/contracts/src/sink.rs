//! CloudSink trait - Dispatcher output interface
//!
//! The core only publishes to a sink and reads its `connected` flag; it
//! never drives the sink's connection lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{ContractError, TelemetrySnapshot};

/// Shared connected flag
///
/// A sink keeps one clone and flips it as its link comes and goes; the
/// dispatcher keeps another and reads it without touching the sink task.
#[derive(Debug, Clone, Default)]
pub struct LinkStatus(Arc<AtomicBool>);

impl LinkStatus {
    pub fn new(connected: bool) -> Self {
        Self(Arc::new(AtomicBool::new(connected)))
    }

    pub fn set(&self, connected: bool) {
        self.0.store(connected, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Cloud publisher trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(CloudSink: Send)]
pub trait LocalCloudSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Connected flag handle
    fn status(&self) -> LinkStatus;

    /// Publish one snapshot
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_status_shared_between_clones() {
        let status = LinkStatus::new(false);
        let observer = status.clone();
        assert!(!observer.is_connected());
        status.set(true);
        assert!(observer.is_connected());
    }
}
