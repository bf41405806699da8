//! SinkHandle - runs one cloud sink behind an isolated queue and worker task

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{CloudSink, LinkStatus, TelemetrySnapshot};

use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send snapshots to worker
    tx: mpsc::Sender<Arc<TelemetrySnapshot>>,
    /// Sink's connected flag
    status: LinkStatus,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    pub fn spawn<S: CloudSink + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let status = sink.status();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            status,
            metrics,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the sink reports itself connected
    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    /// Clone of the sink's connected flag
    pub fn status(&self) -> LinkStatus {
        self.status.clone()
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a snapshot (non-blocking)
    ///
    /// Returns true if queued, false if the queue is full (snapshot dropped)
    pub fn try_send(&self, snapshot: Arc<TelemetrySnapshot>) -> bool {
        match self.tx.try_send(snapshot) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(s)) => {
                self.metrics.inc_dropped_count();
                warn!(
                    sink = %self.name,
                    sequence = s.sequence,
                    "Queue full, snapshot dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Shutdown the sink worker gracefully
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        // closing the channel ends the worker loop
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

/// Worker task that consumes snapshots and publishes them
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: CloudSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Arc<TelemetrySnapshot>>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(snapshot) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.publish(&snapshot).await {
            Ok(()) => {
                metrics.inc_write_count();
                observability::record_sink_publish(&name, true);
            }
            Err(e) => {
                metrics.inc_failure_count();
                observability::record_sink_publish(&name, false);
                error!(
                    sink = %name,
                    sequence = snapshot.sequence,
                    error = %e,
                    "Publish failed"
                );
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}

#[cfg(test)]
pub(crate) mod testing {
    //! Mock cloud sink shared by dispatcher tests

    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use contracts::{CloudSink, ContractError, LinkStatus, TelemetrySnapshot};
    use tokio::time::{sleep, Duration};

    pub struct MockSink {
        pub name: String,
        pub published: Arc<AtomicU64>,
        pub status: LinkStatus,
        pub should_fail: bool,
        pub delay_ms: u64,
    }

    impl MockSink {
        pub fn new(name: &str, connected: bool) -> Self {
            Self {
                name: name.to_string(),
                published: Arc::new(AtomicU64::new(0)),
                status: LinkStatus::new(connected),
                should_fail: false,
                delay_ms: 0,
            }
        }
    }

    impl CloudSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        fn status(&self) -> LinkStatus {
            self.status.clone()
        }

        async fn publish(&mut self, _snapshot: &TelemetrySnapshot) -> Result<(), ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(ContractError::sink_write(&self.name, "mock failure"));
            }
            self.published.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockSink;
    use super::*;
    use std::sync::atomic::Ordering;
    use tokio::time::{sleep, Duration};

    fn snapshot(sequence: u64) -> Arc<TelemetrySnapshot> {
        Arc::new(TelemetrySnapshot::fallback(sequence))
    }

    #[tokio::test]
    async fn test_sink_handle_basic() {
        let sink = MockSink::new("cloud", true);
        let published = Arc::clone(&sink.published);
        let handle = SinkHandle::spawn(sink, 10);
        assert!(handle.is_connected());

        for i in 0..5 {
            assert!(handle.try_send(snapshot(i)));
        }

        handle.shutdown().await;
        assert_eq!(published.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn test_sink_handle_queue_full() {
        let mut sink = MockSink::new("slow", true);
        sink.delay_ms = 100;
        let handle = SinkHandle::spawn(sink, 2);

        for i in 0..10 {
            handle.try_send(snapshot(i));
        }

        assert!(handle.metrics().dropped_count() > 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_sink_handle_failure_isolation() {
        let mut sink = MockSink::new("failing", true);
        sink.should_fail = true;
        let handle = SinkHandle::spawn(sink, 10);

        for i in 0..3 {
            handle.try_send(snapshot(i));
        }

        sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.metrics().failure_count(), 3);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_status_tracks_sink_flag() {
        let sink = MockSink::new("cloud", false);
        let flag = sink.status.clone();
        let handle = SinkHandle::spawn(sink, 4);
        assert!(!handle.is_connected());
        flag.set(true);
        assert!(handle.is_connected());
        handle.shutdown().await;
    }
}
