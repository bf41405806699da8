//! Concurrent fan-out with per-client isolation

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc::error::SendTimeoutError;
use tracing::{debug, warn};

use crate::clients::{ClientId, ClientRegistry};
use crate::error::DispatcherError;

/// Outcome of one fan-out
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: Vec<DispatcherError>,
}

impl BroadcastReport {
    pub fn failed_clients(&self) -> Vec<ClientId> {
        self.failed
            .iter()
            .filter_map(|e| match e {
                DispatcherError::ClientSend { client_id, .. } => Some(*client_id),
                _ => None,
            })
            .collect()
    }
}

/// Queue `payload` for every registered client concurrently.
///
/// Each send waits at most `send_timeout`. A client whose send fails or
/// times out is removed from the registry; the others are unaffected.
pub async fn fan_out(
    registry: &ClientRegistry,
    payload: Arc<str>,
    send_timeout: Duration,
) -> BroadcastReport {
    let handles = registry.handles();
    if handles.is_empty() {
        return BroadcastReport::default();
    }

    let sends = handles.into_iter().map(|handle| {
        let payload = Arc::clone(&payload);
        async move {
            let result = handle.sender().send_timeout(payload, send_timeout).await;
            (handle.id(), result)
        }
    });

    let mut report = BroadcastReport::default();
    for (client_id, result) in join_all(sends).await {
        let message = match result {
            Ok(()) => {
                report.delivered += 1;
                continue;
            }
            Err(SendTimeoutError::Timeout(_)) => "outbound queue full past send timeout",
            Err(SendTimeoutError::Closed(_)) => "connection closed",
        };
        if registry.unregister(client_id) {
            warn!(client_id = %client_id, reason = message, "dropping client");
        }
        report
            .failed
            .push(DispatcherError::client_send(client_id, message));
    }

    debug!(
        delivered = report.delivered,
        failed = report.failed.len(),
        "fan-out complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_fan_out_delivers_identical_payload() {
        let registry = ClientRegistry::new();
        let (_a, mut rx_a) = registry.register(4);
        let (_b, mut rx_b) = registry.register(4);

        let report = fan_out(&registry, Arc::from("{\"type\":\"telemetry\"}"), TIMEOUT).await;
        assert_eq!(report.delivered, 2);
        assert!(report.failed.is_empty());

        let a = rx_a.recv().await.unwrap();
        let b = rx_b.recv().await.unwrap();
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_failed_client_removed_others_served() {
        let registry = ClientRegistry::new();
        let mut receivers = Vec::new();
        let mut ids = Vec::new();
        for _ in 0..5 {
            let (handle, rx) = registry.register(4);
            ids.push(handle.id());
            receivers.push(rx);
        }

        // client 2 goes away
        drop(receivers.remove(2));
        let gone = ids[2];

        let report = fan_out(&registry, Arc::from("snap"), TIMEOUT).await;
        assert_eq!(report.delivered, 4);
        assert_eq!(report.failed_clients(), vec![gone]);
        assert_eq!(registry.len(), 4);
        assert!(!registry.contains(gone));

        for rx in &mut receivers {
            assert_eq!(rx.recv().await.as_deref(), Some("snap"));
        }
    }

    #[tokio::test]
    async fn test_stalled_client_times_out() {
        let registry = ClientRegistry::new();
        let (slow, _slow_rx) = registry.register(1);
        let (_fast, mut fast_rx) = registry.register(4);

        // fill the slow client's queue, never drain it
        slow.sender().send(Arc::from("old")).await.unwrap();

        let report = fan_out(&registry, Arc::from("new"), TIMEOUT).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed_clients(), vec![slow.id()]);
        assert!(matches!(
            report.failed[0],
            DispatcherError::ClientSend { .. }
        ));
        assert_eq!(fast_rx.recv().await.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_no_clients() {
        let registry = ClientRegistry::new();
        let report = fan_out(&registry, Arc::from("x"), TIMEOUT).await;
        assert_eq!(report.delivered, 0);
        assert!(report.failed.is_empty());
    }
}
