//! LogSink - traces a one-line summary of each snapshot

use contracts::{CloudSink, ContractError, LinkStatus, TelemetrySnapshot};
use tracing::{info, instrument};

/// Sink that logs snapshot summaries; always connected
pub struct LogSink {
    name: String,
    status: LinkStatus,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: LinkStatus::new(true),
        }
    }
}

impl CloudSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> LinkStatus {
        self.status.clone()
    }

    #[instrument(
        name = "log_sink_publish",
        skip(self, snapshot),
        fields(sink = %self.name, sequence = snapshot.sequence)
    )]
    async fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), ContractError> {
        info!(
            sink = %self.name,
            sequence = snapshot.sequence,
            degraded = snapshot.degraded,
            reverse = snapshot.parking.reverse_engaged,
            speed_kmh = snapshot.dynamics.speed_kmh,
            soc_pct = snapshot.dynamics.battery.soc_pct,
            "Snapshot published"
        );
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.status.set(false);
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
