//! Telemetry server metrics
//!
//! Prometheus series go through the `metrics` facade; [`RunMetricsAggregator`]
//! keeps an in-memory copy for the shutdown summary.

use std::collections::HashMap;

use metrics::{counter, gauge, histogram};

/// Record one aggregation cycle
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_snapshot_collected;
///
/// let started = Instant::now();
/// let snapshot = aggregator.collect();
/// record_snapshot_collected(started.elapsed().as_secs_f64() * 1000.0, snapshot.degraded);
/// ```
pub fn record_snapshot_collected(duration_ms: f64, fallback: bool) {
    counter!("ev_telemetry_snapshots_total").increment(1);
    histogram!("ev_telemetry_collect_duration_ms").record(duration_ms);
    if fallback {
        counter!("ev_telemetry_fallback_snapshots_total").increment(1);
    }
}

/// Record a recoverable driver fault
pub fn record_sensor_fault(source: &str) {
    counter!(
        "ev_telemetry_sensor_faults_total",
        "source" => source.to_string()
    )
    .increment(1);
}

/// Record one fan-out
pub fn record_broadcast(delivered: usize, failed: usize) {
    counter!("ev_telemetry_broadcasts_total").increment(1);
    counter!("ev_telemetry_messages_delivered_total").increment(delivered as u64);
    if failed > 0 {
        counter!("ev_telemetry_client_send_failures_total").increment(failed as u64);
    }
}

pub fn record_client_connected() {
    counter!("ev_telemetry_client_connections_total").increment(1);
    gauge!("ev_telemetry_clients_connected").increment(1.0);
}

pub fn record_client_disconnected() {
    gauge!("ev_telemetry_clients_connected").decrement(1.0);
}

/// Record one inbound command
pub fn record_command(action: &str, accepted: bool) {
    let status = if accepted { "accepted" } else { "rejected" };
    counter!(
        "ev_telemetry_commands_total",
        "action" => action.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a cloud sink publish
pub fn record_sink_publish(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "ev_telemetry_sink_publish_total",
        "sink" => sink_name.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// In-memory run statistics
#[derive(Debug, Clone, Default)]
pub struct RunMetricsAggregator {
    pub snapshots: u64,
    pub fallback_snapshots: u64,
    pub messages_delivered: u64,
    pub client_send_failures: u64,
    pub collect_ms: RunningStats,
    pub sensor_faults: HashMap<String, u64>,
}

impl RunMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&mut self, collect_ms: f64, fallback: bool, delivered: usize, failed: usize) {
        self.snapshots += 1;
        if fallback {
            self.fallback_snapshots += 1;
        }
        self.messages_delivered += delivered as u64;
        self.client_send_failures += failed as u64;
        self.collect_ms.push(collect_ms);
    }

    pub fn record_fault(&mut self, source: &str) {
        *self.sensor_faults.entry(source.to_string()).or_insert(0) += 1;
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            snapshots: self.snapshots,
            fallback_snapshots: self.fallback_snapshots,
            messages_delivered: self.messages_delivered,
            client_send_failures: self.client_send_failures,
            fallback_rate: if self.snapshots > 0 {
                self.fallback_snapshots as f64 / self.snapshots as f64 * 100.0
            } else {
                0.0
            },
            collect_ms: StatsSummary::from(&self.collect_ms),
            sensor_faults: self.sensor_faults.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Shutdown summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub snapshots: u64,
    pub fallback_snapshots: u64,
    pub messages_delivered: u64,
    pub client_send_failures: u64,
    pub fallback_rate: f64,
    pub collect_ms: StatsSummary,
    pub sensor_faults: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Telemetry Run Summary ===")?;
        writeln!(f, "Snapshots: {}", self.snapshots)?;
        writeln!(
            f,
            "Fallback snapshots: {} ({:.2}%)",
            self.fallback_snapshots, self.fallback_rate
        )?;
        writeln!(f, "Messages delivered: {}", self.messages_delivered)?;
        writeln!(f, "Client send failures: {}", self.client_send_failures)?;
        writeln!(f, "Collect time (ms): {}", self.collect_ms)?;

        if !self.sensor_faults.is_empty() {
            writeln!(f, "Sensor faults:")?;
            let mut faults: Vec<_> = self.sensor_faults.iter().collect();
            faults.sort();
            for (source, count) in faults {
                writeln!(f, "  {}: {}", source, count)?;
            }
        }

        Ok(())
    }
}

/// Summary of a [`RunningStats`]
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
