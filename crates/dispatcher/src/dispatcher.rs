//! Dispatcher - the periodic collect/serialize/fan-out loop

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use aggregator::TelemetryAggregator;
use contracts::{telemetry_json, ServerConfig, SinkConfig, SinkType, TelemetrySnapshot};
use observability::RunMetricsAggregator;

use crate::broadcast::{fan_out, BroadcastReport};
use crate::clients::ClientRegistry;
use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::sinks::{LogSink, NetworkSink};

/// Loop timing
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    pub interval: Duration,
    /// Per-client send budget inside one tick
    pub send_timeout: Duration,
}

impl From<&ServerConfig> for DispatcherConfig {
    fn from(server: &ServerConfig) -> Self {
        Self {
            interval: server.broadcast_interval(),
            send_timeout: server.send_timeout(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

/// Outcome of one tick
#[derive(Debug)]
pub struct TickReport {
    pub sequence: u64,
    pub fallback: bool,
    pub collect_ms: f64,
    pub broadcast: BroadcastReport,
    /// Sinks the snapshot was queued to
    pub forwarded: usize,
}

/// Create every configured cloud sink
#[instrument(name = "dispatcher_create_sinks", skip(configs), fields(sink_count = configs.len()))]
pub async fn create_sink_handles(configs: &[SinkConfig]) -> Result<Vec<SinkHandle>, DispatcherError> {
    let mut handles = Vec::with_capacity(configs.len());
    for config in configs {
        handles.push(create_sink_handle(config).await?);
    }
    Ok(handles)
}

#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => Ok(SinkHandle::spawn(
            LogSink::new(&config.name),
            config.queue_capacity,
        )),
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// Broadcast loop
///
/// Each tick collects one snapshot on the blocking pool, serializes it once
/// and queues the identical payload to every registered client. Connected
/// cloud sinks get the same snapshot; their failures stay inside their
/// worker tasks.
pub struct Dispatcher {
    aggregator: Arc<TelemetryAggregator>,
    registry: Arc<ClientRegistry>,
    sinks: Vec<SinkHandle>,
    config: DispatcherConfig,
    run_metrics: Option<Arc<Mutex<RunMetricsAggregator>>>,
}

impl Dispatcher {
    pub fn new(
        aggregator: Arc<TelemetryAggregator>,
        registry: Arc<ClientRegistry>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            aggregator,
            registry,
            sinks: Vec::new(),
            config,
            run_metrics: None,
        }
    }

    /// Attach cloud sinks; their connected flags are registered with the
    /// shared state so snapshots report `cloud` connectivity.
    pub fn with_sinks(mut self, sinks: Vec<SinkHandle>) -> Self {
        for sink in &sinks {
            self.aggregator.state().register_cloud_link(sink.status());
        }
        self.sinks.extend(sinks);
        self
    }

    pub fn with_run_metrics(mut self, run_metrics: Arc<Mutex<RunMetricsAggregator>>) -> Self {
        self.run_metrics = Some(run_metrics);
        self
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Per-sink counters
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.sinks
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Live counters, still readable after the loop has been spawned
    pub fn sink_metrics(&self) -> Vec<(String, Arc<SinkMetrics>)> {
        self.sinks
            .iter()
            .map(|h| (h.name().to_string(), Arc::clone(h.metrics())))
            .collect()
    }

    /// Tick until `shutdown` flips to true (or its sender is dropped), then
    /// drain and close the sinks.
    #[instrument(name = "dispatcher_run", skip(self, shutdown), fields(interval_ms = self.config.interval.as_millis() as u64))]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(sinks = self.sinks.len(), "Broadcast loop started");

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Broadcast loop stopping");
        for sink in self.sinks {
            sink.shutdown().await;
        }
        info!("Broadcast loop shutdown complete");
    }

    /// Spawn the loop as a background task
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// One collect/serialize/fan-out cycle
    #[instrument(name = "broadcast_tick", skip(self), fields(clients = self.registry.len()))]
    pub async fn tick(&self) -> TickReport {
        let started = Instant::now();
        let (snapshot, mut fallback) = self.collect().await;

        let (snapshot, payload) = match encode(&snapshot) {
            Ok(payload) => (snapshot, payload),
            Err(e) => {
                error!(sequence = snapshot.sequence, error = %e, "Snapshot encoding failed, sending fallback");
                fallback = true;
                let neutral = self.aggregator.fallback();
                match encode(&neutral) {
                    Ok(payload) => (neutral, payload),
                    Err(e) => {
                        error!(error = %e, "Fallback encoding failed, skipping tick");
                        return TickReport {
                            sequence: neutral.sequence,
                            fallback,
                            collect_ms: elapsed_ms(started),
                            broadcast: BroadcastReport::default(),
                            forwarded: 0,
                        };
                    }
                }
            }
        };
        let collect_ms = elapsed_ms(started);

        let broadcast = fan_out(&self.registry, Arc::from(payload), self.config.send_timeout).await;
        let forwarded = self.forward(Arc::new(snapshot.clone()));

        observability::record_broadcast(broadcast.delivered, broadcast.failed.len());
        if let Some(run) = &self.run_metrics {
            run.lock()
                .record_cycle(collect_ms, fallback, broadcast.delivered, broadcast.failed.len());
        }

        debug!(
            sequence = snapshot.sequence,
            delivered = broadcast.delivered,
            failed = broadcast.failed.len(),
            forwarded,
            "Tick complete"
        );

        TickReport {
            sequence: snapshot.sequence,
            fallback,
            collect_ms,
            broadcast,
            forwarded,
        }
    }

    /// Collection runs on the blocking pool so pulse timing never shares a
    /// thread with socket I/O. A panic escaping the aggregator yields the
    /// neutral fallback snapshot.
    async fn collect(&self) -> (TelemetrySnapshot, bool) {
        let aggregator = Arc::clone(&self.aggregator);
        match tokio::task::spawn_blocking(move || aggregator.collect()).await {
            Ok(snapshot) => (snapshot, false),
            Err(e) => {
                warn!(error = %e, "Collection failed, broadcasting fallback snapshot");
                (self.aggregator.fallback(), true)
            }
        }
    }

    fn forward(&self, snapshot: Arc<TelemetrySnapshot>) -> usize {
        let mut forwarded = 0;
        for sink in &self.sinks {
            if !sink.is_connected() {
                sink.metrics().inc_skipped_count();
                continue;
            }
            if sink.try_send(Arc::clone(&snapshot)) {
                forwarded += 1;
            }
        }
        forwarded
    }
}

fn encode(snapshot: &TelemetrySnapshot) -> Result<String, DispatcherError> {
    telemetry_json(snapshot).map_err(|e| DispatcherError::Encode(e.to_string()))
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
