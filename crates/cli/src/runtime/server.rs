//! ServerRuntime - wires drivers, shared state, the broadcast loop and the
//! WebSocket gateway, then runs until the shutdown future resolves.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{info, warn};

use aggregator::{Drivers, SharedState, TelemetryAggregator};
use contracts::ServerBlueprint;
use dispatcher::{create_sink_handles, ClientRegistry, Dispatcher, DispatcherConfig};
use gateway::{AppState, CommandHandler};
use observability::RunMetricsAggregator;
use sensors::{DriverFactory, PlatformReport};

use super::RunStats;

/// Bound on each shutdown step
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// One server run
pub struct ServerRuntime {
    blueprint: ServerBlueprint,
    report: Option<PlatformReport>,
}

impl ServerRuntime {
    pub fn new(blueprint: ServerBlueprint) -> Self {
        Self {
            blueprint,
            report: None,
        }
    }

    /// Use a fixed platform probe result instead of inspecting the host
    #[cfg(test)]
    pub fn with_platform(mut self, report: PlatformReport) -> Self {
        self.report = Some(report);
        self
    }

    /// Serve until `shutdown` resolves.
    ///
    /// A bind failure is returned before any client can connect. On
    /// shutdown the broadcast loop is stopped, sinks are drained and the
    /// drivers are released.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<RunStats> {
        let started = Instant::now();
        let blueprint = &self.blueprint;

        if let Some(port) = blueprint.server.metrics_port {
            observability::init_metrics_only(port)?;
            info!(port, "Metrics endpoint available");
        }

        let factory = match self.report.clone() {
            Some(report) => DriverFactory::with_report(report),
            None => DriverFactory::new(),
        };
        let drivers = factory
            .build(blueprint)
            .context("Failed to construct sensor drivers")?;
        info!(backend = %drivers.backend, "Drivers ready");

        let state = Arc::new(SharedState::from_blueprint(blueprint));
        let run_metrics = Arc::new(Mutex::new(RunMetricsAggregator::new()));
        let aggregator = Arc::new(
            TelemetryAggregator::new(Drivers::from(&drivers), Arc::clone(&state))
                .with_run_metrics(Arc::clone(&run_metrics)),
        );

        let addr = blueprint.server.bind_addr();
        let listener = gateway::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind WebSocket server on {addr}"))?;

        if blueprint.sinks.is_empty() {
            info!("No cloud sinks configured");
        }
        let sinks = create_sink_handles(&blueprint.sinks)
            .await
            .context("Failed to create cloud sinks")?;

        let registry = Arc::new(ClientRegistry::new());
        let dispatcher = Dispatcher::new(
            aggregator,
            Arc::clone(&registry),
            DispatcherConfig::from(&blueprint.server),
        )
        .with_sinks(sinks)
        .with_run_metrics(Arc::clone(&run_metrics));
        let sink_metrics = dispatcher.sink_metrics();

        let commands = Arc::new(CommandHandler::new(
            state,
            Arc::clone(&drivers.position),
            Arc::clone(&drivers.link),
        ));
        let router = gateway::create_router(
            AppState::new(
                Arc::clone(&registry),
                commands,
                blueprint.server.client_queue_capacity,
            ),
            &blueprint.server.path,
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let loop_handle = dispatcher.spawn(shutdown_rx.clone());

        let mut server_shutdown = shutdown_rx;
        let server_handle = tokio::spawn(gateway::serve(listener, router, async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        }));

        info!(addr = %addr, path = %blueprint.server.path, "EV telemetry server running");

        shutdown.await;

        info!(clients = registry.len(), "Shutting down...");
        let _ = shutdown_tx.send(true);

        if tokio::time::timeout(SHUTDOWN_GRACE, loop_handle).await.is_err() {
            warn!("Broadcast loop did not stop in time");
        }
        match tokio::time::timeout(SHUTDOWN_GRACE, server_handle).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(error = %e, "WebSocket server stopped with error"),
            Ok(Err(e)) => warn!(error = %e, "WebSocket server task failed"),
            Err(_) => warn!("WebSocket server did not stop in time"),
        }

        drivers.release();

        let stats = RunStats {
            duration: started.elapsed(),
            backend: drivers.backend,
            summary: run_metrics.lock().summary(),
            sinks: sink_metrics
                .iter()
                .map(|(name, metrics)| (name.clone(), metrics.snapshot()))
                .collect(),
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            snapshots = stats.summary.snapshots,
            "Shutdown complete"
        );
        Ok(stats)
    }
}
