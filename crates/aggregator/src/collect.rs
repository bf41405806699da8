//! TelemetryAggregator
//!
//! Polls every driver once per cycle and composes one snapshot. Each driver
//! call is isolated: an error or a panic in one driver substitutes that
//! driver's neutral/absent value and the rest of the snapshot is built
//! normally.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chrono::Utc;
use contracts::{
    CabinEnvironment, ConnectivityStatus, ContractError, DigitalInputs, DigitalLine,
    EnvironmentalSensor, LinkMonitor, ParkingState, PositionFix, PositionSource, ProximityChannel,
    ProximitySensor, ReadStatus, TelemetrySnapshot, VehicleBus, VehicleDynamics,
};
use observability::metrics;
use observability::RunMetricsAggregator;
use parking_lot::Mutex;
use sensors::DriverSet;
use tracing::{debug, instrument, warn};

use crate::state::SharedState;

/// The drivers a collection cycle polls
#[derive(Clone)]
pub struct Drivers {
    pub proximity: Arc<dyn ProximitySensor>,
    pub environment: Arc<dyn EnvironmentalSensor>,
    pub lines: Arc<dyn DigitalInputs>,
    pub vehicle: Arc<dyn VehicleBus>,
    pub position: Arc<dyn PositionSource>,
    pub network: Arc<dyn LinkMonitor>,
}

impl From<&DriverSet> for Drivers {
    fn from(set: &DriverSet) -> Self {
        Self {
            proximity: set.proximity.clone(),
            environment: set.environment.clone(),
            lines: set.lines.clone(),
            vehicle: set.vehicle.clone(),
            position: set.position.clone(),
            network: set.network.clone(),
        }
    }
}

/// Snapshot composer
pub struct TelemetryAggregator {
    drivers: Drivers,
    state: Arc<SharedState>,
    sequence: AtomicU64,
    run_metrics: Option<Arc<Mutex<RunMetricsAggregator>>>,
}

impl TelemetryAggregator {
    pub fn new(drivers: Drivers, state: Arc<SharedState>) -> Self {
        Self {
            drivers,
            state,
            sequence: AtomicU64::new(0),
            run_metrics: None,
        }
    }

    /// Also count driver faults into an in-memory run summary
    pub fn with_run_metrics(mut self, run_metrics: Arc<Mutex<RunMetricsAggregator>>) -> Self {
        self.run_metrics = Some(run_metrics);
        self
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Build one snapshot. Never fails; blocks for driver I/O.
    #[instrument(name = "telemetry_collect", skip(self))]
    pub fn collect(&self) -> TelemetrySnapshot {
        let started = Instant::now();
        let sequence = self.next_sequence();
        let d = &self.drivers;

        // single source of truth for ambient, humidity and cabin temperature
        let environment = self
            .guarded("environment", || {
                let reading = d.environment.read();
                if reading.status == ReadStatus::Degraded {
                    self.note_fault("environment");
                }
                Ok(reading.environment)
            })
            .unwrap_or(CabinEnvironment::EMPTY);

        let parking = self
            .guarded("parking", || Ok(self.read_parking()))
            .unwrap_or_else(ParkingState::disengaged);

        let dynamics = self
            .guarded("vehicle", || d.vehicle.read())
            .unwrap_or_else(VehicleDynamics::neutral);

        let gps: Option<PositionFix> = self.guarded("position", || d.position.read());

        let media = self.state.media_tick();
        let connectivity = ConnectivityStatus {
            wifi: self
                .guarded("network", || Ok(d.network.is_up()))
                .unwrap_or(false),
            bluetooth: media.connected,
            can_bus: self
                .guarded("vehicle_link", || Ok(d.vehicle.is_connected()))
                .unwrap_or(false),
            cloud: self.state.cloud_connected(),
        };

        let snapshot = TelemetrySnapshot {
            sequence,
            timestamp: Utc::now(),
            degraded: false,
            ambient_temp: environment.temperature_c,
            humidity: environment.humidity_pct,
            cabin_temp: TelemetrySnapshot::cabin_temp_for(environment.temperature_c),
            dynamics,
            gps,
            parking,
            tire_pressure: self.state.tire_pressure(),
            battery_cells: self.state.battery_cells(),
            connectivity,
            media,
            settings: self.state.settings(),
        };

        metrics::record_snapshot_collected(started.elapsed().as_secs_f64() * 1000.0, false);
        debug!(sequence, reverse = parking.reverse_engaged, "snapshot collected");
        snapshot
    }

    /// Fully-neutral snapshot for a cycle whose collection failed outright
    pub fn fallback(&self) -> TelemetrySnapshot {
        let snapshot = TelemetrySnapshot::fallback(self.next_sequence());
        metrics::record_snapshot_collected(0.0, true);
        snapshot
    }

    /// Reverse-gated proximity. The sensors are not triggered at all while
    /// reverse is off.
    fn read_parking(&self) -> ParkingState {
        let d = &self.drivers;
        let reverse = d.lines.read_line(DigitalLine::ReverseGear);
        let motion = d.lines.read_line(DigitalLine::RearMotion);
        if !reverse {
            return ParkingState::gated(false, motion, None, None);
        }

        let mut distances = [None, None];
        for (i, channel) in ProximityChannel::ALL.into_iter().enumerate() {
            if i > 0 {
                let settle = d.proximity.settle_delay();
                if !settle.is_zero() {
                    thread::sleep(settle);
                }
            }
            distances[i] = d.proximity.measure(channel);
            if distances[i].is_none() {
                debug!(%channel, "no distance this cycle");
            }
        }
        ParkingState::gated(true, motion, distances[0], distances[1])
    }

    /// Run one driver call, turning an error or panic into `None`.
    fn guarded<T>(
        &self,
        source: &'static str,
        read: impl FnOnce() -> Result<T, ContractError>,
    ) -> Option<T> {
        match catch_unwind(AssertUnwindSafe(read)) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(source, error = %e, "driver fault, using neutral value");
                self.note_fault(source);
                None
            }
            Err(_) => {
                warn!(source, "driver panicked, using neutral value");
                self.note_fault(source);
                None
            }
        }
    }

    fn note_fault(&self, source: &str) {
        metrics::record_sensor_fault(source);
        if let Some(run) = &self.run_metrics {
            run.lock().record_fault(source);
        }
    }
}
