//! DriverFactory
//!
//! Builds the complete driver set once at startup from a `ServerBlueprint`
//! and owns the hardware-release path used at shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    DigitalInputs, EnvironmentalSensor, HardwareMode, LinkMonitor, PositionSource, ProximitySensor,
    ServerBlueprint, ShortRangeLink, VehicleBus,
};
use tracing::{info, instrument, warn};

use crate::dht11::Dht11;
use crate::digital::{GpioLines, SimulatedLines};
use crate::dynamics::SimulatedVehicleBus;
use crate::environment::{CachePolicy, CachedEnvironment, SimulatedEnvironment};
use crate::error::Result;
use crate::gpio::GpioBus;
use crate::link::{AlwaysUp, OperstateMonitor, SimulatedLink};
use crate::position::RouteSimulator;
use crate::probe::{resolve_backend, Backend, PlatformReport};
use crate::proximity::{EchoTiming, SimulatedProximity, UltrasonicArray};
use crate::simulation::{PhaseClock, SimRng};

/// Every driver the aggregator polls, plus the collaborators commands use
pub struct DriverSet {
    pub backend: Backend,
    pub proximity: Arc<dyn ProximitySensor>,
    pub environment: Arc<dyn EnvironmentalSensor>,
    pub lines: Arc<dyn DigitalInputs>,
    pub vehicle: Arc<dyn VehicleBus>,
    pub position: Arc<dyn PositionSource>,
    pub link: Arc<dyn ShortRangeLink>,
    pub network: Arc<dyn LinkMonitor>,
    released: AtomicBool,
}

impl DriverSet {
    /// Release held hardware (pins revert to inputs).
    ///
    /// # Idempotency
    /// Only the first call touches the drivers.
    #[instrument(name = "driver_set_release", skip(self), fields(backend = %self.backend))]
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.proximity.release();
        self.environment.release();
        self.lines.release();
        info!("drivers released");
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl Drop for DriverSet {
    fn drop(&mut self) {
        self.release();
    }
}

/// Driver factory
///
/// Backend selection happens here and only here.
pub struct DriverFactory {
    report: PlatformReport,
}

impl DriverFactory {
    /// Probe the running machine
    pub fn new() -> Self {
        Self::with_report(PlatformReport::detect())
    }

    pub fn with_report(report: PlatformReport) -> Self {
        Self { report }
    }

    pub fn report(&self) -> &PlatformReport {
        &self.report
    }

    /// Build all drivers for the configured mode
    pub fn build(&self, blueprint: &ServerBlueprint) -> Result<DriverSet> {
        self.build_with(blueprint, hardware_set)
    }

    /// Build with a custom hardware constructor.
    ///
    /// In `auto` mode a failing hardware constructor degrades to the
    /// simulated set; only an explicit `hardware` mode surfaces the error.
    #[instrument(
        name = "driver_factory_build",
        skip(self, blueprint, hardware),
        fields(mode = ?blueprint.hardware.mode, arch = self.report.arch)
    )]
    pub fn build_with(
        &self,
        blueprint: &ServerBlueprint,
        hardware: impl FnOnce(&ServerBlueprint) -> Result<DriverSet>,
    ) -> Result<DriverSet> {
        let backend = resolve_backend(blueprint.hardware.mode, &self.report)?;
        let set = match backend {
            Backend::Simulated => simulated_set(blueprint)?,
            Backend::Hardware => match hardware(blueprint) {
                Ok(set) => set,
                Err(e) if blueprint.hardware.mode == HardwareMode::Auto => {
                    warn!(error = %e, "hardware init failed, using simulated drivers");
                    simulated_set(blueprint)?
                }
                Err(e) => return Err(e),
            },
        };
        info!(backend = %set.backend, "drivers constructed");
        Ok(set)
    }
}

impl Default for DriverFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// All-simulated driver set; never touches GPIO.
pub fn simulated_set(blueprint: &ServerBlueprint) -> Result<DriverSet> {
    let sim = &blueprint.simulation;
    let rng = SimRng::new(sim.seed);
    let clock = PhaseClock::cycling(Duration::from_millis(sim.phase_interval_ms));

    Ok(DriverSet {
        backend: Backend::Simulated,
        proximity: Arc::new(SimulatedProximity::new(
            clock,
            rng.clone(),
            sim.right_channel_offset_cm,
        )),
        environment: Arc::new(SimulatedEnvironment::new(rng.clone())),
        lines: Arc::new(SimulatedLines::new(clock, rng.clone(), sim.motion_probability)),
        vehicle: Arc::new(SimulatedVehicleBus::new(rng.clone())),
        position: Arc::new(RouteSimulator::new(&blueprint.position, rng)?),
        link: Arc::new(SimulatedLink),
        network: Arc::new(AlwaysUp),
        released: AtomicBool::new(false),
    })
}

/// GPIO-backed proximity, climate and lines over `bus`. Powertrain,
/// position and pairing stay simulated; no real decoders exist for them yet.
///
/// Pins already claimed are released again if a later claim fails.
pub fn gpio_set<B: GpioBus + 'static>(blueprint: &ServerBlueprint, bus: Arc<B>) -> Result<DriverSet> {
    let hw = &blueprint.hardware;
    let claimed = UltrasonicArray::new(
        bus.clone(),
        hw.rear_left,
        hw.rear_right,
        EchoTiming::from(hw),
    )
    .and_then(|proximity| Ok((proximity, Dht11::new(bus.clone(), hw.dht_pin)?)))
    .and_then(|(proximity, climate)| {
        let lines = GpioLines::new(bus.clone(), hw.reverse_pin, hw.motion_pin)?;
        Ok((proximity, climate, lines))
    });
    let (proximity, climate, lines) = match claimed {
        Ok(drivers) => drivers,
        Err(e) => {
            bus.release();
            return Err(e);
        }
    };

    let rng = SimRng::new(blueprint.simulation.seed);
    Ok(DriverSet {
        backend: Backend::Hardware,
        proximity: Arc::new(proximity),
        environment: Arc::new(CachedEnvironment::new(
            climate,
            CachePolicy::from(&blueprint.environment),
        )),
        lines: Arc::new(lines),
        vehicle: Arc::new(SimulatedVehicleBus::new(rng.clone())),
        position: Arc::new(RouteSimulator::new(&blueprint.position, rng)?),
        link: Arc::new(SimulatedLink),
        network: Arc::new(OperstateMonitor::new(&hw.wifi_interface)),
        released: AtomicBool::new(false),
    })
}

#[cfg(feature = "hardware")]
fn hardware_set(blueprint: &ServerBlueprint) -> Result<DriverSet> {
    let bus = Arc::new(crate::gpio::RppalBus::open()?);
    gpio_set(blueprint, bus)
}

#[cfg(not(feature = "hardware"))]
fn hardware_set(_blueprint: &ServerBlueprint) -> Result<DriverSet> {
    warn!("hardware backend requested in a build without GPIO support");
    Err(crate::error::SensorError::unavailable(
        "built without the `hardware` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::testing::ScriptedBus;
    use contracts::{DigitalLine, ProximityChannel, ReadStatus};

    fn laptop() -> PlatformReport {
        PlatformReport {
            arch: "x86_64",
            gpio_device: false,
            board_model: None,
            driver_compiled: false,
        }
    }

    #[test]
    fn test_auto_falls_back_to_simulated() {
        let factory = DriverFactory::with_report(laptop());
        let set = factory.build(&ServerBlueprint::default()).unwrap();
        assert_eq!(set.backend, Backend::Simulated);
        assert!(set.proximity.measure(ProximityChannel::RearLeft).is_some());
        assert_eq!(set.environment.read().status, ReadStatus::Fresh);
        assert!(set.network.is_up());
        assert!(!set.vehicle.is_connected());
    }

    fn pi() -> PlatformReport {
        PlatformReport {
            arch: "aarch64",
            gpio_device: true,
            board_model: Some("Raspberry Pi 4 Model B".to_string()),
            driver_compiled: true,
        }
    }

    fn broken_bus() -> Arc<ScriptedBus> {
        let bus = ScriptedBus::new();
        // rear-right echo; claimed after the left channel succeeded
        bus.fail_pin(ServerBlueprint::default().hardware.rear_right.echo);
        Arc::new(bus)
    }

    #[test]
    fn test_auto_survives_hardware_init_failure() {
        let factory = DriverFactory::with_report(pi());
        let bus = broken_bus();
        let set = factory
            .build_with(&ServerBlueprint::default(), |bp| gpio_set(bp, bus.clone()))
            .unwrap();
        assert_eq!(set.backend, Backend::Simulated);
        assert!(set.proximity.measure(ProximityChannel::RearLeft).is_some());
        // partially claimed pins were handed back
        assert_eq!(bus.releases(), 1);
    }

    #[test]
    fn test_explicit_hardware_init_failure_is_fatal() {
        let mut blueprint = ServerBlueprint::default();
        blueprint.hardware.mode = HardwareMode::Hardware;
        let factory = DriverFactory::with_report(pi());
        let bus = broken_bus();
        assert!(factory
            .build_with(&blueprint, |bp| gpio_set(bp, bus.clone()))
            .is_err());
    }

    #[test]
    fn test_gpio_set_over_working_bus() {
        let factory = DriverFactory::with_report(pi());
        let bus = Arc::new(ScriptedBus::new());
        let set = factory
            .build_with(&ServerBlueprint::default(), |bp| gpio_set(bp, bus.clone()))
            .unwrap();
        assert_eq!(set.backend, Backend::Hardware);
        assert!(!set.lines.read_line(DigitalLine::ReverseGear));
        set.release();
        assert!(bus.releases() >= 1);
    }

    #[test]
    fn test_required_hardware_fails_without_gpio() {
        let mut blueprint = ServerBlueprint::default();
        blueprint.hardware.mode = HardwareMode::Hardware;
        let factory = DriverFactory::with_report(laptop());
        assert!(factory.build(&blueprint).is_err());
    }

    #[test]
    fn test_simulated_set_shares_phase_clock() {
        let mut blueprint = ServerBlueprint::default();
        blueprint.simulation.seed = Some(4);
        let set = simulated_set(&blueprint).unwrap();
        // freshly started clock sits in the clear phase
        assert!(!set.lines.read_line(DigitalLine::ReverseGear));
        let d = set.proximity.measure(ProximityChannel::RearLeft).unwrap();
        assert!((35.0..=55.0).contains(&d));
    }

    #[test]
    fn test_release_is_idempotent() {
        let set = simulated_set(&ServerBlueprint::default()).unwrap();
        assert!(!set.is_released());
        set.release();
        set.release();
        assert!(set.is_released());
    }
}
