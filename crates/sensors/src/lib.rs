//! # Sensors
//!
//! Dual-mode (GPIO / simulated) drivers behind the `contracts` driver traits.
//!
//! Responsibilities:
//! - Ultrasonic time-of-flight ranging and DHT11 decoding over a [`GpioBus`]
//! - Cached, retried environmental reads
//! - Phase-driven simulation shared by proximity and reverse-gear lines
//! - Route-following position feed with client hand-off
//! - One-shot platform probe and [`DriverFactory`]
//!
//! ## Feature Flags
//!
//! - `hardware`: Enable the Raspberry Pi GPIO backend (requires rppal)

pub mod dht11;
pub mod digital;
pub mod dynamics;
pub mod environment;
pub mod error;
pub mod factory;
pub mod gpio;
pub mod link;
pub mod position;
pub mod probe;
pub mod proximity;
pub mod simulation;

pub use digital::{GpioLines, SimulatedLines};
pub use dynamics::SimulatedVehicleBus;
pub use environment::{CachePolicy, CachedEnvironment, ClimateProbe, SimulatedEnvironment};
pub use error::{Result, SensorError};
pub use factory::{gpio_set, simulated_set, DriverFactory, DriverSet};
pub use gpio::{GpioBus, PinMode};
pub use link::{AlwaysUp, OperstateMonitor, SimulatedLink};
pub use position::RouteSimulator;
pub use probe::{resolve_backend, Backend, PlatformReport};
pub use proximity::{echo_to_distance, EchoTiming, SimulatedProximity, UltrasonicArray};
pub use simulation::{PhaseClock, ProximityPhase, SimRng};

#[cfg(feature = "hardware")]
pub use gpio::RppalBus;
