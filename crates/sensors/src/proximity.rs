//! Ultrasonic proximity drivers
//!
//! Hardware: HC-SR04 style trigger/echo pairs. A 10 µs trigger pulse starts a
//! measurement; the echo line stays high for the round-trip time of flight.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use contracts::{HardwareConfig, ProximityChannel, ProximitySensor, UltrasonicPins};
use tracing::{debug, warn};

use crate::error::{Result, SensorError};
use crate::gpio::{GpioBus, PinMode};
use crate::simulation::{PhaseClock, SimRng};

/// Half the speed of sound in cm/s (343 m/s, round trip)
pub const HALF_SPEED_OF_SOUND_CM_S: f64 = 17_150.0;

const TRIGGER_SETTLE: Duration = Duration::from_micros(200);
const TRIGGER_PULSE: Duration = Duration::from_micros(10);

/// Convert an echo high-duration into a distance.
///
/// Returns `None` outside the plausible window (0, max_cm].
pub fn echo_to_distance(echo: Duration, max_cm: f64) -> Option<f64> {
    let distance = echo.as_secs_f64() * HALF_SPEED_OF_SOUND_CM_S;
    let distance = (distance * 10.0).round() / 10.0;
    (distance > 0.0 && distance <= max_cm).then_some(distance)
}

/// Echo timing limits
#[derive(Debug, Clone, Copy)]
pub struct EchoTiming {
    pub start_timeout: Duration,
    pub end_timeout: Duration,
    pub settle: Duration,
    pub max_distance_cm: f64,
}

impl From<&HardwareConfig> for EchoTiming {
    fn from(hw: &HardwareConfig) -> Self {
        Self {
            start_timeout: Duration::from_millis(hw.echo_start_timeout_ms),
            end_timeout: Duration::from_millis(hw.echo_end_timeout_ms),
            settle: Duration::from_millis(hw.channel_settle_ms),
            max_distance_cm: hw.max_distance_cm,
        }
    }
}

/// Rear ultrasonic array on a GPIO bus
pub struct UltrasonicArray<B: GpioBus> {
    bus: Arc<B>,
    rear_left: UltrasonicPins,
    rear_right: UltrasonicPins,
    timing: EchoTiming,
}

impl<B: GpioBus> UltrasonicArray<B> {
    /// Claim trigger (output, low) and echo (input) pins for both channels.
    pub fn new(
        bus: Arc<B>,
        rear_left: UltrasonicPins,
        rear_right: UltrasonicPins,
        timing: EchoTiming,
    ) -> Result<Self> {
        for pins in [rear_left, rear_right] {
            bus.configure(pins.trigger, PinMode::Output)?;
            bus.write(pins.trigger, false)?;
            bus.configure(pins.echo, PinMode::Input)?;
        }
        Ok(Self {
            bus,
            rear_left,
            rear_right,
            timing,
        })
    }

    fn pins(&self, channel: ProximityChannel) -> UltrasonicPins {
        match channel {
            ProximityChannel::RearLeft => self.rear_left,
            ProximityChannel::RearRight => self.rear_right,
        }
    }

    /// One trigger/echo cycle
    pub fn try_measure(&self, channel: ProximityChannel) -> Result<f64> {
        let pins = self.pins(channel);

        self.bus.write(pins.trigger, false)?;
        thread::sleep(TRIGGER_SETTLE);
        self.bus.write(pins.trigger, true)?;
        thread::sleep(TRIGGER_PULSE);
        self.bus.write(pins.trigger, false)?;

        let rise = self
            .bus
            .wait_for_level(pins.echo, true, self.timing.start_timeout)?;
        let fall = self
            .bus
            .wait_for_level(pins.echo, false, self.timing.end_timeout)?;
        let echo = fall.saturating_duration_since(rise);

        echo_to_distance(echo, self.timing.max_distance_cm).ok_or(SensorError::Implausible {
            distance_cm: echo.as_secs_f64() * HALF_SPEED_OF_SOUND_CM_S,
        })
    }
}

impl<B: GpioBus> ProximitySensor for UltrasonicArray<B> {
    fn measure(&self, channel: ProximityChannel) -> Option<f64> {
        match self.try_measure(channel) {
            Ok(distance) => Some(distance),
            Err(SensorError::Gpio { pin, message }) => {
                warn!(%channel, pin, %message, "ultrasonic gpio fault");
                None
            }
            Err(e) => {
                debug!(%channel, error = %e, "no valid echo");
                None
            }
        }
    }

    fn settle_delay(&self) -> Duration {
        self.timing.settle
    }

    fn release(&self) {
        self.bus.release();
    }
}

/// Phase-driven simulated proximity
pub struct SimulatedProximity {
    clock: PhaseClock,
    rng: SimRng,
    right_offset_cm: f64,
}

impl SimulatedProximity {
    pub fn new(clock: PhaseClock, rng: SimRng, right_offset_cm: f64) -> Self {
        Self {
            clock,
            rng,
            right_offset_cm,
        }
    }

    pub fn measure_at(&self, channel: ProximityChannel, now: Instant) -> f64 {
        let offset = match channel {
            ProximityChannel::RearLeft => 0.0,
            ProximityChannel::RearRight => self.right_offset_cm,
        };
        let range = self.clock.phase_at(now).base_range();
        let distance = self
            .rng
            .uniform((range.start() + offset)..=(range.end() + offset));
        (distance * 10.0).round() / 10.0
    }
}

impl ProximitySensor for SimulatedProximity {
    fn measure(&self, channel: ProximityChannel) -> Option<f64> {
        Some(self.measure_at(channel, Instant::now()))
    }
}
