//! Reverse-gear and motion-detect lines

use std::sync::Arc;

use contracts::{DigitalInputs, DigitalLine};
use tracing::warn;

use crate::error::Result;
use crate::gpio::{GpioBus, PinMode};
use crate::simulation::{PhaseClock, SimRng};

/// Reverse button and PIR on GPIO
pub struct GpioLines<B: GpioBus> {
    bus: Arc<B>,
    reverse_pin: u8,
    motion_pin: u8,
}

impl<B: GpioBus> GpioLines<B> {
    pub fn new(bus: Arc<B>, reverse_pin: u8, motion_pin: u8) -> Result<Self> {
        bus.configure(reverse_pin, PinMode::InputPullDown)?;
        bus.configure(motion_pin, PinMode::Input)?;
        Ok(Self {
            bus,
            reverse_pin,
            motion_pin,
        })
    }

    fn pin(&self, line: DigitalLine) -> u8 {
        match line {
            DigitalLine::ReverseGear => self.reverse_pin,
            DigitalLine::RearMotion => self.motion_pin,
        }
    }
}

impl<B: GpioBus> DigitalInputs for GpioLines<B> {
    fn read_line(&self, line: DigitalLine) -> bool {
        let pin = self.pin(line);
        self.bus.read(pin).unwrap_or_else(|e| {
            warn!(line = line.as_str(), pin, error = %e, "gpio read fault");
            false
        })
    }

    fn release(&self) {
        self.bus.release();
    }
}

/// Phase-driven simulated lines
pub struct SimulatedLines {
    clock: PhaseClock,
    rng: SimRng,
    motion_probability: f64,
}

impl SimulatedLines {
    pub fn new(clock: PhaseClock, rng: SimRng, motion_probability: f64) -> Self {
        Self {
            clock,
            rng,
            motion_probability,
        }
    }
}

impl DigitalInputs for SimulatedLines {
    fn read_line(&self, line: DigitalLine) -> bool {
        let reversing = self.clock.phase().reverse_engaged();
        match line {
            DigitalLine::ReverseGear => reversing,
            DigitalLine::RearMotion => reversing && self.rng.chance(self.motion_probability),
        }
    }
}
