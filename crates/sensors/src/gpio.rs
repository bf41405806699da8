//! GPIO bus abstraction
//!
//! Drivers talk to pins only through [`GpioBus`], so the pulse-timing and
//! bit-decoding logic is identical for the real backend and the scripted
//! bus used in tests.

use std::time::{Duration, Instant};

use crate::error::{Result, SensorError};

/// Electrical configuration of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    InputPullDown,
    Output,
}

/// Edge direction, used in timeout errors
pub(crate) fn edge_name(high: bool) -> &'static str {
    if high {
        "rising"
    } else {
        "falling"
    }
}

/// Pin-level access (BCM numbering)
pub trait GpioBus: Send + Sync {
    /// Claim a pin and set its mode. Reconfiguring a claimed pin is allowed.
    fn configure(&self, pin: u8, mode: PinMode) -> Result<()>;

    fn write(&self, pin: u8, high: bool) -> Result<()>;

    fn read(&self, pin: u8) -> Result<bool>;

    /// Busy-wait until `pin` reads `high`, returning the instant it did.
    fn wait_for_level(&self, pin: u8, high: bool, timeout: Duration) -> Result<Instant> {
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if self.read(pin)? == high {
                return Ok(now);
            }
            if now >= deadline {
                return Err(SensorError::EdgeTimeout {
                    pin,
                    edge: edge_name(high),
                });
            }
            std::hint::spin_loop();
        }
    }

    /// Drop every claimed pin so it reverts to an input. Idempotent.
    fn release(&self);
}

#[cfg(feature = "hardware")]
pub use self::rpi::RppalBus;

#[cfg(feature = "hardware")]
mod rpi {
    use std::collections::HashMap;

    use parking_lot::Mutex;
    use rppal::gpio::{Bias, Gpio, IoPin, Level, Mode};
    use tracing::{debug, info};

    use super::{GpioBus, PinMode};
    use crate::error::{Result, SensorError};

    /// Pin mode and input bias for a [`PinMode`]
    pub(super) fn electrical(mode: PinMode) -> (Mode, Option<Bias>) {
        match mode {
            PinMode::Input => (Mode::Input, Some(Bias::Off)),
            PinMode::InputPullDown => (Mode::Input, Some(Bias::PullDown)),
            PinMode::Output => (Mode::Output, None),
        }
    }

    /// Raspberry Pi GPIO through `/dev/gpiomem`
    pub struct RppalBus {
        gpio: Gpio,
        pins: Mutex<HashMap<u8, IoPin>>,
    }

    impl RppalBus {
        pub fn open() -> Result<Self> {
            let gpio = Gpio::new().map_err(|e| SensorError::unavailable(e.to_string()))?;
            info!("gpio controller opened");
            Ok(Self {
                gpio,
                pins: Mutex::new(HashMap::new()),
            })
        }

        fn with_pin<T>(&self, pin: u8, f: impl FnOnce(&mut IoPin) -> T) -> Result<T> {
            let mut pins = self.pins.lock();
            let io = pins
                .get_mut(&pin)
                .ok_or_else(|| SensorError::gpio(pin, "pin not configured"))?;
            Ok(f(io))
        }
    }

    impl GpioBus for RppalBus {
        fn configure(&self, pin: u8, mode: PinMode) -> Result<()> {
            let mut pins = self.pins.lock();
            if !pins.contains_key(&pin) {
                let claimed = self
                    .gpio
                    .get(pin)
                    .map_err(|e| SensorError::gpio(pin, e.to_string()))?;
                pins.insert(pin, claimed.into_io(Mode::Input));
            }
            let Some(io) = pins.get_mut(&pin) else {
                return Err(SensorError::gpio(pin, "pin not configured"));
            };
            let (pin_mode, bias) = electrical(mode);
            io.set_mode(pin_mode);
            if let Some(bias) = bias {
                io.set_bias(bias);
            }
            Ok(())
        }

        fn write(&self, pin: u8, high: bool) -> Result<()> {
            let level = if high { Level::High } else { Level::Low };
            self.with_pin(pin, |io| io.write(level))
        }

        fn read(&self, pin: u8) -> Result<bool> {
            self.with_pin(pin, |io| io.read() == Level::High)
        }

        fn release(&self) {
            let mut pins = self.pins.lock();
            if !pins.is_empty() {
                debug!(count = pins.len(), "releasing gpio pins");
                // IoPin resets its mode on drop
                pins.clear();
            }
        }
    }
}
