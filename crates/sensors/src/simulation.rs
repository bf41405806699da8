//! Shared state of the simulated backend
//!
//! The simulated proximity driver and the simulated digital lines read the
//! same [`PhaseClock`], so reverse is engaged exactly while the distances are
//! in the close-range phases.

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Proximity demo phase, cycling clear -> low -> medium -> high
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityPhase {
    Clear,
    Low,
    Medium,
    High,
}

impl ProximityPhase {
    pub const CYCLE: [ProximityPhase; 4] = [Self::Clear, Self::Low, Self::Medium, Self::High];

    /// Distance range (cm) before the per-channel offset
    pub fn base_range(self) -> RangeInclusive<f64> {
        match self {
            Self::Clear => 35.0..=55.0,
            Self::Low => 22.0..=30.0,
            Self::Medium => 12.0..=19.0,
            Self::High => 5.0..=9.0,
        }
    }

    /// Simulated reverse gear follows the close-range phases
    pub fn reverse_engaged(self) -> bool {
        matches!(self, Self::Medium | Self::High)
    }
}

#[derive(Debug, Clone, Copy)]
enum ClockMode {
    Cycling { start: Instant, interval: Duration },
    Fixed(ProximityPhase),
}

/// Wall-clock phase source
#[derive(Debug, Clone, Copy)]
pub struct PhaseClock {
    mode: ClockMode,
}

impl PhaseClock {
    /// Advance one phase every `interval`, starting at `Clear` now.
    pub fn cycling(interval: Duration) -> Self {
        Self::cycling_from(Instant::now(), interval)
    }

    pub fn cycling_from(start: Instant, interval: Duration) -> Self {
        Self {
            mode: ClockMode::Cycling {
                start,
                interval: interval.max(Duration::from_millis(1)),
            },
        }
    }

    /// Pin the phase (tests, demos)
    pub fn fixed(phase: ProximityPhase) -> Self {
        Self {
            mode: ClockMode::Fixed(phase),
        }
    }

    pub fn phase(&self) -> ProximityPhase {
        self.phase_at(Instant::now())
    }

    pub fn phase_at(&self, now: Instant) -> ProximityPhase {
        match self.mode {
            ClockMode::Fixed(phase) => phase,
            ClockMode::Cycling { start, interval } => {
                let elapsed = now.saturating_duration_since(start);
                let index = (elapsed.as_millis() / interval.as_millis()) % 4;
                ProximityPhase::CYCLE[index as usize]
            }
        }
    }
}

/// RNG shared by every simulated driver of one backend
#[derive(Clone)]
pub struct SimRng(Arc<Mutex<StdRng>>);

impl SimRng {
    /// Seeded when `seed` is given, OS entropy otherwise
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self(Arc::new(Mutex::new(rng)))
    }

    pub fn uniform(&self, range: RangeInclusive<f64>) -> f64 {
        self.0.lock().random_range(range)
    }

    pub fn int(&self, range: RangeInclusive<u32>) -> u32 {
        self.0.lock().random_range(range)
    }

    pub fn chance(&self, probability: f64) -> bool {
        self.0.lock().random_bool(probability.clamp(0.0, 1.0))
    }
}

impl fmt::Debug for SimRng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimRng").finish_non_exhaustive()
    }
}
