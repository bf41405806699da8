//! Cabin temperature/humidity with cache and bounded retry
//!
//! The hardware sensor must not be sampled more often than every
//! `min_interval`. Reads inside that window are served from the cache
//! without touching the probe. A stale cache triggers up to `max_attempts`
//! probe samples; if all fail the previous good values are kept.

use std::thread;
use std::time::{Duration, Instant};

use contracts::{round1, CabinEnvironment, EnvironmentConfig, EnvironmentReading, EnvironmentalSensor, ReadStatus};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::simulation::SimRng;

/// One raw (temperature °C, humidity %) sample
pub trait ClimateProbe: Send + Sync {
    fn sample(&self) -> Result<(f64, f64)>;

    fn release(&self) {}
}

/// Cache/retry policy
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub min_interval: Duration,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl From<&EnvironmentConfig> for CachePolicy {
    fn from(config: &EnvironmentConfig) -> Self {
        Self {
            min_interval: Duration::from_millis(config.min_interval_ms),
            max_attempts: config.max_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CacheState {
    /// Never sampled successfully
    Empty,
    /// Last good sample and when it was taken
    Fresh {
        environment: CabinEnvironment,
        taken_at: Instant,
    },
    /// Retries exhausted; holding the last good sample, if any
    Degraded { last_good: CabinEnvironment },
}

impl CacheState {
    fn environment(&self) -> CabinEnvironment {
        match *self {
            Self::Empty => CabinEnvironment::EMPTY,
            Self::Fresh { environment, .. } => environment,
            Self::Degraded { last_good } => last_good,
        }
    }
}

/// Caching driver around a probe
pub struct CachedEnvironment<P: ClimateProbe> {
    probe: P,
    policy: CachePolicy,
    state: Mutex<CacheState>,
}

impl<P: ClimateProbe> CachedEnvironment<P> {
    pub fn new(probe: P, policy: CachePolicy) -> Self {
        Self {
            probe,
            policy,
            state: Mutex::new(CacheState::Empty),
        }
    }

    pub fn read_at(&self, now: Instant) -> EnvironmentReading {
        let mut state = self.state.lock();

        if let CacheState::Fresh {
            environment,
            taken_at,
        } = *state
        {
            if now.saturating_duration_since(taken_at) < self.policy.min_interval {
                return EnvironmentReading {
                    environment,
                    status: ReadStatus::Cached,
                };
            }
        }

        for attempt in 1..=self.policy.max_attempts {
            match self.probe.sample() {
                Ok((temperature, humidity)) => {
                    let environment = CabinEnvironment::new(round1(temperature), round1(humidity));
                    *state = CacheState::Fresh {
                        environment,
                        taken_at: now,
                    };
                    return EnvironmentReading {
                        environment,
                        status: ReadStatus::Fresh,
                    };
                }
                Err(e) => {
                    if attempt == 1 {
                        warn!(attempt, error = %e, "environment sample failed");
                    } else {
                        debug!(attempt, error = %e, "environment sample failed");
                    }
                    if attempt < self.policy.max_attempts && !self.policy.retry_backoff.is_zero() {
                        thread::sleep(self.policy.retry_backoff);
                    }
                }
            }
        }

        let last_good = state.environment();
        *state = CacheState::Degraded { last_good };
        EnvironmentReading {
            environment: last_good,
            status: ReadStatus::Degraded,
        }
    }
}

impl<P: ClimateProbe> EnvironmentalSensor for CachedEnvironment<P> {
    fn read(&self) -> EnvironmentReading {
        self.read_at(Instant::now())
    }

    fn release(&self) {
        self.probe.release();
    }
}

/// Slowly drifting simulated climate; never fails, never cached
pub struct SimulatedEnvironment {
    rng: SimRng,
    epoch: Instant,
}

impl SimulatedEnvironment {
    pub fn new(rng: SimRng) -> Self {
        Self {
            rng,
            epoch: Instant::now(),
        }
    }

    pub fn read_at(&self, now: Instant) -> CabinEnvironment {
        let elapsed = now.saturating_duration_since(self.epoch).as_secs_f64();
        // 24-28 °C over a 300 s cycle, 50-58 % over 180 s
        let temperature = 24.0 + (elapsed % 300.0) / 300.0 * 4.0 + self.rng.uniform(-0.5..=0.5);
        let humidity = 50.0 + (elapsed % 180.0) / 180.0 * 8.0 + self.rng.uniform(-2.0..=2.0);
        CabinEnvironment::new(round1(temperature), round1(humidity))
    }
}

impl EnvironmentalSensor for SimulatedEnvironment {
    fn read(&self) -> EnvironmentReading {
        EnvironmentReading {
            environment: self.read_at(Instant::now()),
            status: ReadStatus::Fresh,
        }
    }
}
