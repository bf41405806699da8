//! Route-following position simulator
//!
//! Each read moves the internal fix a fixed fraction of the remaining
//! distance toward the active waypoint and switches waypoint every
//! `steps_per_waypoint` reads. Jitter is applied to the reported fix only.
//!
//! A client-reported fix replaces the internal one and shifts the whole route
//! so it starts from that fix; later advancement follows the shifted route.
//! The hand-off is one-way.

use contracts::{ContractError, PositionConfig, PositionFix, PositionSource, PositionUpdate, Waypoint};
use parking_lot::Mutex;
use tracing::info;

use crate::simulation::SimRng;

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

fn clamp_latitude(latitude: f64) -> f64 {
    latitude.clamp(-90.0, 90.0)
}

/// Into [-180, 180); in-range values pass through untouched.
fn wrap_longitude(longitude: f64) -> f64 {
    if (-180.0..180.0).contains(&longitude) {
        longitude
    } else {
        (longitude + 180.0).rem_euclid(360.0) - 180.0
    }
}

#[derive(Debug, Clone)]
struct RouteState {
    latitude: f64,
    longitude: f64,
    route: Vec<Waypoint>,
    step: u64,
    altitude_m: Option<f64>,
    heading_offset_deg: f64,
    handed_off: bool,
}

impl RouteState {
    fn target(&self, steps_per_waypoint: u32) -> Waypoint {
        let index = (self.step / u64::from(steps_per_waypoint.max(1))) as usize % self.route.len();
        self.route[index]
    }
}

/// Simulated GNSS receiver
pub struct RouteSimulator {
    steps_per_waypoint: u32,
    smoothing: f64,
    jitter_deg: f64,
    rng: SimRng,
    state: Mutex<RouteState>,
}

impl RouteSimulator {
    /// Start at the first waypoint. Fails on an empty route.
    pub fn new(config: &PositionConfig, rng: SimRng) -> Result<Self, ContractError> {
        let start = config
            .route
            .first()
            .copied()
            .ok_or_else(|| ContractError::config_validation("position.route", "route is empty"))?;
        Ok(Self {
            steps_per_waypoint: config.steps_per_waypoint,
            smoothing: config.smoothing,
            jitter_deg: config.jitter_deg,
            rng,
            state: Mutex::new(RouteState {
                latitude: start.latitude,
                longitude: start.longitude,
                route: config.route.clone(),
                step: 0,
                altitude_m: None,
                heading_offset_deg: 0.0,
                handed_off: false,
            }),
        })
    }

    /// Internal (unjittered) fix
    pub fn baseline(&self) -> (f64, f64) {
        let state = self.state.lock();
        (state.latitude, state.longitude)
    }

    /// Advance one step and report
    pub fn advance(&self) -> PositionFix {
        let mut state = self.state.lock();

        let target = state.target(self.steps_per_waypoint);
        // shortest way round, so a route across the antimeridian stays local
        let d_lon = wrap_longitude(target.longitude - state.longitude);
        state.latitude += (target.latitude - state.latitude) * self.smoothing;
        state.longitude = wrap_longitude(state.longitude + d_lon * self.smoothing);
        state.step += 1;

        let jitter = self.jitter_deg;
        let latitude = clamp_latitude(state.latitude + self.rng.uniform(-jitter..=jitter));
        let longitude = wrap_longitude(state.longitude + self.rng.uniform(-jitter..=jitter));
        let heading = (state.heading_offset_deg + (state.step * 2) as f64).rem_euclid(360.0);
        let altitude = state
            .altitude_m
            .unwrap_or_else(|| self.rng.uniform(230.0..=250.0));

        PositionFix {
            latitude: round6(latitude),
            longitude: round6(longitude),
            heading_deg: (heading * 10.0).round() / 10.0,
            altitude_m: (altitude * 10.0).round() / 10.0,
            satellites: self.rng.int(8..=12) as u8,
            ground_speed_kmh: (self.rng.uniform(0.0..=100.0) * 10.0).round() / 10.0,
        }
    }
}

impl PositionSource for RouteSimulator {
    fn read(&self) -> Result<PositionFix, ContractError> {
        Ok(self.advance())
    }

    fn hand_off(&self, update: PositionUpdate) {
        let mut state = self.state.lock();
        let d_lat = update.latitude - state.latitude;
        let d_lon = update.longitude - state.longitude;
        for waypoint in &mut state.route {
            waypoint.latitude = clamp_latitude(waypoint.latitude + d_lat);
            waypoint.longitude = wrap_longitude(waypoint.longitude + d_lon);
        }
        state.latitude = update.latitude;
        state.longitude = update.longitude;
        if let Some(altitude) = update.altitude_m {
            state.altitude_m = Some(altitude);
        }
        if let Some(heading) = update.heading_deg {
            state.heading_offset_deg = heading - (state.step * 2) as f64;
        }
        if !state.handed_off {
            info!(
                latitude = update.latitude,
                longitude = update.longitude,
                "position handed off to client fix"
            );
        }
        state.handed_off = true;
    }

    fn is_handed_off(&self) -> bool {
        self.state.lock().handed_off
    }
}
