//! Simulated powertrain (stand-in for a CAN decoder)

use contracts::{BatteryState, ContractError, MotorState, VehicleBus, VehicleDynamics};

use crate::simulation::SimRng;

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Independent uniform draw per field, no state between reads
pub struct SimulatedVehicleBus {
    rng: SimRng,
}

impl SimulatedVehicleBus {
    pub fn new(rng: SimRng) -> Self {
        Self { rng }
    }

    pub fn sample(&self) -> VehicleDynamics {
        let rng = &self.rng;
        VehicleDynamics {
            speed_kmh: round1(rng.uniform(0.0..=120.0)),
            battery: BatteryState {
                soc_pct: round1(rng.uniform(60.0..=95.0)),
                voltage_v: round1(rng.uniform(380.0..=420.0)),
                current_a: round1(rng.uniform(-50.0..=50.0)),
                health_pct: round1(rng.uniform(95.0..=99.0)),
            },
            motor: MotorState {
                rpm: rng.uniform(0.0..=8000.0).round(),
                temperature_c: round1(rng.uniform(60.0..=95.0)),
            },
            range_km: rng.uniform(250.0..=350.0).round(),
            power_kw: round1(rng.uniform(0.0..=100.0)),
            efficiency_score: round1(rng.uniform(7.0..=9.5)),
            wheel_speed: rng.uniform(0.0..=50.0).round(),
        }
    }
}

impl VehicleBus for SimulatedVehicleBus {
    fn read(&self) -> Result<VehicleDynamics, ContractError> {
        Ok(self.sample())
    }

    fn is_connected(&self) -> bool {
        false
    }
}
