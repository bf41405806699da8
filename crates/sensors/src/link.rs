//! Short-range wireless pairing and network interface state

use std::fs;
use std::path::PathBuf;

use contracts::{ContractError, LinkMonitor, ShortRangeLink};
use tracing::{debug, info};

/// Display name reported by the simulated pairing
pub const SIMULATED_DEVICE_NAME: &str = "Mock Phone";

/// Pairing that always succeeds
#[derive(Debug, Default)]
pub struct SimulatedLink;

impl ShortRangeLink for SimulatedLink {
    fn connect(&self, device_address: &str) -> Result<String, ContractError> {
        info!(device_address, "simulated bluetooth pairing");
        Ok(SIMULATED_DEVICE_NAME.to_string())
    }
}

/// Reads `/sys/class/net/<iface>/operstate`
#[derive(Debug, Clone)]
pub struct OperstateMonitor {
    path: PathBuf,
}

impl OperstateMonitor {
    pub fn new(interface: &str) -> Self {
        Self::with_path(PathBuf::from("/sys/class/net").join(interface).join("operstate"))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LinkMonitor for OperstateMonitor {
    fn is_up(&self) -> bool {
        match fs::read_to_string(&self.path) {
            Ok(state) => state.trim() == "up",
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "operstate unreadable");
                false
            }
        }
    }
}

/// Simulated network, always up
#[derive(Debug, Default)]
pub struct AlwaysUp;

impl LinkMonitor for AlwaysUp {
    fn is_up(&self) -> bool {
        true
    }
}
