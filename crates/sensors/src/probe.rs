//! Platform capability probe and backend selection
//!
//! Runs once at startup; drivers never re-check the platform per call.

use std::fmt;
use std::fs;
use std::path::Path;

use contracts::HardwareMode;

use crate::error::{Result, SensorError};

/// What the probe found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformReport {
    pub arch: &'static str,
    pub gpio_device: bool,
    pub board_model: Option<String>,
    /// Crate built with the `hardware` feature
    pub driver_compiled: bool,
}

impl PlatformReport {
    /// Inspect the running machine
    pub fn detect() -> Self {
        Self::detect_in(Path::new("/"))
    }

    /// Inspect a filesystem rooted at `root`
    pub fn detect_in(root: &Path) -> Self {
        let board_model = fs::read_to_string(root.join("proc/device-tree/model"))
            .ok()
            .map(|m| m.trim_end_matches(['\0', '\n']).to_string())
            .filter(|m| !m.is_empty());
        Self {
            arch: std::env::consts::ARCH,
            gpio_device: root.join("dev/gpiomem").exists(),
            board_model,
            driver_compiled: cfg!(feature = "hardware"),
        }
    }

    /// GPIO hardware can actually be driven
    pub fn supports_gpio(&self) -> bool {
        let arm = matches!(self.arch, "arm" | "aarch64");
        let raspberry = self
            .board_model
            .as_deref()
            .is_some_and(|m| m.contains("Raspberry Pi"));
        self.driver_compiled && arm && (self.gpio_device || raspberry)
    }
}

/// Driver family chosen at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Hardware,
    Simulated,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hardware => "hardware",
            Self::Simulated => "simulated",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the configured mode against the probe result.
///
/// `Hardware` on an unsupported platform is an error; `Auto` falls back to
/// the simulated backend.
pub fn resolve_backend(mode: HardwareMode, report: &PlatformReport) -> Result<Backend> {
    match mode {
        HardwareMode::Simulated => Ok(Backend::Simulated),
        HardwareMode::Auto if report.supports_gpio() => Ok(Backend::Hardware),
        HardwareMode::Auto => Ok(Backend::Simulated),
        HardwareMode::Hardware if report.supports_gpio() => Ok(Backend::Hardware),
        HardwareMode::Hardware if !report.driver_compiled => Err(SensorError::unavailable(
            "built without the `hardware` feature",
        )),
        HardwareMode::Hardware => Err(SensorError::unavailable(format!(
            "no GPIO on this platform (arch {})",
            report.arch
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(arch: &'static str, gpio: bool, compiled: bool) -> PlatformReport {
        PlatformReport {
            arch,
            gpio_device: gpio,
            board_model: None,
            driver_compiled: compiled,
        }
    }

    #[test]
    fn test_supports_gpio() {
        assert!(report("aarch64", true, true).supports_gpio());
        assert!(!report("x86_64", true, true).supports_gpio());
        assert!(!report("aarch64", false, true).supports_gpio());
        assert!(!report("aarch64", true, false).supports_gpio());

        let pi = PlatformReport {
            board_model: Some("Raspberry Pi 4 Model B Rev 1.4".into()),
            ..report("arm", false, true)
        };
        assert!(pi.supports_gpio());
    }

    #[test]
    fn test_resolve_backend() {
        let pi = report("aarch64", true, true);
        let laptop = report("x86_64", false, false);

        assert_eq!(resolve_backend(HardwareMode::Auto, &pi).unwrap(), Backend::Hardware);
        assert_eq!(resolve_backend(HardwareMode::Auto, &laptop).unwrap(), Backend::Simulated);
        assert_eq!(resolve_backend(HardwareMode::Simulated, &pi).unwrap(), Backend::Simulated);
        assert_eq!(resolve_backend(HardwareMode::Hardware, &pi).unwrap(), Backend::Hardware);
        assert!(matches!(
            resolve_backend(HardwareMode::Hardware, &laptop),
            Err(SensorError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_detect_in_reads_model() {
        let root = std::env::temp_dir().join(format!("probe-root-{}", std::process::id()));
        std::fs::create_dir_all(root.join("proc/device-tree")).unwrap();
        std::fs::write(root.join("proc/device-tree/model"), "Raspberry Pi 5\0").unwrap();

        let found = PlatformReport::detect_in(&root);
        assert_eq!(found.board_model.as_deref(), Some("Raspberry Pi 5"));
        assert!(!found.gpio_device);
        std::fs::remove_dir_all(&root).unwrap();
    }
}
