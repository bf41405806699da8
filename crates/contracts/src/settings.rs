//! SharedSettings - user-adjustable vehicle/infotainment configuration.
//!
//! Last-write-wins, no versioning. Every aggregation cycle reads it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// Regenerative braking level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegenLevel {
    Low,
    #[default]
    Standard,
    High,
}

/// Powertrain drive mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    #[default]
    Eco,
    Normal,
    Sport,
}

/// Digital twin render mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TwinMode {
    #[serde(rename = "2d")]
    TwoD,
    #[default]
    #[serde(rename = "3d")]
    ThreeD,
}

/// Mutable key -> value settings block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct VehicleSettings {
    /// Charge limit (%)
    #[validate(range(min = 50, max = 100))]
    pub charge_limit: u8,

    pub regen_level: RegenLevel,

    pub drive_mode: DriveMode,

    /// Display brightness (%)
    #[validate(range(max = 100))]
    pub brightness: u8,

    pub light_theme: bool,

    pub predictions_on: bool,

    pub twin_mode: TwinMode,
}

impl Default for VehicleSettings {
    fn default() -> Self {
        Self {
            charge_limit: 80,
            regen_level: RegenLevel::Standard,
            drive_mode: DriveMode::Eco,
            brightness: 60,
            light_theme: false,
            predictions_on: true,
            twin_mode: TwinMode::ThreeD,
        }
    }
}

/// A single-key settings mutation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingUpdate {
    ChargeLimit(u8),
    RegenLevel(RegenLevel),
    DriveMode(DriveMode),
    Brightness(u8),
    LightTheme(bool),
    Predictions(bool),
    TwinMode(TwinMode),
}

impl VehicleSettings {
    /// Apply one update and return the stored value for echoing back.
    pub fn apply(&mut self, update: SettingUpdate) -> Value {
        match update {
            SettingUpdate::ChargeLimit(v) => {
                self.charge_limit = v;
                Value::from(v)
            }
            SettingUpdate::RegenLevel(v) => {
                self.regen_level = v;
                to_value(v)
            }
            SettingUpdate::DriveMode(v) => {
                self.drive_mode = v;
                to_value(v)
            }
            SettingUpdate::Brightness(v) => {
                self.brightness = v;
                Value::from(v)
            }
            SettingUpdate::LightTheme(v) => {
                self.light_theme = v;
                Value::from(v)
            }
            SettingUpdate::Predictions(v) => {
                self.predictions_on = v;
                Value::from(v)
            }
            SettingUpdate::TwinMode(v) => {
                self.twin_mode = v;
                to_value(v)
            }
        }
    }
}

// Unit enums always serialize to a string.
fn to_value<T: Serialize>(v: T) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_factory_settings() {
        let json = serde_json::to_value(VehicleSettings::default()).unwrap();
        assert_eq!(json["charge_limit"], 80);
        assert_eq!(json["regen_level"], "standard");
        assert_eq!(json["drive_mode"], "eco");
        assert_eq!(json["brightness"], 60);
        assert_eq!(json["light_theme"], false);
        assert_eq!(json["predictions_on"], true);
        assert_eq!(json["twin_mode"], "3d");
    }

    #[test]
    fn test_apply_returns_stored_value() {
        let mut settings = VehicleSettings::default();
        assert_eq!(settings.apply(SettingUpdate::Brightness(75)), Value::from(75));
        assert_eq!(settings.brightness, 75);

        let echoed = settings.apply(SettingUpdate::TwinMode(TwinMode::TwoD));
        assert_eq!(echoed, Value::from("2d"));
        assert_eq!(settings.twin_mode, TwinMode::TwoD);
    }

    #[test]
    fn test_validation_ranges() {
        let mut settings = VehicleSettings::default();
        assert!(settings.validate().is_ok());

        settings.charge_limit = 40;
        assert!(settings.validate().is_err());

        settings.charge_limit = 90;
        settings.brightness = 101;
        assert!(settings.validate().is_err());
    }
}
