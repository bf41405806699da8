//! Client -> server command contract.
//!
//! Every inbound frame is `{action: string, ...action-specific fields}`.
//! The action name is checked against [`ALLOWED_ACTIONS`] before any field
//! is interpreted.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::{DriveMode, PositionUpdate, RegenLevel, SettingUpdate, TwinMode};

/// Exhaustive action allow-list
pub const ALLOWED_ACTIONS: &[&str] = &[
    "play_music",
    "pause_music",
    "next_track",
    "previous_track",
    "set_volume",
    "set_charge_limit",
    "set_regen_level",
    "set_drive_mode",
    "set_brightness",
    "set_theme",
    "toggle_predictions",
    "set_twin_mode",
    "connect_bluetooth",
    "update_gps",
];

/// Validated client command
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    // Media controls
    PlayMusic,
    PauseMusic,
    NextTrack,
    PreviousTrack,
    SetVolume {
        volume: f64,
    },

    // Vehicle settings
    SetChargeLimit {
        value: u8,
    },
    SetRegenLevel {
        value: RegenLevel,
    },
    SetDriveMode {
        value: DriveMode,
    },

    // Infotainment settings
    SetBrightness {
        value: u8,
    },
    SetTheme {
        value: bool,
    },

    // Digital twin settings
    TogglePredictions {
        value: bool,
    },
    SetTwinMode {
        value: TwinMode,
    },

    ConnectBluetooth {
        #[serde(default)]
        device_address: String,
    },

    UpdateGps {
        #[serde(alias = "lat")]
        latitude: f64,
        #[serde(alias = "lon", alias = "lng")]
        longitude: f64,
        #[serde(default)]
        altitude: Option<f64>,
        #[serde(default)]
        heading: Option<f64>,
    },
}

/// Why an inbound frame was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandRejection {
    /// Payload is not a JSON object
    #[error("Invalid JSON format")]
    MalformedJson,

    /// Missing action or not on the allow-list
    #[error("Invalid action: {}", .0.as_deref().unwrap_or("null"))]
    UnknownAction(Option<String>),

    /// Allowed action, unusable fields
    #[error("Invalid value for {action}: {reason}")]
    InvalidValue { action: String, reason: String },
}

impl CommandRejection {
    fn invalid_value(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            action: action.into(),
            reason: reason.into(),
        }
    }
}

/// Check whether an action name is on the allow-list
pub fn is_allowed_action(action: &str) -> bool {
    ALLOWED_ACTIONS.contains(&action)
}

/// Parse and validate one inbound text frame.
///
/// The action name is checked before the payload is deserialized, so an
/// unknown action is reported as such even when its fields are garbage.
pub fn parse_command(raw: &str) -> Result<ClientCommand, CommandRejection> {
    let value: Value = serde_json::from_str(raw).map_err(|_| CommandRejection::MalformedJson)?;
    let Value::Object(ref object) = value else {
        return Err(CommandRejection::MalformedJson);
    };

    let action = match object.get("action").and_then(Value::as_str) {
        Some(action) if is_allowed_action(action) => action.to_string(),
        Some(action) => return Err(CommandRejection::UnknownAction(Some(action.to_string()))),
        None => return Err(CommandRejection::UnknownAction(None)),
    };

    let command: ClientCommand = serde_json::from_value(value)
        .map_err(|e| CommandRejection::invalid_value(&action, e.to_string()))?;
    command.validate()?;
    Ok(command)
}

impl ClientCommand {
    /// Wire name of the action
    pub fn action(&self) -> &'static str {
        match self {
            Self::PlayMusic => "play_music",
            Self::PauseMusic => "pause_music",
            Self::NextTrack => "next_track",
            Self::PreviousTrack => "previous_track",
            Self::SetVolume { .. } => "set_volume",
            Self::SetChargeLimit { .. } => "set_charge_limit",
            Self::SetRegenLevel { .. } => "set_regen_level",
            Self::SetDriveMode { .. } => "set_drive_mode",
            Self::SetBrightness { .. } => "set_brightness",
            Self::SetTheme { .. } => "set_theme",
            Self::TogglePredictions { .. } => "toggle_predictions",
            Self::SetTwinMode { .. } => "set_twin_mode",
            Self::ConnectBluetooth { .. } => "connect_bluetooth",
            Self::UpdateGps { .. } => "update_gps",
        }
    }

    /// Range checks beyond what the types enforce
    pub fn validate(&self) -> Result<(), CommandRejection> {
        let fail = |reason: String| Err(CommandRejection::invalid_value(self.action(), reason));

        match *self {
            Self::SetVolume { volume } if !(0.0..=1.0).contains(&volume) => {
                fail(format!("volume must be within 0.0..=1.0, got {volume}"))
            }
            Self::SetChargeLimit { value } if !(50..=100).contains(&value) => {
                fail(format!("charge limit must be within 50..=100, got {value}"))
            }
            Self::SetBrightness { value } if value > 100 => {
                fail(format!("brightness must be within 0..=100, got {value}"))
            }
            Self::UpdateGps {
                latitude,
                longitude,
                altitude,
                heading,
            } => {
                if !(-90.0..=90.0).contains(&latitude) {
                    return fail(format!("latitude out of range: {latitude}"));
                }
                if !(-180.0..=180.0).contains(&longitude) {
                    return fail(format!("longitude out of range: {longitude}"));
                }
                if altitude.is_some_and(|a| !a.is_finite()) || heading.is_some_and(|h| !h.is_finite()) {
                    return fail("altitude/heading must be finite".to_string());
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// What the command does, with its payload
    pub fn into_request(self) -> CommandRequest {
        match self {
            Self::PlayMusic => CommandRequest::Media(MediaCommand::Play),
            Self::PauseMusic => CommandRequest::Media(MediaCommand::Pause),
            Self::NextTrack => CommandRequest::Media(MediaCommand::Next),
            Self::PreviousTrack => CommandRequest::Media(MediaCommand::Previous),
            Self::SetVolume { volume } => CommandRequest::Media(MediaCommand::SetVolume(volume)),
            Self::SetChargeLimit { value } => CommandRequest::Setting(SettingUpdate::ChargeLimit(value)),
            Self::SetRegenLevel { value } => CommandRequest::Setting(SettingUpdate::RegenLevel(value)),
            Self::SetDriveMode { value } => CommandRequest::Setting(SettingUpdate::DriveMode(value)),
            Self::SetBrightness { value } => CommandRequest::Setting(SettingUpdate::Brightness(value)),
            Self::SetTheme { value } => CommandRequest::Setting(SettingUpdate::LightTheme(value)),
            Self::TogglePredictions { value } => {
                CommandRequest::Setting(SettingUpdate::Predictions(value))
            }
            Self::SetTwinMode { value } => CommandRequest::Setting(SettingUpdate::TwinMode(value)),
            Self::ConnectBluetooth { device_address } => {
                CommandRequest::ConnectBluetooth { device_address }
            }
            Self::UpdateGps {
                latitude,
                longitude,
                altitude,
                heading,
            } => CommandRequest::Position(PositionUpdate {
                latitude,
                longitude,
                altitude_m: altitude,
                heading_deg: heading,
            }),
        }
    }
}

/// Media player operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaCommand {
    Play,
    Pause,
    Next,
    Previous,
    SetVolume(f64),
}

/// A validated command grouped by the state it touches
#[derive(Debug, Clone, PartialEq)]
pub enum CommandRequest {
    Media(MediaCommand),
    Setting(SettingUpdate),
    Position(PositionUpdate),
    ConnectBluetooth { device_address: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_setter() {
        let cmd = parse_command(r#"{"action":"set_brightness","value":75}"#).unwrap();
        assert_eq!(cmd, ClientCommand::SetBrightness { value: 75 });
        assert_eq!(cmd.action(), "set_brightness");
        assert_eq!(
            cmd.into_request(),
            CommandRequest::Setting(SettingUpdate::Brightness(75))
        );
    }

    #[test]
    fn test_parse_media_ignores_extra_fields() {
        let cmd = parse_command(r#"{"action":"play_music","source":"dashboard"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::PlayMusic);
        assert_eq!(cmd.into_request(), CommandRequest::Media(MediaCommand::Play));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let err = parse_command(r#"{"action":"drive_warp"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Invalid action: drive_warp");

        let err = parse_command(r#"{"value":1}"#).unwrap_err();
        assert_eq!(err.to_string(), "Invalid action: null");

        let err = parse_command(r#"{"action":42}"#).unwrap_err();
        assert_eq!(err, CommandRejection::UnknownAction(None));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert_eq!(parse_command("{not json").unwrap_err(), CommandRejection::MalformedJson);
        assert_eq!(parse_command("[1,2]").unwrap_err(), CommandRejection::MalformedJson);
        assert_eq!(
            parse_command("{not json").unwrap_err().to_string(),
            "Invalid JSON format"
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = parse_command(r#"{"action":"set_brightness","value":150}"#).unwrap_err();
        assert!(matches!(err, CommandRejection::InvalidValue { ref action, .. } if action == "set_brightness"));

        let err = parse_command(r#"{"action":"set_charge_limit","value":20}"#).unwrap_err();
        assert!(err.to_string().starts_with("Invalid value for set_charge_limit"));

        let err = parse_command(r#"{"action":"set_drive_mode","value":"ludicrous"}"#).unwrap_err();
        assert!(matches!(err, CommandRejection::InvalidValue { .. }));

        let err = parse_command(r#"{"action":"set_brightness"}"#).unwrap_err();
        assert!(matches!(err, CommandRejection::InvalidValue { .. }));

        let err = parse_command(r#"{"action":"set_volume","volume":1.5}"#).unwrap_err();
        assert!(matches!(err, CommandRejection::InvalidValue { .. }));
    }

    #[test]
    fn test_update_gps_aliases_and_ranges() {
        let cmd = parse_command(r#"{"action":"update_gps","lat":28.5,"lon":77.1}"#).unwrap();
        let CommandRequest::Position(update) = cmd.into_request() else {
            panic!("update_gps must map to a position hand-off");
        };
        assert_eq!(update.latitude, 28.5);
        assert_eq!(update.longitude, 77.1);
        assert_eq!(update.altitude_m, None);

        let err = parse_command(r#"{"action":"update_gps","latitude":95.0,"longitude":0.0}"#)
            .unwrap_err();
        assert!(err.to_string().contains("latitude out of range"));
    }

    #[test]
    fn test_allow_list_covers_every_variant() {
        let samples = [
            r#"{"action":"play_music"}"#,
            r#"{"action":"pause_music"}"#,
            r#"{"action":"next_track"}"#,
            r#"{"action":"previous_track"}"#,
            r#"{"action":"set_volume","volume":0.3}"#,
            r#"{"action":"set_charge_limit","value":90}"#,
            r#"{"action":"set_regen_level","value":"high"}"#,
            r#"{"action":"set_drive_mode","value":"sport"}"#,
            r#"{"action":"set_brightness","value":10}"#,
            r#"{"action":"set_theme","value":true}"#,
            r#"{"action":"toggle_predictions","value":false}"#,
            r#"{"action":"set_twin_mode","value":"2d"}"#,
            r#"{"action":"connect_bluetooth","device_address":"AA:BB"}"#,
            r#"{"action":"update_gps","latitude":1.0,"longitude":2.0}"#,
        ];
        assert_eq!(samples.len(), ALLOWED_ACTIONS.len());
        for (raw, name) in samples.iter().zip(ALLOWED_ACTIONS) {
            let cmd = parse_command(raw).unwrap_or_else(|e| panic!("{raw}: {e}"));
            assert_eq!(cmd.action(), *name);
        }
    }

    #[test]
    fn test_requests_carry_payload() {
        let volume = parse_command(r#"{"action":"set_volume","volume":0.3}"#).unwrap();
        assert_eq!(volume.into_request(), CommandRequest::Media(MediaCommand::SetVolume(0.3)));

        let theme = parse_command(r#"{"action":"set_theme","value":true}"#).unwrap();
        assert_eq!(
            theme.into_request(),
            CommandRequest::Setting(SettingUpdate::LightTheme(true))
        );

        let pair = parse_command(r#"{"action":"connect_bluetooth","device_address":"AA:BB"}"#).unwrap();
        assert_eq!(
            pair.into_request(),
            CommandRequest::ConnectBluetooth {
                device_address: "AA:BB".to_string()
            }
        );
    }
}
