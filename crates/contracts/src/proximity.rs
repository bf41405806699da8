//! Proximity channels and warning derivation.
//!
//! Warning levels (distance_cm):
//!   <=10 cm  -> high
//!   <=20 cm  -> medium
//!   <=30 cm  -> low
//!   >30 cm   -> clear
//!   absent   -> absent

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound (inclusive) of the `high` band
pub const HIGH_WARNING_MAX_CM: f64 = 10.0;

/// Upper bound (inclusive) of the `medium` band
pub const MEDIUM_WARNING_MAX_CM: f64 = 20.0;

/// Upper bound (inclusive) of the `low` band
pub const LOW_WARNING_MAX_CM: f64 = 30.0;

/// Discrete proximity severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    Clear,
    Low,
    Medium,
    High,
}

impl WarningLevel {
    /// Map a measured distance to its band
    pub fn from_distance(distance_cm: f64) -> Self {
        if distance_cm <= HIGH_WARNING_MAX_CM {
            Self::High
        } else if distance_cm <= MEDIUM_WARNING_MAX_CM {
            Self::Medium
        } else if distance_cm <= LOW_WARNING_MAX_CM {
            Self::Low
        } else {
            Self::Clear
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the warning level for an optional distance.
///
/// Non-finite distances are treated as absent.
pub fn derive_warning(distance_cm: Option<f64>) -> Option<WarningLevel> {
    distance_cm
        .filter(|d| d.is_finite())
        .map(WarningLevel::from_distance)
}

/// One physical/simulated proximity-sensing point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximityChannel {
    RearLeft,
    RearRight,
}

impl ProximityChannel {
    /// All channels, in read order
    pub const ALL: [ProximityChannel; 2] = [ProximityChannel::RearLeft, ProximityChannel::RearRight];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RearLeft => "rear_left",
            Self::RearRight => "rear_right",
        }
    }
}

impl fmt::Display for ProximityChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distance + derived warning for one channel.
///
/// `warning_level` is only ever produced from `distance_cm`; there is no
/// constructor that sets one without the other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProximityState {
    distance_cm: Option<f64>,
    warning_level: Option<WarningLevel>,
}

impl ProximityState {
    /// Both fields absent
    pub const fn absent() -> Self {
        Self {
            distance_cm: None,
            warning_level: None,
        }
    }

    /// Build from a raw measurement
    pub fn measured(distance_cm: Option<f64>) -> Self {
        let distance_cm = distance_cm.filter(|d| d.is_finite());
        Self {
            distance_cm,
            warning_level: derive_warning(distance_cm),
        }
    }

    pub fn distance_cm(&self) -> Option<f64> {
        self.distance_cm
    }

    pub fn warning_level(&self) -> Option<WarningLevel> {
        self.warning_level
    }
}

/// Parking block of the snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParkingState {
    pub reverse_engaged: bool,
    pub motion_detected: bool,
    pub rear_left: ProximityState,
    pub rear_right: ProximityState,
}

impl ParkingState {
    /// Compose the parking block, gating every channel on reverse.
    ///
    /// When reverse is not engaged all channels are absent regardless of the
    /// raw distances passed in.
    pub fn gated(
        reverse_engaged: bool,
        motion_detected: bool,
        rear_left_cm: Option<f64>,
        rear_right_cm: Option<f64>,
    ) -> Self {
        let gate = |distance: Option<f64>| {
            if reverse_engaged {
                ProximityState::measured(distance)
            } else {
                ProximityState::absent()
            }
        };

        Self {
            reverse_engaged,
            motion_detected,
            rear_left: gate(rear_left_cm),
            rear_right: gate(rear_right_cm),
        }
    }

    /// Reverse off, nothing detected
    pub const fn disengaged() -> Self {
        Self {
            reverse_engaged: false,
            motion_detected: false,
            rear_left: ProximityState::absent(),
            rear_right: ProximityState::absent(),
        }
    }

    pub fn channel(&self, channel: ProximityChannel) -> &ProximityState {
        match channel {
            ProximityChannel::RearLeft => &self.rear_left,
            ProximityChannel::RearRight => &self.rear_right,
        }
    }
}
