//! Process-wide mutable state
//!
//! One container, created at startup and handed to both the command handler
//! and the broadcast loop. Each part has its own lock; no lock is held while
//! another is taken.

use contracts::{
    BatteryCells, LinkStatus, MediaStatus, ServerBlueprint, SettingUpdate, TirePressure,
    VehicleSettings, VehicleStaticConfig,
};
use parking_lot::{Mutex, RwLock};
use sensors::SimRng;
use serde_json::Value;
use tracing::debug;

use crate::media::MediaPlayer;

/// Settings, media and cloud-link flags shared across tasks
#[derive(Debug, Default)]
pub struct SharedState {
    settings: RwLock<VehicleSettings>,
    media: Mutex<MediaPlayer>,
    cloud_links: RwLock<Vec<LinkStatus>>,
    vehicle: VehicleStaticConfig,
}

impl SharedState {
    pub fn new(settings: VehicleSettings, vehicle: VehicleStaticConfig) -> Self {
        Self::with_player(settings, vehicle, MediaPlayer::default())
    }

    /// Media track changes follow the simulation seed when one is set.
    pub fn from_blueprint(blueprint: &ServerBlueprint) -> Self {
        let player = MediaPlayer::new(SimRng::new(blueprint.simulation.seed));
        Self::with_player(blueprint.settings, blueprint.vehicle, player)
    }

    fn with_player(
        settings: VehicleSettings,
        vehicle: VehicleStaticConfig,
        player: MediaPlayer,
    ) -> Self {
        Self {
            settings: RwLock::new(settings),
            media: Mutex::new(player),
            cloud_links: RwLock::new(Vec::new()),
            vehicle,
        }
    }

    /// Copy of the current settings
    pub fn settings(&self) -> VehicleSettings {
        *self.settings.read()
    }

    /// Last write wins; returns the stored value.
    pub fn apply_setting(&self, update: SettingUpdate) -> Value {
        let value = self.settings.write().apply(update);
        debug!(?update, "setting applied");
        value
    }

    /// Run `f` with the media player locked
    pub fn with_media<T>(&self, f: impl FnOnce(&mut MediaPlayer) -> T) -> T {
        f(&mut self.media.lock())
    }

    /// Advance playback one step and return the status
    pub fn media_tick(&self) -> MediaStatus {
        self.media.lock().tick()
    }

    pub fn bluetooth_connected(&self) -> bool {
        self.media.lock().is_connected()
    }

    /// Track a cloud sink's connected flag
    pub fn register_cloud_link(&self, status: LinkStatus) {
        self.cloud_links.write().push(status);
    }

    /// Any registered cloud sink is connected
    pub fn cloud_connected(&self) -> bool {
        self.cloud_links.read().iter().any(LinkStatus::is_connected)
    }

    pub fn tire_pressure(&self) -> TirePressure {
        self.vehicle.tire_pressure
    }

    pub fn battery_cells(&self) -> BatteryCells {
        self.vehicle.battery_cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::DriveMode;

    #[test]
    fn test_apply_setting_last_write_wins() {
        let state = SharedState::from_blueprint(&ServerBlueprint::default());
        assert_eq!(state.settings().brightness, 60);

        assert_eq!(state.apply_setting(SettingUpdate::Brightness(75)), Value::from(75));
        assert_eq!(state.apply_setting(SettingUpdate::Brightness(40)), Value::from(40));
        assert_eq!(
            state.apply_setting(SettingUpdate::DriveMode(DriveMode::Sport)),
            Value::from("sport")
        );

        let settings = state.settings();
        assert_eq!(settings.brightness, 40);
        assert_eq!(settings.drive_mode, DriveMode::Sport);
    }

    #[test]
    fn test_cloud_connected_is_any() {
        let state = SharedState::default();
        assert!(!state.cloud_connected());

        let a = LinkStatus::new(false);
        let b = LinkStatus::new(false);
        state.register_cloud_link(a.clone());
        state.register_cloud_link(b.clone());
        assert!(!state.cloud_connected());

        b.set(true);
        assert!(state.cloud_connected());
    }

    #[test]
    fn test_media_through_state() {
        let state = SharedState::default();
        state.with_media(|m| m.connect_device("Mock Phone"));
        assert!(state.bluetooth_connected());

        state.with_media(MediaPlayer::play);
        assert_eq!(state.media_tick().position, 1);
    }

    #[test]
    fn test_seeded_blueprint_repeats_track_titles() {
        let mut blueprint = ServerBlueprint::default();
        blueprint.simulation.seed = Some(7);
        let next_titles = || {
            let state = SharedState::from_blueprint(&blueprint);
            (0..3)
                .map(|_| {
                    state.with_media(|m| {
                        m.next_track();
                        m.peek().track_title.clone()
                    })
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(next_titles(), next_titles());
    }

    #[test]
    fn test_static_vehicle_data() {
        let state = SharedState::from_blueprint(&ServerBlueprint::default());
        assert_eq!(state.tire_pressure().front_left, 35.2);
        assert_eq!(state.battery_cells().block_b, 29.1);
    }
}
