//! Media player sub-state
//!
//! Mutated by media commands, read (and advanced) once per snapshot.

use contracts::MediaStatus;
use sensors::SimRng;
use tracing::info;

/// Player state behind the media commands
#[derive(Debug, Clone)]
pub struct MediaPlayer {
    status: MediaStatus,
    rng: SimRng,
}

impl Default for MediaPlayer {
    fn default() -> Self {
        Self::new(SimRng::new(None))
    }
}

impl MediaPlayer {
    /// Track changes draw from `rng`
    pub fn new(rng: SimRng) -> Self {
        Self {
            status: MediaStatus::default(),
            rng,
        }
    }

    pub fn play(&mut self) {
        info!("media: play");
        self.status.is_playing = true;
    }

    pub fn pause(&mut self) {
        info!("media: pause");
        self.status.is_playing = false;
    }

    pub fn next_track(&mut self) {
        info!("media: next");
        self.change_track();
    }

    pub fn previous_track(&mut self) {
        info!("media: previous");
        self.change_track();
    }

    fn change_track(&mut self) {
        let number = self.rng.int(1..=100);
        self.status.track_title = format!("Track {number}");
        self.status.position = 0;
    }

    /// Volume in [0, 1]; the caller validates the range.
    pub fn set_volume(&mut self, volume: f64) -> f64 {
        info!(volume, "media: set volume");
        self.status.volume = volume.clamp(0.0, 1.0);
        self.status.volume
    }

    /// Mark a paired device
    pub fn connect_device(&mut self, device_name: impl Into<String>) {
        self.status.connected = true;
        self.status.device_name = device_name.into();
    }

    pub fn is_connected(&self) -> bool {
        self.status.connected
    }

    /// Current status without advancing playback
    pub fn peek(&self) -> &MediaStatus {
        &self.status
    }

    /// Advance one second while playing and return the status
    pub fn tick(&mut self) -> MediaStatus {
        if self.status.is_playing {
            self.status.position = (self.status.position + 1).min(self.status.duration);
        }
        self.status.clone()
    }
}
