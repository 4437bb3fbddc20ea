pub mod asset;
pub mod clock;
pub mod engine;
pub mod gain;
pub mod io;
pub mod loader;
pub mod mixer;
pub mod reporter;
pub mod scheduler;
pub mod session;
pub mod stream;

pub use asset::{AssetCache, DecodedAsset};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{LoadState, TransportEngine};
pub use io::{AudioDecoder, ByteSource, DefaultDecoder, FileSource};
pub use mixer::Mixer;
pub use reporter::{PlaybackInfo, PlaybackSnapshot, PositionReporter};
pub use stream::AudioOutput;

use crate::library::Settings;

/// Opaque, stable identifier of a sound on the board.
pub type SoundId = String;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: u32,
    /// Seconds the gain takes to reach silence on stop
    pub fade_out: f64,
    /// Seconds for a live volume change
    pub volume_ramp: f64,
    /// Seconds from silence to the sound's volume on start; 0 starts at full volume
    pub fade_in: f64,
    /// Capacity of the engine → UI event channel
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            fade_out: 0.1,
            volume_ramp: 0.05,
            fade_in: 0.0,
            event_capacity: 1024,
        }
    }
}

impl EngineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            fade_out: settings.fade_out_duration.max(0.0),
            fade_in: settings.fade_in_duration.max(0.0),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    SoundLoaded { id: SoundId, duration: f64 },
    LoadFailed { id: SoundId, reason: String },
    Started(SoundId),
    Stopped(SoundId),
    /// A one-shot reached its end
    Finished(SoundId),
    VolumeChanged(SoundId, f32),
    Seeked { id: SoundId, time: f64 },
    Removed(SoundId),
    Positions(PlaybackSnapshot),
}
