use std::collections::HashMap;

use super::SoundId;
use super::mixer::{GainId, SourceId};
use crate::library::Sound;

/// Source + gain pair wired into the mixer for one playing sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalChain {
    pub source: SourceId,
    pub gain: GainId,
}

#[cfg(test)]
impl SignalChain {
    pub(crate) fn detached_for_tests() -> Self {
        use std::sync::Arc;

        let clock = Arc::new(super::clock::ManualClock::new());
        let mut mixer = super::mixer::Mixer::new(100, clock);
        let gain = mixer.create_gain(1.0);
        let asset = Arc::new(super::DecodedAsset::from_interleaved(vec![0.0], 1, 100));
        let source = mixer.start_source(asset, false, gain, 0.0);
        Self { source, gain }
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub chain: SignalChain,
    /// Engine time such that `now - start_reference` is the elapsed offset
    pub start_reference: f64,
    pub looping: bool,
    pub duration: f64,
    /// Identifies this session's auto-stop
    pub token: u64,
}

impl PlaybackSession {
    pub fn elapsed(&self, now: f64) -> f64 {
        (now - self.start_reference).max(0.0)
    }

    /// Offset within the buffer at `now`.
    pub fn offset(&self, now: f64) -> f64 {
        let elapsed = self.elapsed(now);
        if self.duration <= 0.0 {
            0.0
        } else if self.looping {
            elapsed.rem_euclid(self.duration)
        } else {
            elapsed.min(self.duration)
        }
    }
}

/// At most one session per sound id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SoundId, PlaybackSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session that was replaced, which the caller must tear down.
    pub fn insert(&mut self, id: SoundId, session: PlaybackSession) -> Option<PlaybackSession> {
        self.sessions.insert(id, session)
    }

    pub fn get(&self, id: &str) -> Option<&PlaybackSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut PlaybackSession> {
        self.sessions.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<PlaybackSession> {
        self.sessions.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &SoundId> {
        self.sessions.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SoundId, &PlaybackSession)> {
        self.sessions.iter()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (SoundId, PlaybackSession)> + '_ {
        self.sessions.drain()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Play requests waiting for their asset. Each intent is consumed once:
/// by load completion, by a stop, or by removal of the sound.
#[derive(Debug, Default)]
pub struct PendingPlays {
    requests: HashMap<SoundId, Sound>,
}

impl PendingPlays {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records (or refreshes) the intent with the latest sound settings.
    pub fn request(&mut self, sound: Sound) {
        self.requests.insert(sound.id.clone(), sound);
    }

    pub fn take(&mut self, id: &str) -> Option<Sound> {
        self.requests.remove(id)
    }

    pub fn cancel(&mut self, id: &str) -> bool {
        self.requests.remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.requests.contains_key(id)
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
