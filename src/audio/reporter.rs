use std::collections::HashMap;

use super::SoundId;
use super::session::SessionRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackInfo {
    pub current_time: f64,
    pub duration: f64,
}

/// Sound id → position, as last published.
pub type PlaybackSnapshot = HashMap<SoundId, PlaybackInfo>;

/// Per-frame projection of the session registry into positions.
///
/// Runs only while sessions exist: a frame over an empty registry puts the
/// reporter to sleep, and `wake` arms it again when playback starts. Frames
/// never touch playback state.
#[derive(Debug, Default)]
pub struct PositionReporter {
    running: bool,
    snapshot: PlaybackSnapshot,
}

impl PositionReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wake(&mut self) {
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Recompute positions for every session at `now`. Returns the updated
    /// snapshot, or `None` once there is nothing left to report.
    pub fn frame(&mut self, now: f64, sessions: &SessionRegistry) -> Option<&PlaybackSnapshot> {
        if !self.running {
            return None;
        }
        if sessions.is_empty() {
            self.running = false;
            return None;
        }

        for (id, session) in sessions.iter() {
            self.snapshot.insert(
                id.clone(),
                PlaybackInfo {
                    current_time: session.offset(now),
                    duration: session.duration,
                },
            );
        }

        Some(&self.snapshot)
    }

    pub fn set(&mut self, id: &str, current_time: f64, duration: f64) {
        self.snapshot.insert(
            id.to_string(),
            PlaybackInfo {
                current_time,
                duration,
            },
        );
    }

    pub fn reset(&mut self, id: &str, duration: f64) {
        self.set(id, 0.0, duration);
    }

    pub fn forget(&mut self, id: &str) {
        self.snapshot.remove(id);
    }

    pub fn clear(&mut self) {
        self.snapshot.clear();
        self.running = false;
    }

    pub fn get(&self, id: &str) -> Option<PlaybackInfo> {
        self.snapshot.get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::session::{PlaybackSession, SignalChain};

    fn registry_with(id: &str, start: f64, duration: f64, looping: bool) -> SessionRegistry {
        let mut registry = SessionRegistry::new();
        registry.insert(
            id.to_string(),
            PlaybackSession {
                chain: SignalChain::detached_for_tests(),
                start_reference: start,
                looping,
                duration,
                token: 1,
            },
        );
        registry
    }

    #[test]
    fn test_sleeps_when_no_sessions() {
        let mut reporter = PositionReporter::new();
        reporter.wake();
        assert!(reporter.frame(1.0, &SessionRegistry::new()).is_none());
        assert!(!reporter.is_running());
    }

    #[test]
    fn test_does_not_run_until_woken() {
        let mut reporter = PositionReporter::new();
        let registry = registry_with("a", 0.0, 3.0, false);
        assert!(reporter.frame(1.0, &registry).is_none());

        reporter.wake();
        let snapshot = reporter.frame(1.0, &registry).unwrap();
        assert!((snapshot["a"].current_time - 1.0).abs() < 1e-9);
        assert_eq!(snapshot["a"].duration, 3.0);
    }

    #[test]
    fn test_looping_position_wraps() {
        let mut reporter = PositionReporter::new();
        reporter.wake();
        let registry = registry_with("b", 0.2, 1.5, true);
        reporter.frame(5.2, &registry);
        assert!((reporter.get("b").unwrap().current_time - 5.0 % 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_reset_keeps_duration() {
        let mut reporter = PositionReporter::new();
        reporter.set("a", 2.0, 3.0);
        reporter.reset("a", 3.0);
        assert_eq!(
            reporter.get("a"),
            Some(PlaybackInfo {
                current_time: 0.0,
                duration: 3.0
            })
        );
    }
}
