// src/audio/engine.rs
// Transport engine: load / play / stop / volume / seek for every sound on the board

use crossbeam::channel::{self, Receiver, Sender};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::asset::AssetCache;
use super::clock::Clock;
use super::io::{AudioDecoder, ByteSource, DefaultDecoder, FileSource};
use super::loader::{LoadOutcome, Loader};
use super::mixer::Mixer;
use super::reporter::{PlaybackInfo, PositionReporter};
use super::scheduler::{ScheduledTask, Scheduler};
use super::session::{PendingPlays, PlaybackSession, SessionRegistry, SignalChain};
use super::{EngineConfig, EngineEvent, SoundId};
use crate::library::Sound;

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready { duration: f64 },
    /// Last load attempt failed; a new play or load retries
    Failed(String),
}

fn lock(mixer: &Mutex<Mixer>) -> MutexGuard<'_, Mixer> {
    mixer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the decoded-asset cache, the session registry, pending play
/// intents, scheduled tasks and the position reporter. Every mutation goes
/// through the methods below on one thread; the audio callback only sees the
/// shared [`Mixer`].
///
/// No operation returns an error: unknown ids are no-ops and failed loads
/// are logged, recorded in [`LoadState::Failed`] and published as events.
pub struct TransportEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    mixer: Arc<Mutex<Mixer>>,
    cache: AssetCache,
    sessions: SessionRegistry,
    pending: PendingPlays,
    loader: Loader,
    scheduler: Scheduler,
    reporter: PositionReporter,
    failures: HashMap<SoundId, String>,
    next_token: u64,
    event_sender: Sender<EngineEvent>,
    event_receiver: Receiver<EngineEvent>,
    disposed: bool,
}

impl TransportEngine {
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        mixer: Arc<Mutex<Mixer>>,
        byte_source: Arc<dyn ByteSource>,
        decoder: Arc<dyn AudioDecoder>,
    ) -> Self {
        let (event_sender, event_receiver) = channel::bounded(config.event_capacity.max(1));
        let loader = Loader::new(byte_source, decoder, config.sample_rate);

        info!(
            sample_rate = config.sample_rate,
            fade_out = config.fade_out,
            "transport engine created"
        );

        Self {
            config,
            clock,
            mixer,
            cache: AssetCache::new(),
            sessions: SessionRegistry::new(),
            pending: PendingPlays::new(),
            loader,
            scheduler: Scheduler::new(),
            reporter: PositionReporter::new(),
            failures: HashMap::new(),
            next_token: 0,
            event_sender,
            event_receiver,
            disposed: false,
        }
    }

    /// Engine reading local files, decoded with the default decoder.
    pub fn with_files(config: EngineConfig, clock: Arc<dyn Clock>, mixer: Arc<Mutex<Mixer>>) -> Self {
        Self::new(
            config,
            clock,
            mixer,
            Arc::new(FileSource),
            Arc::new(DefaultDecoder),
        )
    }

    // ---------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------

    /// Fetch and decode in the background. The result is applied on a later
    /// `tick` (or `settle_loads`); loading an id that is already cached
    /// replaces the asset.
    pub fn load(&mut self, sound: &Sound) {
        if self.disposed {
            return;
        }

        if let Err(e) = self.loader.spawn(sound) {
            warn!(id = %sound.id, error = %e, "could not start load");
            self.pending.cancel(&sound.id);
            self.failures.insert(sound.id.clone(), e.to_string());
            self.send_event(EngineEvent::LoadFailed {
                id: sound.id.clone(),
                reason: e.to_string(),
            });
            return;
        }

        debug!(id = %sound.id, source = %sound.source, "load started");
    }

    /// Start `sound`, or stop it if it is already playing.
    ///
    /// A sound without a decoded asset is queued: the load is started and
    /// playback begins when it completes, unless a stop arrives first.
    pub fn play(&mut self, sound: &Sound) {
        if self.disposed {
            return;
        }

        if !self.cache.contains(&sound.id) {
            debug!(id = %sound.id, "play deferred until loaded");
            self.pending.request(sound.clone());
            self.load(sound);
            return;
        }

        if self.sessions.contains(&sound.id) {
            self.stop(&sound.id);
            return;
        }

        self.start_session(sound);
    }

    fn start_session(&mut self, sound: &Sound) {
        let Some(asset) = self.cache.get(&sound.id) else {
            return;
        };

        let now = self.clock.now();
        let volume = sound.volume.clamp(0.0, 1.0);
        let duration = asset.duration;

        let chain = {
            let mut mixer = lock(&self.mixer);
            let gain = if self.config.fade_in > 0.0 {
                let gain = mixer.create_gain(0.0);
                mixer.ramp_gain(gain, volume, self.config.fade_in);
                gain
            } else {
                mixer.create_gain(volume)
            };
            let source = mixer.start_source(asset, sound.looping, gain, 0.0);
            SignalChain { source, gain }
        };

        let token = self.next_token();
        self.scheduler.cancel(&sound.id);
        if !sound.looping {
            self.scheduler.schedule(
                now + duration,
                ScheduledTask::AutoStop {
                    sound_id: sound.id.clone(),
                    token,
                },
            );
        }

        let session = PlaybackSession {
            chain,
            start_reference: now,
            looping: sound.looping,
            duration,
            token,
        };
        if let Some(previous) = self.sessions.insert(sound.id.clone(), session) {
            // Unreachable through `play`, which toggles instead
            self.release_now(previous.chain);
        }

        self.reporter.set(&sound.id, 0.0, duration);
        self.reporter.wake();

        info!(id = %sound.id, volume, looping = sound.looping, "playback started");
        self.send_event(EngineEvent::Started(sound.id.clone()));
    }

    /// Fade out and end playback. The UI state flips immediately; the
    /// source keeps sounding for the fade window and is released afterwards.
    /// Also cancels a deferred play that has not started yet.
    pub fn stop(&mut self, id: &str) {
        if self.pending.cancel(id) {
            debug!(id, "deferred play cancelled");
        }

        let Some(session) = self.sessions.remove(id) else {
            return;
        };
        self.scheduler.cancel(id);

        let now = self.clock.now();
        let fade = self.config.fade_out;
        lock(&self.mixer).ramp_gain(session.chain.gain, 0.0, fade);
        self.scheduler.schedule(
            now + fade,
            ScheduledTask::Release {
                chain: session.chain,
            },
        );

        self.reporter.reset(id, session.duration);

        info!(id, fade, "playback stopped");
        self.send_event(EngineEvent::Stopped(id.to_string()));
    }

    /// Stop everything and drop every deferred play.
    pub fn stop_all(&mut self) {
        self.pending.clear();
        let ids: Vec<SoundId> = self.sessions.ids().cloned().collect();
        for id in ids {
            self.stop(&id);
        }
    }

    /// Ramp a playing sound's gain to `volume`. Stored preferences are the
    /// caller's business.
    pub fn set_volume(&mut self, id: &str, volume: f32) {
        let Some(session) = self.sessions.get(id) else {
            return;
        };

        let volume = volume.clamp(0.0, 1.0);
        lock(&self.mixer).ramp_gain(session.chain.gain, volume, self.config.volume_ramp);

        debug!(id, volume, "volume ramp");
        self.send_event(EngineEvent::VolumeChanged(id.to_string(), volume));
    }

    /// Jump to `time` seconds. A playing sound restarts its source at the new
    /// offset on the same gain stage. A stopped sound only updates its
    /// reported position; the next play still starts from zero.
    pub fn seek(&mut self, id: &str, time: f64) {
        let Some(asset) = self.cache.get(id) else {
            return;
        };
        if !time.is_finite() {
            return;
        }

        let duration = asset.duration;
        let time = time.clamp(0.0, duration);
        let now = self.clock.now();
        let token = self.next_token();

        if let Some(session) = self.sessions.get_mut(id) {
            {
                let mut mixer = lock(&self.mixer);
                mixer.stop_source(session.chain.source);
                session.chain.source =
                    mixer.start_source(asset, session.looping, session.chain.gain, time);
            }
            session.start_reference = now - time;
            session.duration = duration;

            if !session.looping {
                session.token = token;
                self.scheduler.cancel(id);
                self.scheduler.schedule(
                    now + (duration - time),
                    ScheduledTask::AutoStop {
                        sound_id: id.to_string(),
                        token,
                    },
                );
            }
        }

        self.reporter.set(id, time, duration);

        debug!(id, time, "seek");
        self.send_event(EngineEvent::Seeked {
            id: id.to_string(),
            time,
        });
    }

    /// Forget a sound entirely: playback, deferred play, cached asset,
    /// failure status and any load still running for it.
    pub fn remove_sound(&mut self, id: &str) {
        self.stop(id);
        self.pending.cancel(id);
        self.scheduler.cancel(id);
        self.loader.forget(id);
        self.cache.remove(id);
        self.failures.remove(id);
        self.reporter.forget(id);

        info!(id, "sound removed");
        self.send_event(EngineEvent::Removed(id.to_string()));
    }

    pub fn set_fade_out(&mut self, seconds: f64) {
        self.config.fade_out = seconds.max(0.0);
    }

    pub fn set_fade_in(&mut self, seconds: f64) {
        self.config.fade_in = seconds.max(0.0);
    }

    // ---------------------------------------------------------------
    // Cooperative scheduling
    // ---------------------------------------------------------------

    /// One frame of engine work: apply finished loads, fire due tasks and
    /// publish positions. Returns whether another frame is wanted soon.
    pub fn tick(&mut self) -> bool {
        if self.disposed {
            return false;
        }

        for outcome in self.loader.try_completions() {
            self.apply_load(outcome);
        }

        self.run_due_tasks();

        let now = self.clock.now();
        if let Some(snapshot) = self.reporter.frame(now, &self.sessions).cloned() {
            self.send_event(EngineEvent::Positions(snapshot));
        }

        self.reporter.is_running() || !self.scheduler.is_idle() || self.loader.in_flight() > 0
    }

    /// Block until every load in flight has been applied or `timeout` ran out.
    /// Returns the number of loads applied.
    pub fn settle_loads(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut applied = 0;

        while self.loader.in_flight() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.loader.wait_completion(remaining) {
                Some(outcome) => {
                    self.apply_load(outcome);
                    applied += 1;
                }
                None => break,
            }
        }

        applied
    }

    fn apply_load(&mut self, outcome: LoadOutcome) {
        let LoadOutcome { sound_id, result } = outcome;

        match result {
            Ok(asset) => {
                let duration = asset.duration;
                self.cache.insert(sound_id.clone(), asset);
                self.failures.remove(&sound_id);
                if !self.sessions.contains(&sound_id) {
                    self.reporter.reset(&sound_id, duration);
                }

                info!(id = %sound_id, duration, "sound loaded");
                self.send_event(EngineEvent::SoundLoaded {
                    id: sound_id.clone(),
                    duration,
                });

                if let Some(sound) = self.pending.take(&sound_id) {
                    self.play(&sound);
                }
            }
            Err(e) => {
                warn!(id = %sound_id, error = %e, "failed to load sound");
                self.pending.cancel(&sound_id);
                self.failures.insert(sound_id.clone(), e.to_string());
                self.send_event(EngineEvent::LoadFailed {
                    id: sound_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn run_due_tasks(&mut self) {
        let now = self.clock.now();
        for task in self.scheduler.take_due(now) {
            match task {
                ScheduledTask::AutoStop { sound_id, token } => self.finish(&sound_id, token),
                ScheduledTask::Release { chain } => self.release_now(chain),
            }
        }
    }

    /// End of a one-shot. Ignored if the session it was scheduled for is gone.
    fn finish(&mut self, id: &str, token: u64) {
        match self.sessions.get(id) {
            Some(session) if session.token == token => {}
            _ => {
                debug!(id, "stale auto-stop ignored");
                return;
            }
        }
        let Some(session) = self.sessions.remove(id) else {
            return;
        };

        self.release_now(session.chain);
        self.reporter.reset(id, session.duration);

        info!(id, "playback finished");
        self.send_event(EngineEvent::Finished(id.to_string()));
    }

    fn release_now(&self, chain: SignalChain) {
        let mut mixer = lock(&self.mixer);
        // The source may already have ended by itself
        mixer.stop_source(chain.source);
        mixer.release_gain(chain.gain);
    }

    fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    fn send_event(&self, event: EngineEvent) {
        let _ = self.event_sender.try_send(event);
    }

    /// Tear down every session immediately and drop all engine state.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }

        {
            let mut mixer = lock(&self.mixer);
            for (_, session) in self.sessions.drain() {
                mixer.stop_source(session.chain.source);
                mixer.release_gain(session.chain.gain);
            }
            for task in self.scheduler.take_due(f64::INFINITY) {
                if let ScheduledTask::Release { chain } = task {
                    mixer.stop_source(chain.source);
                    mixer.release_gain(chain.gain);
                }
            }
        }

        self.scheduler.clear();
        self.pending.clear();
        self.loader.forget_all();
        self.cache.clear();
        self.failures.clear();
        self.reporter.clear();
        self.disposed = true;

        info!("transport engine disposed");
    }

    // ---------------------------------------------------------------
    // Observable state
    // ---------------------------------------------------------------

    pub fn playing_ids(&self) -> HashSet<SoundId> {
        self.sessions.ids().cloned().collect()
    }

    pub fn is_playing(&self, id: &str) -> bool {
        self.sessions.contains(id)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    pub fn position(&self, id: &str) -> Option<PlaybackInfo> {
        self.reporter.get(id)
    }

    pub fn load_state(&self, id: &str) -> LoadState {
        if let Some(duration) = self.cache.duration(id) {
            LoadState::Ready { duration }
        } else if self.loader.is_loading(id) {
            LoadState::Loading
        } else if let Some(reason) = self.failures.get(id) {
            LoadState::Failed(reason.clone())
        } else {
            LoadState::Unloaded
        }
    }

    /// Current gain of a playing sound, fades included.
    pub fn effective_volume(&self, id: &str) -> Option<f32> {
        let session = self.sessions.get(id)?;
        lock(&self.mixer).gain_value(session.chain.gain)
    }

    pub fn events(&self) -> Receiver<EngineEvent> {
        self.event_receiver.clone()
    }

    pub fn mixer(&self) -> Arc<Mutex<Mixer>> {
        Arc::clone(&self.mixer)
    }
}

impl Drop for TransportEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::clock::ManualClock;
    use crate::audio::io::encode_wav;
    use crate::error::{Result, SoundboardError};

    const RATE: u32 = 100;
    const SETTLE: Duration = Duration::from_secs(5);

    /// In-memory files; a gated locator blocks its fetch until the gate opens.
    #[derive(Default)]
    struct TestSource {
        files: HashMap<String, Vec<u8>>,
        gates: Mutex<HashMap<String, Receiver<()>>>,
    }

    impl TestSource {
        fn clip(mut self, locator: &str, seconds: f64) -> Self {
            let frames = (seconds * RATE as f64).round() as usize;
            let bytes = encode_wav(&vec![0.5; frames], 1, RATE).unwrap();
            self.files.insert(locator.to_string(), bytes);
            self
        }

        fn gate(self, locator: &str) -> (Self, Sender<()>) {
            let (tx, rx) = channel::unbounded();
            self.gates.lock().unwrap().insert(locator.to_string(), rx);
            (self, tx)
        }
    }

    impl ByteSource for TestSource {
        fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
            let gate = self.gates.lock().unwrap().get(locator).cloned();
            if let Some(gate) = gate {
                let _ = gate.recv();
            }
            self.files
                .get(locator)
                .cloned()
                .ok_or_else(|| SoundboardError::Fetch {
                    locator: locator.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such clip"),
                })
        }
    }

    fn engine_with(source: TestSource, config: EngineConfig) -> (TransportEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let mixer = Arc::new(Mutex::new(Mixer::new(RATE, clock.clone())));
        let engine = TransportEngine::new(
            config,
            clock.clone(),
            mixer,
            Arc::new(source),
            Arc::new(DefaultDecoder),
        );
        (engine, clock)
    }

    fn engine(source: TestSource) -> (TransportEngine, Arc<ManualClock>) {
        engine_with(
            source,
            EngineConfig {
                sample_rate: RATE,
                ..EngineConfig::default()
            },
        )
    }

    fn sound(id: &str) -> Sound {
        Sound::new(id, id.to_uppercase(), format!("{id}.wav"))
    }

    fn loaded(engine: &mut TransportEngine, sounds: &[&Sound]) {
        for s in sounds {
            engine.load(s);
        }
        assert_eq!(engine.settle_loads(SETTLE), sounds.len());
    }

    fn drain(engine: &TransportEngine) -> Vec<EngineEvent> {
        engine.events().try_iter().collect()
    }

    fn info(current_time: f64, duration: f64) -> Option<PlaybackInfo> {
        Some(PlaybackInfo {
            current_time,
            duration,
        })
    }

    #[test]
    fn test_load_publishes_duration() {
        let (mut engine, _clock) = engine(TestSource::default().clip("a.wav", 3.0));
        let a = sound("a");

        engine.load(&a);
        assert_eq!(engine.load_state("a"), LoadState::Loading);
        assert_eq!(engine.settle_loads(SETTLE), 1);

        assert_eq!(engine.load_state("a"), LoadState::Ready { duration: 3.0 });
        assert_eq!(engine.position("a"), info(0.0, 3.0));
        assert!(drain(&engine).contains(&EngineEvent::SoundLoaded {
            id: "a".into(),
            duration: 3.0
        }));
    }

    #[test]
    fn test_reload_replaces_asset() {
        let (mut engine, _clock) = engine(TestSource::default().clip("a.wav", 3.0));
        let a = sound("a");
        loaded(&mut engine, &[&a]);
        loaded(&mut engine, &[&a]);

        assert_eq!(engine.load_state("a"), LoadState::Ready { duration: 3.0 });
        assert_eq!(engine.cache.len(), 1);
    }

    #[test]
    fn test_stop_before_load_completes_cancels_play() {
        let (source, gate) = TestSource::default().clip("b.wav", 2.0).gate("b.wav");
        let (mut engine, _clock) = engine(source);
        let b = sound("b");

        engine.play(&b);
        assert!(engine.is_pending("b"));
        assert!(!engine.is_playing("b"));

        engine.stop("b");
        assert!(!engine.is_pending("b"));

        gate.send(()).unwrap();
        assert_eq!(engine.settle_loads(SETTLE), 1);

        assert!(!engine.is_playing("b"));
        assert!(!engine.is_pending("b"));
        assert_eq!(engine.load_state("b"), LoadState::Ready { duration: 2.0 });
        assert_eq!(engine.mixer().lock().unwrap().active_sources(), 0);
    }

    #[test]
    fn test_one_shot_stops_itself_after_duration() {
        let (mut engine, clock) = engine(TestSource::default().clip("a.wav", 3.0));
        let a = sound("a");
        loaded(&mut engine, &[&a]);

        engine.play(&a);
        clock.set(2.9);
        engine.tick();
        assert!(engine.is_playing("a"));
        assert!((engine.position("a").unwrap().current_time - 2.9).abs() < 1e-9);

        clock.set(3.0);
        engine.tick();
        assert!(!engine.playing_ids().contains("a"));
        assert_eq!(engine.position("a"), info(0.0, 3.0));
        assert!(drain(&engine).contains(&EngineEvent::Finished("a".into())));
        assert_eq!(engine.mixer().lock().unwrap().gain_stages(), 0);
    }

    #[test]
    fn test_set_volume_on_idle_sound_is_noop() {
        let (mut engine, _clock) = engine(TestSource::default().clip("a.wav", 1.0));
        let a = sound("a");
        loaded(&mut engine, &[&a]);
        drain(&engine);

        engine.set_volume("a", 0.3);
        engine.set_volume("ghost", 0.3);

        assert!(engine.playing_ids().is_empty());
        assert_eq!(engine.effective_volume("a"), None);
        assert_eq!(engine.mixer().lock().unwrap().gain_stages(), 0);
        assert!(drain(&engine).is_empty());
    }

    #[test]
    fn test_set_volume_ramps() {
        let (mut engine, clock) = engine(TestSource::default().clip("a.wav", 5.0));
        let a = sound("a").with_volume(1.0);
        loaded(&mut engine, &[&a]);

        engine.play(&a);
        clock.set(1.0);
        engine.set_volume("a", 0.2);
        assert_eq!(engine.effective_volume("a"), Some(1.0));

        clock.set(1.025);
        let mid = engine.effective_volume("a").unwrap();
        assert!(mid < 1.0 && mid > 0.2);

        clock.set(1.05);
        assert!((engine.effective_volume("a").unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_seek_keeps_volume() {
        let (mut engine, clock) = engine(TestSource::default().clip("a.wav", 3.0));
        let a = sound("a").with_volume(0.4);
        loaded(&mut engine, &[&a]);

        engine.play(&a);
        clock.set(0.5);
        engine.seek("a", 1.0);

        assert!(engine.is_playing("a"));
        assert!((engine.effective_volume("a").unwrap() - 0.4).abs() < 1e-6);
        assert_eq!(engine.position("a"), info(1.0, 3.0));

        clock.set(1.0);
        engine.tick();
        assert!((engine.position("a").unwrap().current_time - 1.5).abs() < 1e-9);
        assert_eq!(engine.mixer().lock().unwrap().active_sources(), 1);
    }

    #[test]
    fn test_seek_moves_the_auto_stop() {
        let (mut engine, clock) = engine(TestSource::default().clip("a.wav", 3.0));
        let a = sound("a");
        loaded(&mut engine, &[&a]);

        engine.play(&a);
        clock.set(1.0);
        engine.seek("a", 0.5);

        clock.set(3.0);
        engine.tick();
        assert!(engine.is_playing("a"));

        clock.set(3.5);
        engine.tick();
        assert!(!engine.is_playing("a"));
        assert_eq!(engine.position("a"), info(0.0, 3.0));
    }

    #[test]
    fn test_seek_while_stopped_only_moves_position() {
        let (mut engine, _clock) = engine(TestSource::default().clip("a.wav", 3.0));
        let a = sound("a");
        loaded(&mut engine, &[&a]);

        engine.seek("a", 2.0);
        assert!(!engine.is_playing("a"));
        assert_eq!(engine.position("a"), info(2.0, 3.0));
        assert_eq!(engine.mixer().lock().unwrap().active_sources(), 0);

        engine.play(&a);
        assert_eq!(engine.position("a"), info(0.0, 3.0));
    }

    #[test]
    fn test_seek_unknown_sound_is_noop() {
        let (mut engine, _clock) = engine(TestSource::default());
        engine.seek("ghost", 1.0);
        assert_eq!(engine.position("ghost"), None);
        assert!(drain(&engine).is_empty());
    }

    #[test]
    fn test_seek_is_clamped_to_duration() {
        let (mut engine, _clock) = engine(TestSource::default().clip("a.wav", 3.0));
        let a = sound("a");
        loaded(&mut engine, &[&a]);

        engine.seek("a", 99.0);
        assert_eq!(engine.position("a"), info(3.0, 3.0));
        engine.seek("a", -4.0);
        assert_eq!(engine.position("a"), info(0.0, 3.0));
    }

    #[test]
    fn test_stop_twice_is_single_fade() {
        let (mut engine, _clock) = engine(TestSource::default().clip("a.wav", 3.0));
        let a = sound("a");
        loaded(&mut engine, &[&a]);
        engine.play(&a);
        drain(&engine);

        engine.stop("a");
        let scheduled = engine.scheduler.len();
        engine.stop("a");

        assert_eq!(engine.scheduler.len(), scheduled);
        let stops = drain(&engine)
            .into_iter()
            .filter(|e| *e == EngineEvent::Stopped("a".into()))
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn test_stop_mid_playback() {
        let (mut engine, clock) = engine(TestSource::default().clip("a.wav", 3.0));
        let a = sound("a");
        loaded(&mut engine, &[&a]);

        engine.play(&a);
        clock.set(1.0);
        engine.tick();
        engine.stop("a");

        assert!(!engine.playing_ids().contains("a"));
        assert_eq!(engine.position("a"), info(0.0, 3.0));

        // Still audible during the fade, released afterwards
        assert_eq!(engine.mixer().lock().unwrap().active_sources(), 1);
        clock.set(1.1);
        engine.tick();
        let mixer = engine.mixer();
        let mixer = mixer.lock().unwrap();
        assert_eq!(mixer.active_sources(), 0);
        assert_eq!(mixer.gain_stages(), 0);
    }

    #[test]
    fn test_stale_auto_stop_does_not_end_new_session() {
        let (mut engine, clock) = engine(TestSource::default().clip("a.wav", 3.0));
        let a = sound("a");
        loaded(&mut engine, &[&a]);

        engine.play(&a);
        clock.set(1.0);
        engine.stop("a");
        clock.set(2.0);
        engine.tick();
        engine.play(&a);

        clock.set(3.0);
        engine.tick();
        assert!(engine.is_playing("a"));

        clock.set(5.0);
        engine.tick();
        assert!(!engine.is_playing("a"));
    }

    #[test]
    fn test_deferred_looping_play() {
        let (source, gate) = TestSource::default().clip("b.wav", 1.5).gate("b.wav");
        let (mut engine, clock) = engine(source);
        let b = sound("b").with_loop(true);

        engine.play(&b);
        assert!(engine.is_pending("b"));

        clock.set(0.2);
        gate.send(()).unwrap();
        assert_eq!(engine.settle_loads(SETTLE), 1);
        assert!(engine.is_playing("b"));
        assert!(!engine.is_pending("b"));
        assert_eq!(engine.position("b"), info(0.0, 1.5));

        clock.set(5.2);
        engine.tick();
        let position = engine.position("b").unwrap();
        assert!((position.current_time - 5.0 % 1.5).abs() < 1e-6);
        assert_eq!(position.duration, 1.5);
    }

    #[test]
    fn test_play_again_toggles_stop() {
        let (mut engine, _clock) = engine(TestSource::default().clip("c.wav", 2.0));
        let c = sound("c");
        loaded(&mut engine, &[&c]);

        engine.play(&c);
        assert!(engine.is_playing("c"));
        engine.play(&c);
        assert!(!engine.playing_ids().contains("c"));
    }

    #[test]
    fn test_sounds_play_independently() {
        let (mut engine, _clock) = engine(
            TestSource::default()
                .clip("a.wav", 2.0)
                .clip("b.wav", 2.0),
        );
        let a = sound("a").with_volume(0.3);
        let b = sound("b").with_volume(0.9);
        loaded(&mut engine, &[&a, &b]);

        engine.play(&a);
        engine.play(&b);
        engine.set_volume("a", 0.0);
        engine.stop("b");

        assert!(engine.is_playing("a"));
        assert!(!engine.is_playing("b"));
        assert_eq!(engine.mixer().lock().unwrap().active_sources(), 2);
    }

    #[test]
    fn test_failed_load_is_reported_and_retried_on_play() {
        let (mut engine, _clock) = engine(TestSource::default());
        let bad = sound("bad");

        engine.play(&bad);
        assert_eq!(engine.settle_loads(SETTLE), 1);

        assert!(matches!(engine.load_state("bad"), LoadState::Failed(_)));
        assert!(!engine.is_pending("bad"));
        assert!(!engine.is_playing("bad"));
        assert!(
            drain(&engine)
                .iter()
                .any(|e| matches!(e, EngineEvent::LoadFailed { id, .. } if id == "bad"))
        );

        engine.play(&bad);
        assert_eq!(engine.load_state("bad"), LoadState::Loading);
        assert!(engine.is_pending("bad"));
        engine.settle_loads(SETTLE);
    }

    #[test]
    fn test_remove_discards_load_in_flight() {
        let (source, gate) = TestSource::default().clip("a.wav", 1.0).gate("a.wav");
        let (mut engine, _clock) = engine(source);
        let a = sound("a");

        engine.play(&a);
        engine.remove_sound("a");
        gate.send(()).unwrap();

        assert_eq!(engine.settle_loads(SETTLE), 0);
        // Let the discarded completion arrive and be dropped
        std::thread::sleep(Duration::from_millis(100));
        engine.tick();
        assert_eq!(engine.load_state("a"), LoadState::Unloaded);
        assert!(!engine.is_playing("a"));
        assert_eq!(engine.position("a"), None);
    }

    #[test]
    fn test_tick_goes_idle_when_nothing_plays() {
        let (mut engine, clock) = engine(TestSource::default().clip("a.wav", 1.0));
        let a = sound("a").with_loop(true);
        loaded(&mut engine, &[&a]);
        assert!(!engine.tick());

        engine.play(&a);
        assert!(engine.tick());

        engine.stop("a");
        clock.set(0.2);
        assert!(!engine.tick());
        assert!(!engine.reporter.is_running());

        engine.play(&a);
        assert!(engine.tick());
        assert!(engine.reporter.is_running());
    }

    #[test]
    fn test_positions_are_published_while_playing() {
        let (mut engine, clock) = engine(TestSource::default().clip("a.wav", 2.0));
        let a = sound("a");
        loaded(&mut engine, &[&a]);
        engine.play(&a);
        drain(&engine);

        clock.set(0.5);
        engine.tick();

        let snapshot = drain(&engine)
            .into_iter()
            .find_map(|e| match e {
                EngineEvent::Positions(snapshot) => Some(snapshot),
                _ => None,
            })
            .unwrap();
        assert!((snapshot["a"].current_time - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_fade_in_starts_silent() {
        let (mut engine, clock) = engine_with(
            TestSource::default().clip("a.wav", 2.0),
            EngineConfig {
                sample_rate: RATE,
                fade_in: 0.1,
                ..EngineConfig::default()
            },
        );
        let a = sound("a").with_volume(0.8);
        loaded(&mut engine, &[&a]);

        engine.play(&a);
        assert_eq!(engine.effective_volume("a"), Some(0.0));
        clock.set(0.1);
        assert!((engine.effective_volume("a").unwrap() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_stop_all_clears_pending_and_sessions() {
        let (source, gate) = TestSource::default()
            .clip("a.wav", 2.0)
            .clip("b.wav", 2.0)
            .gate("b.wav");
        let (mut engine, _clock) = engine(source);
        let a = sound("a");
        let b = sound("b");
        loaded(&mut engine, &[&a]);

        engine.play(&a);
        engine.play(&b);
        engine.stop_all();

        assert!(engine.playing_ids().is_empty());
        assert!(!engine.is_pending("b"));

        gate.send(()).unwrap();
        engine.settle_loads(SETTLE);
        assert!(!engine.is_playing("b"));
    }

    #[test]
    fn test_dispose_releases_everything() {
        let (mut engine, _clock) = engine(
            TestSource::default()
                .clip("a.wav", 2.0)
                .clip("b.wav", 2.0),
        );
        let a = sound("a");
        let b = sound("b").with_loop(true);
        loaded(&mut engine, &[&a, &b]);
        engine.play(&a);
        engine.play(&b);
        engine.stop("a");

        engine.dispose();

        let mixer = engine.mixer();
        let mixer = mixer.lock().unwrap();
        assert_eq!(mixer.active_sources(), 0);
        assert_eq!(mixer.gain_stages(), 0);
        drop(mixer);

        assert!(engine.playing_ids().is_empty());
        assert_eq!(engine.load_state("a"), LoadState::Unloaded);
        engine.play(&a);
        assert!(!engine.is_pending("a"));
        assert!(!engine.tick());
    }
}
