// src/audio/loader.rs
// Background fetch + decode; outcomes are applied on the engine thread

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::io::{AudioDecoder, ByteSource, extension_hint};
use super::{DecodedAsset, SoundId};
use crate::error::{Result, SoundboardError};
use crate::library::Sound;

#[derive(Debug)]
pub struct LoadOutcome {
    pub sound_id: SoundId,
    pub result: Result<DecodedAsset>,
}

#[derive(Debug)]
struct Completion {
    ticket: u64,
    outcome: LoadOutcome,
}

/// Runs each load on its own worker thread. A failing load only reports
/// its own error; other loads in flight are unaffected.
pub struct Loader {
    byte_source: Arc<dyn ByteSource>,
    decoder: Arc<dyn AudioDecoder>,
    target_rate: u32,
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
    in_flight: HashMap<SoundId, u64>,
    next_ticket: u64,
}

impl Loader {
    pub fn new(
        byte_source: Arc<dyn ByteSource>,
        decoder: Arc<dyn AudioDecoder>,
        target_rate: u32,
    ) -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            byte_source,
            decoder,
            target_rate,
            sender,
            receiver,
            in_flight: HashMap::new(),
            next_ticket: 0,
        }
    }

    /// Start loading `sound`. A load already running for the same id is
    /// reused rather than duplicated.
    pub fn spawn(&mut self, sound: &Sound) -> Result<()> {
        if self.in_flight.contains_key(&sound.id) {
            debug!(id = %sound.id, "load already in flight");
            return Ok(());
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;

        let sound_id = sound.id.clone();
        let locator = sound.source.clone();
        let byte_source = Arc::clone(&self.byte_source);
        let decoder = Arc::clone(&self.decoder);
        let target_rate = self.target_rate;
        let sender = self.sender.clone();

        thread::Builder::new()
            .name(format!("load-{}", sound.id))
            .spawn(move || {
                let result = byte_source.fetch(&locator).and_then(|bytes| {
                    decoder.decode(&bytes, extension_hint(&locator), target_rate)
                });
                // Receiver gone means the engine was dropped
                let _ = sender.send(Completion {
                    ticket,
                    outcome: LoadOutcome { sound_id, result },
                });
            })
            .map_err(SoundboardError::Spawn)?;

        self.in_flight.insert(sound.id.clone(), ticket);
        Ok(())
    }

    pub fn is_loading(&self, id: &str) -> bool {
        self.in_flight.contains_key(id)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Outstanding load for `id` will be discarded when it completes.
    pub fn forget(&mut self, id: &str) {
        self.in_flight.remove(id);
    }

    pub fn forget_all(&mut self) {
        self.in_flight.clear();
    }

    /// Completed loads, without blocking.
    pub fn try_completions(&mut self) -> Vec<LoadOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(completion) = self.receiver.try_recv() {
            if let Some(outcome) = self.accept(completion) {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Block up to `timeout` for the next live completion.
    pub fn wait_completion(&mut self, timeout: Duration) -> Option<LoadOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(completion) => {
                    if let Some(outcome) = self.accept(completion) {
                        return Some(outcome);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None;
                }
            }
        }
    }

    fn accept(&mut self, completion: Completion) -> Option<LoadOutcome> {
        let id = &completion.outcome.sound_id;
        if self.in_flight.get(id) != Some(&completion.ticket) {
            warn!(id = %id, "discarding load for a forgotten sound");
            return None;
        }
        self.in_flight.remove(id);
        Some(completion.outcome)
    }
}
