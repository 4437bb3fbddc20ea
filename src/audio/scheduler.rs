// src/audio/scheduler.rs
// Time-delayed engine work: auto-stop of one-shot sounds and fade-tail release

use super::SoundId;
use super::session::SignalChain;

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledTask {
    /// End of a non-looping session. Cancellable per sound id.
    AutoStop { sound_id: SoundId, token: u64 },
    /// Stop and free a chain once its fade-out has run.
    /// Never cancelled: a started fade always completes.
    Release { chain: SignalChain },
}

#[derive(Debug)]
struct Entry {
    due: f64,
    seq: u64,
    task: ScheduledTask,
}

/// Pending tasks ordered by due time, then by scheduling order.
#[derive(Debug, Default)]
pub struct Scheduler {
    entries: Vec<Entry>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: f64, task: ScheduledTask) {
        self.next_seq += 1;
        self.entries.push(Entry {
            due,
            seq: self.next_seq,
            task,
        });
    }

    /// Drop the pending auto-stop of `sound_id`. Returns the number removed.
    pub fn cancel(&mut self, sound_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| {
            !matches!(&entry.task, ScheduledTask::AutoStop { sound_id: id, .. } if id == sound_id)
        });
        before - self.entries.len()
    }

    /// Remove and return every task due at or before `now`, earliest first.
    pub fn take_due(&mut self, now: f64) -> Vec<ScheduledTask> {
        let (mut due, pending): (Vec<Entry>, Vec<Entry>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| entry.due <= now);
        self.entries = pending;

        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.seq.cmp(&b.seq)));
        due.into_iter().map(|entry| entry.task).collect()
    }

    pub fn is_idle(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
