//! Timer queue: timeouts and animation frames
//!
//! Timers are keyed on `tokio::time::Instant`, so tests running on a paused
//! clock see them fire deterministically. Nothing runs on its own: the host
//! drives the queue with [`Document::run_due_timers`] or [`Document::settle`].

use std::time::Duration;

use tokio::time::Instant;

use super::Document;

/// Delay used for `request_animation_frame` (one 60 Hz frame)
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

type TimerTask = Box<dyn FnOnce(&mut Document)>;

struct Timer {
    id: TimerId,
    due: Instant,
    task: TimerTask,
}

#[derive(Default)]
pub(super) struct TimerQueue {
    next_id: u64,
    timers: Vec<Timer>,
}

impl TimerQueue {
    fn schedule(&mut self, delay: Duration, task: TimerTask) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.timers.push(Timer {
            id,
            due: Instant::now() + delay,
            task,
        });
        id
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    fn next_due(&self) -> Option<Instant> {
        self.timers.iter().map(|t| t.due).min()
    }

    /// Remove and return the earliest timer due at or before `now`.
    /// Ties go to the timer scheduled first.
    fn take_due(&mut self, now: Instant) -> Option<TimerTask> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(_, t)| (t.due, t.id))
            .map(|(i, _)| i)?;
        Some(self.timers.remove(index).task)
    }
}

impl Document {
    pub fn set_timeout<F>(&mut self, delay: Duration, task: F) -> TimerId
    where
        F: FnOnce(&mut Document) + 'static,
    {
        self.timers.schedule(delay, Box::new(task))
    }

    pub fn clear_timeout(&mut self, id: TimerId) -> bool {
        self.timers.cancel(id)
    }

    pub fn request_animation_frame<F>(&mut self, task: F) -> TimerId
    where
        F: FnOnce(&mut Document) + 'static,
    {
        self.set_timeout(FRAME_INTERVAL, task)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.timers.len()
    }

    /// Run every timer that is due now. Returns how many ran.
    pub fn run_due_timers(&mut self) -> usize {
        let now = Instant::now();
        let mut ran = 0;
        while let Some(task) = self.timers.take_due(now) {
            task(self);
            ran += 1;
        }
        ran
    }

    /// Sleep through the queue until no timers remain. Returns how many ran.
    pub async fn settle(&mut self) -> usize {
        let mut ran = 0;
        while let Some(due) = self.timers.next_due() {
            tokio::time::sleep_until(due).await;
            ran += self.run_due_timers();
        }
        ran
    }
}
