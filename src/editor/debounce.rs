//! Cancellable trailing-edge timer.
//!
//! Each `schedule` supersedes the previous one: the earlier task is aborted
//! and its generation retired, so only the most recent schedule can fire.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Default)]
struct TimerSlot {
    generation: u64,
    pending: Option<JoinHandle<()>>,
    fired: u64,
}

pub struct Debouncer {
    delay: Duration,
    slot: Arc<Mutex<TimerSlot>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slot: Arc::new(Mutex::new(TimerSlot::default())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `task` once `delay` has passed without another `schedule` or
    /// `cancel`. Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, task: F) -> u64
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.slot.lock();
        if let Some(previous) = slot.pending.take() {
            previous.abort();
        }
        slot.generation += 1;
        let generation = slot.generation;

        let shared = Arc::clone(&self.slot);
        let delay = self.delay;
        slot.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut slot = shared.lock();
                if slot.generation != generation {
                    return;
                }
                slot.pending = None;
                slot.fired += 1;
            }
            task();
        }));
        generation
    }

    /// Drop the pending schedule, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        match slot.pending.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock().pending.is_some()
    }

    /// Number of schedules that ran to completion.
    pub fn fired_count(&self) -> u64 {
        self.slot.lock().fired
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(handle) = self.slot.lock().pending.take() {
            handle.abort();
        }
    }
}
