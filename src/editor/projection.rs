//! Debounced projection of the form state.
//!
//! The projection is a delayed copy of the live state that drives rendering.
//! Each mutation reschedules the copy; it only happens after the configured
//! quiet period. There is no max-wait.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::debounce::Debouncer;
use super::state::FormState;

#[derive(Debug, Clone)]
pub struct ProjectionSnapshot {
    /// Number of projection updates so far; 0 is the initial state.
    pub version: u64,
    pub values: Arc<FormState>,
}

pub struct DebouncedProjection {
    source: Arc<Mutex<FormState>>,
    timer: Debouncer,
    published: Arc<watch::Sender<ProjectionSnapshot>>,
}

impl DebouncedProjection {
    /// Start with a copy of `source` as version 0.
    pub fn new(source: Arc<Mutex<FormState>>, delay: Duration) -> Self {
        let initial = ProjectionSnapshot {
            version: 0,
            values: Arc::new(source.lock().clone()),
        };
        let (published, _) = watch::channel(initial);
        Self {
            source,
            timer: Debouncer::new(delay),
            published: Arc::new(published),
        }
    }

    /// Reset the quiet-period timer after a form state mutation.
    pub fn notify_mutation(&self) {
        let source = Arc::clone(&self.source);
        let published = Arc::clone(&self.published);
        self.timer.schedule(move || {
            let values = Arc::new(source.lock().clone());
            published.send_modify(|snapshot| {
                snapshot.version += 1;
                snapshot.values = values;
            });
            log::debug!("Projection updated to version {}", published.borrow().version);
        });
    }

    pub fn current(&self) -> ProjectionSnapshot {
        self.published.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProjectionSnapshot> {
        self.published.subscribe()
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_pending()
    }

    pub fn delay(&self) -> Duration {
        self.timer.delay()
    }
}
