//! Access gate: every mutation and export asks it first.
//!
//! The capability itself comes from an [`AccessProvider`] handed in by the
//! host (a verified token for HTTP requests, a fixed value in tests).

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const SIGN_IN_PROMPT: &str =
    "Моля, влезте в профила си, за да попълвате, изтегляте и печатате документи.";

/// Reports whether an authenticated actor exists for the session.
pub trait AccessProvider: Send + Sync {
    fn has_actor(&self) -> bool;
}

/// Where the sign-in prompt is shown.
pub trait PromptSink: Send + Sync {
    fn show_sign_in_prompt(&self, message: &str);
}

impl AccessProvider for bool {
    fn has_actor(&self) -> bool {
        *self
    }
}

pub struct AccessGate {
    provider: Arc<dyn AccessProvider>,
    prompt: Arc<dyn PromptSink>,
}

impl AccessGate {
    pub fn new(provider: Arc<dyn AccessProvider>, prompt: Arc<dyn PromptSink>) -> Self {
        Self { provider, prompt }
    }

    /// True when an actor is present. Otherwise shows the prompt once for
    /// this call and returns false.
    pub fn require_access(&self) -> bool {
        if self.provider.has_actor() {
            return true;
        }
        log::info!("Access denied, showing sign-in prompt");
        self.prompt.show_sign_in_prompt(SIGN_IN_PROMPT);
        false
    }
}

/// Prompt sink that counts what was shown.
#[derive(Debug, Default)]
pub struct PromptRecorder {
    shown: AtomicUsize,
    last: Mutex<Option<String>>,
}

impl PromptRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.shown.load(Ordering::SeqCst)
    }

    pub fn last_message(&self) -> Option<String> {
        self.last.lock().clone()
    }
}

impl PromptSink for PromptRecorder {
    fn show_sign_in_prompt(&self, message: &str) {
        self.shown.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some(message.to_string());
    }
}
