//! Prefill: externally loaded values merged into a running session.
//!
//! A failed or empty load is a normal state and is not reported; only a
//! successful merge is logged.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::session::EditingSession;
use super::state::FormState;

#[derive(Debug, Error)]
pub enum PrefillError {
    #[error("prefill unavailable: {0}")]
    Unavailable(String),
}

/// Source of prefill values for a template.
#[async_trait]
pub trait PrefillSource: Send + Sync {
    async fn load(&self, template_id: &str) -> Result<Option<FormState>, PrefillError>;
}

/// Load once and merge. Returns the number of merged keys on success.
pub async fn load_prefill(session: &EditingSession, source: &dyn PrefillSource) -> Option<usize> {
    match source.load(session.template_id()).await {
        Ok(Some(values)) => {
            let written = session.apply_prefill(values);
            log::info!(
                "Prefill merged {} field(s) into session {}",
                written,
                session.id()
            );
            Some(written)
        }
        Ok(None) => None,
        Err(e) => {
            log::debug!("Prefill skipped for session {}: {}", session.id(), e);
            None
        }
    }
}

/// Merge every mapping that arrives on `updates` (e.g. storage-change
/// notifications) until the sender side closes.
pub fn watch_prefill(
    session: Arc<EditingSession>,
    mut updates: mpsc::Receiver<FormState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(values) = updates.recv().await {
            let written = session.apply_prefill(values);
            log::info!(
                "Prefill notification merged {} field(s) into session {}",
                written,
                session.id()
            );
        }
    })
}
