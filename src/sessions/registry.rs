//! Open editing sessions, evicted after a period of inactivity.

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::documents::CatalogueEntry;
use crate::editor::EditingSession;

const MAX_SESSIONS: u64 = 10_000;

#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Cache<Uuid, Arc<EditingSession>>,
    debounce: Duration,
    max_list_items: usize,
}

impl SessionRegistry {
    pub fn new(idle: Duration, debounce: Duration, max_list_items: usize) -> Self {
        let sessions = Cache::builder()
            .time_to_idle(idle)
            .max_capacity(MAX_SESSIONS)
            .eviction_listener(|id, _, cause| {
                log::info!("Editing session {} ended ({:?})", id, cause);
            })
            .build();
        Self {
            sessions,
            debounce,
            max_list_items,
        }
    }

    /// Open a session for a catalogue entry with its fields at defaults.
    pub async fn open(&self, entry: &CatalogueEntry) -> Arc<EditingSession> {
        let session = Arc::new(
            EditingSession::new(
                Arc::clone(&entry.schema),
                Arc::clone(&entry.definition),
                self.debounce,
            )
            .with_list_limit(self.max_list_items),
        );
        self.sessions.insert(session.id(), Arc::clone(&session)).await;
        log::info!(
            "Opened editing session {} for '{}'",
            session.id(),
            session.template_id()
        );
        session
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<EditingSession>> {
        self.sessions.get(&id).await
    }

    pub async fn close(&self, id: Uuid) -> bool {
        self.sessions.remove(&id).await.is_some()
    }
}
