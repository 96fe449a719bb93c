//! Editing session: one template, its live form state and the debounced
//! projection derived from it.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use super::access::AccessGate;
use super::projection::{DebouncedProjection, ProjectionSnapshot};
use super::schema::{TemplateSchema, MAX_LIST_ITEMS};
use super::state::{FormState, MutationOutcome};
use crate::documents::DocumentDefinition;
use crate::storage::{DocumentStore, SavedDocument, StoreError};

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("access denied")]
    AccessDenied,
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct EditingSession {
    id: Uuid,
    schema: Arc<TemplateSchema>,
    definition: Arc<dyn DocumentDefinition>,
    state: Arc<Mutex<FormState>>,
    projection: DebouncedProjection,
    max_list_items: usize,
    opened_at: DateTime<Utc>,
}

impl EditingSession {
    /// Open a session with every declared field at its default value.
    pub fn new(
        schema: Arc<TemplateSchema>,
        definition: Arc<dyn DocumentDefinition>,
        debounce: Duration,
    ) -> Self {
        let state = Arc::new(Mutex::new(FormState::initialize(&schema)));
        let projection = DebouncedProjection::new(Arc::clone(&state), debounce);
        Self {
            id: Uuid::new_v4(),
            schema,
            definition,
            state,
            projection,
            max_list_items: MAX_LIST_ITEMS,
            opened_at: Utc::now(),
        }
    }

    /// Cap the number of records any dynamic list may grow to.
    pub fn with_list_limit(mut self, max_list_items: usize) -> Self {
        self.max_list_items = max_list_items;
        self
    }

    pub fn max_list_items(&self) -> usize {
        self.max_list_items
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn schema(&self) -> &Arc<TemplateSchema> {
        &self.schema
    }

    pub fn template_id(&self) -> &str {
        &self.schema.id
    }

    pub fn title(&self) -> &str {
        &self.schema.title
    }

    pub fn definition(&self) -> &Arc<dyn DocumentDefinition> {
        &self.definition
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Copy of the live form state.
    pub fn current_state(&self) -> FormState {
        self.state.lock().clone()
    }

    pub fn projection(&self) -> ProjectionSnapshot {
        self.projection.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProjectionSnapshot> {
        self.projection.subscribe()
    }

    pub fn is_projection_pending(&self) -> bool {
        self.projection.is_pending()
    }

    /// Gated mutation entry points, bound to the caller's access gate.
    pub fn editor<'a>(&'a self, gate: &'a AccessGate) -> SessionEditor<'a> {
        SessionEditor::new(self, gate)
    }

    /// Merge an externally loaded value mapping. Keys that the schema does not
    /// declare, or whose shape does not match, are dropped. Not gated: prefill
    /// does not originate from the user.
    pub fn apply_prefill(&self, mut incoming: FormState) -> usize {
        let dropped = incoming.retain_declared(&self.schema);
        if !dropped.is_empty() {
            log::warn!(
                "Prefill for '{}' dropped undeclared keys: {}",
                self.schema.id,
                dropped.join(", ")
            );
        }

        let written = self.state.lock().merge(incoming);
        if written > 0 {
            self.projection.notify_mutation();
        }
        written
    }
}

pub struct SessionEditor<'a> {
    session: &'a EditingSession,
    gate: &'a AccessGate,
}

impl<'a> SessionEditor<'a> {
    pub fn new(session: &'a EditingSession, gate: &'a AccessGate) -> Self {
        Self { session, gate }
    }

    pub fn set_scalar(&self, field_id: &str, value: &str) -> MutationOutcome {
        self.mutate("set_scalar", field_id, false, |state| {
            state.set_scalar(field_id, value)
        })
    }

    pub fn set_list_item_field(
        &self,
        field_id: &str,
        index: usize,
        sub_field: &str,
        value: &str,
    ) -> MutationOutcome {
        let limit = self.session.max_list_items;
        self.mutate("set_list_item_field", field_id, true, |state| {
            if index >= limit {
                log::warn!(
                    "set_list_item_field ignored: index {} of '{}' exceeds the limit of {}",
                    index,
                    field_id,
                    limit
                );
                return MutationOutcome::Ignored;
            }
            state.set_list_item_field(field_id, index, sub_field, value)
        })
    }

    pub fn append_list_item(&self, field_id: &str) -> MutationOutcome {
        let limit = self.session.max_list_items;
        self.mutate("append_list_item", field_id, true, |state| {
            if state.list(field_id).len() >= limit {
                log::warn!("append_list_item ignored: '{}' holds {} records", field_id, limit);
                return MutationOutcome::Ignored;
            }
            state.append_list_item(field_id)
        })
    }

    pub fn remove_list_item(&self, field_id: &str, index: usize) -> MutationOutcome {
        self.mutate("remove_list_item", field_id, true, |state| {
            state.remove_list_item(field_id, index)
        })
    }

    /// Hand the debounced projection, never the live state, to the store.
    pub async fn save(
        &self,
        store: &dyn DocumentStore,
        owner: &str,
    ) -> Result<SavedDocument, SaveError> {
        if !self.gate.require_access() {
            return Err(SaveError::AccessDenied);
        }
        let snapshot = self.session.projection();
        let saved = store
            .save(
                owner,
                self.session.template_id(),
                self.session.title(),
                &snapshot.values,
            )
            .await?;
        log::info!(
            "Saved document {} from projection version {}",
            saved.id,
            snapshot.version
        );
        Ok(saved)
    }

    fn mutate(
        &self,
        operation: &str,
        field_id: &str,
        expects_list: bool,
        apply: impl FnOnce(&mut FormState) -> MutationOutcome,
    ) -> MutationOutcome {
        if !self.gate.require_access() {
            return MutationOutcome::Denied;
        }

        match self.session.schema.field(field_id) {
            Some(field) if field.kind.is_list() == expects_list => {}
            _ => {
                log::warn!(
                    "{} ignored: '{}' is not a matching field of '{}'",
                    operation,
                    field_id,
                    self.session.schema.id
                );
                return MutationOutcome::Ignored;
            }
        }

        let outcome = apply(&mut self.session.state.lock());
        if outcome == MutationOutcome::Applied {
            self.session.projection.notify_mutation();
        }
        log::debug!("{} on '{}': {:?}", operation, field_id, outcome);
        outcome
    }
}
