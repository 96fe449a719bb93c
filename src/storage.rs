//! Saved documents.
//!
//! The save action hands the projected values to a [`DocumentStore`]. The
//! bundled store keeps them in memory, per owner, for the process lifetime.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::editor::FormState;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("owner must not be empty")]
    MissingOwner,
    #[error("storage backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDocument {
    pub id: Uuid,
    pub template_id: String,
    pub title: String,
    pub values: FormState,
    pub saved_at: DateTime<Utc>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save(
        &self,
        owner: &str,
        template_id: &str,
        title: &str,
        values: &FormState,
    ) -> Result<SavedDocument, StoreError>;

    /// Documents saved by `owner`, newest first.
    async fn list(&self, owner: &str) -> Result<Vec<SavedDocument>, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<String, Vec<SavedDocument>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn save(
        &self,
        owner: &str,
        template_id: &str,
        title: &str,
        values: &FormState,
    ) -> Result<SavedDocument, StoreError> {
        if owner.trim().is_empty() {
            return Err(StoreError::MissingOwner);
        }

        let document = SavedDocument {
            id: Uuid::new_v4(),
            template_id: template_id.to_string(),
            title: title.to_string(),
            values: values.clone(),
            saved_at: Utc::now(),
        };
        self.documents
            .write()
            .entry(owner.to_string())
            .or_default()
            .push(document.clone());

        log::debug!("Stored document {} for {}", document.id, owner);
        Ok(document)
    }

    async fn list(&self, owner: &str) -> Result<Vec<SavedDocument>, StoreError> {
        let mut documents = self
            .documents
            .read()
            .get(owner)
            .cloned()
            .unwrap_or_default();
        documents.reverse();
        Ok(documents)
    }
}
