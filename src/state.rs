//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::documents::{LazyEngine, TemplateCatalogue};
use crate::editor::{ArtifactStore, SchemaError};
use crate::sessions::registry::SessionRegistry;
use crate::storage::{DocumentStore, InMemoryDocumentStore};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub catalogue: TemplateCatalogue,
    pub sessions: SessionRegistry,
    pub engine: Arc<LazyEngine>,
    pub artifacts: Arc<ArtifactStore>,
    pub documents: Arc<dyn DocumentStore>,
}

impl AppState {
    /// Load the template catalogue and set up the lazily located engine.
    pub fn new(config: AppConfig) -> Result<Self, SchemaError> {
        let catalogue = TemplateCatalogue::load(&config.template_dir)?;
        let engine = Arc::new(LazyEngine::new(config.typst_bin.clone()));
        Ok(Self::with_parts(
            config,
            catalogue,
            engine,
            Arc::new(InMemoryDocumentStore::new()),
        ))
    }

    pub fn with_parts(
        config: AppConfig,
        catalogue: TemplateCatalogue,
        engine: Arc<LazyEngine>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        let sessions = SessionRegistry::new(
            config.session_idle,
            config.preview_debounce,
            config.max_list_items,
        );
        Self {
            config,
            catalogue,
            sessions,
            engine,
            artifacts: Arc::new(ArtifactStore::new()),
            documents,
        }
    }
}
