#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use blanki_server::auth::generate_access_token;
use blanki_server::config::AppConfig;
use blanki_server::documents::{
    typst_source, DocumentError, LaidOutDocument, LazyEngine, PdfEngine, TemplateCatalogue,
};
use blanki_server::storage::InMemoryDocumentStore;
use blanki_server::AppState;

pub const TEST_SECRET: &str = "test-secret";

/// Engine that returns the Typst source behind a PDF magic header, so tests
/// do not need the Typst binary.
pub struct SourceEngine;

#[async_trait]
impl PdfEngine for SourceEngine {
    async fn render(&self, document: &LaidOutDocument) -> Result<Vec<u8>, DocumentError> {
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.extend(typst_source(document).into_bytes());
        Ok(bytes)
    }
}

pub fn test_config(debounce: Duration) -> AppConfig {
    AppConfig {
        jwt_secret: TEST_SECRET.to_string(),
        preview_debounce: debounce,
        ..AppConfig::default()
    }
}

/// App state over the built-in templates, a fake engine and in-memory storage.
pub fn test_state(debounce: Duration) -> AppState {
    let config = test_config(debounce);
    let catalogue =
        TemplateCatalogue::load(&config.template_dir).expect("built-in templates should load");
    AppState::with_parts(
        config,
        catalogue,
        Arc::new(LazyEngine::preloaded(Arc::new(SourceEngine))),
        Arc::new(InMemoryDocumentStore::new()),
    )
}

pub fn bearer(actor_id: &str) -> (&'static str, String) {
    let token = generate_access_token(TEST_SECRET, actor_id, "Тест Тестов")
        .expect("token should encode");
    ("Authorization", format!("Bearer {}", token))
}
