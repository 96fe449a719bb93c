//! Documents module - layout and PDF rendering for fillable templates.
//!
//! Each template pairs a JSON schema (under `static/templates`) with a
//! layout definition:
//! - `PowerOfAttorney` - Пълномощно
//! - `Receipt` - Разписка
//! - `LeaveRequest` - Молба за платен годишен отпуск

pub mod common;
pub mod engine;
pub mod layout;
pub mod numbers;
pub mod templates;
pub mod traits;

pub use engine::{typst_source, LazyEngine, PdfEngine, TypstRenderEngine};
pub use layout::{LaidOutDocument, LayoutBuilder, Page};
pub use templates::{CatalogueEntry, TemplateCatalogue, TemplateSummary};
pub use traits::DocumentDefinition;

use thiserror::Error;

use crate::editor::FormState;
use crate::metrics;

/// Errors that can occur during document generation.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("field '{field}' holds an unexpected value, expected {expected}")]
    UnexpectedValue { field: String, expected: &'static str },
    #[error("PDF engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("failed to create temporary directory: {0}")]
    TempDir(#[source] std::io::Error),
    #[error("failed to write Typst source: {0}")]
    WriteTypst(#[source] std::io::Error),
    #[error("Typst CLI execution failed: {0}")]
    TypstIo(#[source] std::io::Error),
    #[error("Typst CLI exited with status {0}")]
    TypstExit(i32),
    #[error("failed to read generated PDF: {0}")]
    ReadPdf(#[source] std::io::Error),
    #[error("render task failed: {0}")]
    Join(String),
}

/// Lay out a snapshot, counting successes and failures.
pub fn layout_document(
    definition: &dyn DocumentDefinition,
    title: &str,
    values: &FormState,
) -> Result<LaidOutDocument, DocumentError> {
    let template = definition.template_id();
    match definition.layout(title, values) {
        Ok(document) => {
            metrics::DOCUMENTS_LAID_OUT
                .with_label_values(&[template])
                .inc();
            Ok(document)
        }
        Err(e) => {
            metrics::RENDER_FAILURES.with_label_values(&[template]).inc();
            Err(e)
        }
    }
}
