//! Trait for document layout definitions.

use super::layout::LaidOutDocument;
use super::DocumentError;
use crate::editor::FormState;

/// Layout companion of a template schema. Implementations must be pure:
/// the same snapshot always yields the same pages.
pub trait DocumentDefinition: Send + Sync {
    /// Id of the schema this definition lays out.
    fn template_id(&self) -> &'static str;

    fn layout(&self, title: &str, values: &FormState) -> Result<LaidOutDocument, DocumentError>;
}
