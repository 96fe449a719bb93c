//! Fillable-document editing pipeline.
//!
//! - `schema` - template field declarations
//! - `state` - flat form state and its mutation primitives
//! - `access` - access gate in front of every mutation and export
//! - `debounce` / `projection` - delayed snapshot of the state for rendering
//! - `session` - one editing session tying the above together
//! - `prefill` - merging externally loaded values
//! - `preview` - preview measurement and size reporting
//! - `export` - download and print actions

pub mod access;
pub mod debounce;
pub mod export;
pub mod prefill;
pub mod preview;
pub mod projection;
pub mod schema;
pub mod session;
pub mod state;


pub use access::{AccessGate, AccessProvider, PromptRecorder, PromptSink, SIGN_IN_PROMPT};
pub use debounce::{Debouncer, DEFAULT_DEBOUNCE};
pub use export::{
    ArtifactHandle, ArtifactStore, DownloadSink, ExportAction, ExportError, ExportPhase,
    ExportReceipt, ExportRequest, ViewerLauncher, ViewingContext,
};
pub use prefill::{load_prefill, watch_prefill, PrefillError, PrefillSource};
pub use preview::{PreviewListener, PreviewOutcome, PreviewReport, PreviewSurface};
pub use projection::{DebouncedProjection, ProjectionSnapshot};
pub use schema::{
    FieldKind, FieldSpec, ListSpec, SchemaError, Section, TemplateSchema, DEFAULT_LIST_ITEMS,
    MAX_LIST_ITEMS,
};
pub use session::{EditingSession, SaveError, SessionEditor};
pub use state::{FieldValue, FormState, ListItem, MutationOutcome};

/// Shown to the user whenever a render fails; the cause is only logged.
pub const GENERATION_FAILED_NOTICE: &str =
    "Генерирането на документа не бе успешно. Моля, опитайте отново.";
