//! Download and print actions.
//!
//! Both render the debounced projection, stage the PDF as a temporary file
//! and hand it to a delivery collaborator. Every run walks an explicit
//! phase sequence and releases the staged artifact exactly once, after
//! delivery was initiated or the failure was surfaced.

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;
use thiserror::Error;
use uuid::Uuid;

use super::access::{AccessGate, SIGN_IN_PROMPT};
use super::session::EditingSession;
use super::state::FormState;
use super::GENERATION_FAILED_NOTICE;
use crate::documents::common::export_filename;
use crate::documents::{layout_document, DocumentDefinition, DocumentError, LazyEngine};
use crate::metrics;

pub const POPUP_BLOCKED_NOTICE: &str =
    "Браузърът блокира новия прозорец. Моля, разрешете изскачащите прозорци и опитайте отново.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportPhase {
    Idle,
    Gated,
    Authorized,
    Unauthorized,
    PromptShown,
    Rendering,
    Ready,
    Failed,
    Released,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("access denied")]
    AccessDenied,
    #[error("render failed: {0}")]
    Render(#[from] DocumentError),
    #[error("failed to stage artifact: {0}")]
    Artifact(#[source] std::io::Error),
    #[error("viewing context could not be opened")]
    ContextBlocked,
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl ExportError {
    /// Text shown to the user. Causes stay in the log.
    pub fn user_notice(&self) -> &'static str {
        match self {
            ExportError::AccessDenied => SIGN_IN_PROMPT,
            ExportError::ContextBlocked => POPUP_BLOCKED_NOTICE,
            ExportError::Render(_) | ExportError::Artifact(_) | ExportError::Delivery(_) => {
                GENERATION_FAILED_NOTICE
            }
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            ExportError::AccessDenied => "denied",
            ExportError::ContextBlocked => "blocked",
            ExportError::Render(_) | ExportError::Artifact(_) => "failed",
            ExportError::Delivery(_) => "undelivered",
        }
    }
}

#[derive(Debug, Default)]
struct ArtifactCounters {
    live: AtomicUsize,
    created: AtomicUsize,
    released: AtomicUsize,
}

/// Creates temporary PDF files and keeps count of the ones still alive.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    dir: Option<PathBuf>,
    counters: Arc<ArtifactCounters>,
}

impl ArtifactStore {
    /// Artifacts in the system temporary directory.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            counters: Arc::default(),
        }
    }

    pub fn stage(&self, bytes: &[u8]) -> std::io::Result<ArtifactHandle> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("blanki-").suffix(".pdf");
        let mut file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(bytes)?;
        file.flush()?;

        self.counters.live.fetch_add(1, Ordering::SeqCst);
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        metrics::LIVE_ARTIFACTS.inc();

        let handle = ArtifactHandle {
            id: Uuid::new_v4(),
            path: file.path().to_path_buf(),
            size: bytes.len(),
            file: Some(file),
            counters: Arc::clone(&self.counters),
        };
        log::debug!("Staged artifact {} ({} bytes)", handle.id, handle.size);
        Ok(handle)
    }

    pub fn live(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }
}

/// A staged artifact. Releasing consumes the handle; a handle dropped
/// without release is released then.
#[derive(Debug)]
pub struct ArtifactHandle {
    id: Uuid,
    path: PathBuf,
    size: usize,
    file: Option<NamedTempFile>,
    counters: Arc<ArtifactCounters>,
}

impl ArtifactHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> usize {
        self.size
    }

    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }

    pub fn release(mut self) {
        self.release_file();
    }

    fn release_file(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        if let Err(e) = file.close() {
            log::warn!("Failed to remove artifact {}: {}", self.id, e);
        }
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        metrics::LIVE_ARTIFACTS.dec();
        log::debug!("Released artifact {}", self.id);
    }
}

impl Drop for ArtifactHandle {
    fn drop(&mut self) {
        if self.file.is_some() {
            log::warn!("Artifact {} dropped without release", self.id);
            self.release_file();
        }
    }
}

/// Starts a save-as-file flow for a staged artifact.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    async fn save_as(&self, filename: &str, artifact: &ArtifactHandle) -> Result<(), String>;
}

/// Opens a new viewing context showing the artifact. `Ok(None)` when the
/// platform refuses to open one; `Err` when the artifact could not be handed
/// over at all.
#[async_trait]
pub trait ViewerLauncher: Send + Sync {
    async fn open(
        &self,
        artifact: &ArtifactHandle,
    ) -> Result<Option<Box<dyn ViewingContext>>, String>;
}

#[async_trait]
pub trait ViewingContext: Send {
    /// Resolves once the context finished loading the artifact.
    async fn loaded(&mut self) -> Result<(), String>;

    fn print(&mut self) -> Result<(), String>;
}

/// What to export: the projected values and how to lay them out.
#[derive(Clone)]
pub struct ExportRequest {
    pub title: String,
    pub definition: Arc<dyn DocumentDefinition>,
    pub values: Arc<FormState>,
    pub date: NaiveDate,
}

impl ExportRequest {
    /// Export the session's current projection, never its live state.
    pub fn from_session(session: &EditingSession, date: NaiveDate) -> Self {
        Self {
            title: session.title().to_string(),
            definition: Arc::clone(session.definition()),
            values: session.projection().values,
            date,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReceipt {
    pub filename: String,
    pub size_bytes: usize,
    pub pages: usize,
}

struct Rendered {
    artifact: ArtifactHandle,
    filename: String,
    pages: usize,
}

/// One export action. Each run resets and records its phase history.
pub struct ExportAction {
    engine: Arc<LazyEngine>,
    artifacts: Arc<ArtifactStore>,
    phases: Mutex<Vec<ExportPhase>>,
}

impl ExportAction {
    pub fn new(engine: Arc<LazyEngine>, artifacts: Arc<ArtifactStore>) -> Self {
        Self {
            engine,
            artifacts,
            phases: Mutex::new(vec![ExportPhase::Idle]),
        }
    }

    /// Phases walked by the latest run.
    pub fn phases(&self) -> Vec<ExportPhase> {
        self.phases.lock().clone()
    }

    pub fn phase(&self) -> ExportPhase {
        self.phases
            .lock()
            .last()
            .copied()
            .unwrap_or(ExportPhase::Idle)
    }

    pub async fn download(
        &self,
        gate: &AccessGate,
        request: &ExportRequest,
        sink: &dyn DownloadSink,
    ) -> Result<ExportReceipt, ExportError> {
        let result = self.run_download(gate, request, sink).await;
        self.finish("download", request, &result);
        result
    }

    pub async fn print(
        &self,
        gate: &AccessGate,
        request: &ExportRequest,
        launcher: &dyn ViewerLauncher,
    ) -> Result<ExportReceipt, ExportError> {
        let result = self.run_print(gate, request, launcher).await;
        self.finish("print", request, &result);
        result
    }

    async fn run_download(
        &self,
        gate: &AccessGate,
        request: &ExportRequest,
        sink: &dyn DownloadSink,
    ) -> Result<ExportReceipt, ExportError> {
        let rendered = self.authorize_and_render(gate, request).await?;
        let receipt = receipt(&rendered);

        let delivered = sink.save_as(&rendered.filename, &rendered.artifact).await;
        self.release(rendered.artifact);

        delivered.map_err(ExportError::Delivery)?;
        Ok(receipt)
    }

    async fn run_print(
        &self,
        gate: &AccessGate,
        request: &ExportRequest,
        launcher: &dyn ViewerLauncher,
    ) -> Result<ExportReceipt, ExportError> {
        let rendered = self.authorize_and_render(gate, request).await?;
        let receipt = receipt(&rendered);

        let mut context = match launcher.open(&rendered.artifact).await {
            Ok(Some(context)) => context,
            Ok(None) => {
                self.release(rendered.artifact);
                return Err(ExportError::ContextBlocked);
            }
            Err(e) => {
                self.release(rendered.artifact);
                return Err(ExportError::Delivery(e));
            }
        };

        let printed = match context.loaded().await {
            Ok(()) => context.print(),
            Err(e) => Err(e),
        };
        self.release(rendered.artifact);

        printed.map_err(ExportError::Delivery)?;
        Ok(receipt)
    }

    /// Gate, lay out, render and stage. On any failure the run ends in
    /// `Released` with nothing left alive.
    async fn authorize_and_render(
        &self,
        gate: &AccessGate,
        request: &ExportRequest,
    ) -> Result<Rendered, ExportError> {
        *self.phases.lock() = vec![ExportPhase::Idle];
        self.enter(ExportPhase::Gated);

        if !gate.require_access() {
            self.enter(ExportPhase::Unauthorized);
            self.enter(ExportPhase::PromptShown);
            self.enter(ExportPhase::Idle);
            return Err(ExportError::AccessDenied);
        }
        self.enter(ExportPhase::Authorized);
        self.enter(ExportPhase::Rendering);

        match self.render(request).await {
            Ok(rendered) => {
                self.enter(ExportPhase::Ready);
                Ok(rendered)
            }
            Err(e) => {
                self.enter(ExportPhase::Failed);
                self.enter(ExportPhase::Released);
                Err(e)
            }
        }
    }

    async fn render(&self, request: &ExportRequest) -> Result<Rendered, ExportError> {
        let document =
            layout_document(request.definition.as_ref(), &request.title, &request.values)?;

        let engine = self.engine.get().await?;
        let bytes = engine.render(&document).await.inspect_err(|_| {
            metrics::RENDER_FAILURES
                .with_label_values(&[request.definition.template_id()])
                .inc();
        })?;

        let artifacts = Arc::clone(&self.artifacts);
        let artifact = tokio::task::spawn_blocking(move || artifacts.stage(&bytes))
            .await
            .map_err(|e| ExportError::Artifact(std::io::Error::other(e.to_string())))?
            .map_err(ExportError::Artifact)?;

        Ok(Rendered {
            artifact,
            filename: export_filename(&request.title, request.date),
            pages: document.page_count(),
        })
    }

    fn release(&self, artifact: ArtifactHandle) {
        artifact.release();
        self.enter(ExportPhase::Released);
    }

    fn enter(&self, phase: ExportPhase) {
        log::trace!("Export phase -> {:?}", phase);
        self.phases.lock().push(phase);
    }

    fn finish(
        &self,
        action: &str,
        request: &ExportRequest,
        result: &Result<ExportReceipt, ExportError>,
    ) {
        let outcome = match result {
            Ok(receipt) => {
                log::info!(
                    "{} of '{}' ready: {} ({} bytes, {} pages)",
                    action,
                    request.definition.template_id(),
                    receipt.filename,
                    receipt.size_bytes,
                    receipt.pages
                );
                "ready"
            }
            Err(ExportError::AccessDenied) => "denied",
            Err(e) => {
                log::error!(
                    "{} of '{}' failed: {}",
                    action,
                    request.definition.template_id(),
                    e
                );
                e.outcome()
            }
        };
        metrics::EXPORTS.with_label_values(&[action, outcome]).inc();
    }
}

fn receipt(rendered: &Rendered) -> ExportReceipt {
    ExportReceipt {
        filename: rendered.filename.clone(),
        size_bytes: rendered.artifact.size_bytes(),
        pages: rendered.pages,
    }
}
