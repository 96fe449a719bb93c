//! HTTP-side delivery of export artifacts: the response body is the
//! save-as flow, an inline response is the new viewing context.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::editor::{ArtifactHandle, DownloadSink, ViewerLauncher, ViewingContext};

/// Copies the artifact into the response buffer before it is released.
#[derive(Debug, Default)]
pub struct ResponseDownload {
    body: Mutex<Option<Vec<u8>>>,
}

impl ResponseDownload {
    pub fn take(&self) -> Option<Vec<u8>> {
        self.body.lock().take()
    }
}

#[async_trait]
impl DownloadSink for ResponseDownload {
    async fn save_as(&self, filename: &str, artifact: &ArtifactHandle) -> Result<(), String> {
        let bytes = artifact.read().await.map_err(|e| e.to_string())?;
        log::debug!("Streaming {} ({} bytes) as attachment", filename, bytes.len());
        *self.body.lock() = Some(bytes);
        Ok(())
    }
}

/// Opens the artifact "inline": the browser tab showing the response is
/// the viewing context and prints on load.
#[derive(Debug, Default)]
pub struct InlineViewer {
    body: Arc<Mutex<Option<Vec<u8>>>>,
}

impl InlineViewer {
    pub fn take(&self) -> Option<Vec<u8>> {
        self.body.lock().take()
    }
}

struct InlineContext {
    body: Arc<Mutex<Option<Vec<u8>>>>,
    pending: Option<Vec<u8>>,
}

#[async_trait]
impl ViewerLauncher for InlineViewer {
    async fn open(
        &self,
        artifact: &ArtifactHandle,
    ) -> Result<Option<Box<dyn ViewingContext>>, String> {
        let bytes = artifact
            .read()
            .await
            .map_err(|e| format!("failed to read artifact {}: {}", artifact.id(), e))?;
        Ok(Some(Box::new(InlineContext {
            body: Arc::clone(&self.body),
            pending: Some(bytes),
        })))
    }
}

#[async_trait]
impl ViewingContext for InlineContext {
    async fn loaded(&mut self) -> Result<(), String> {
        match &self.pending {
            Some(_) => Ok(()),
            None => Err("artifact was not loaded".to_string()),
        }
    }

    fn print(&mut self) -> Result<(), String> {
        let bytes = self
            .pending
            .take()
            .ok_or_else(|| "nothing to print".to_string())?;
        *self.body.lock() = Some(bytes);
        Ok(())
    }
}
