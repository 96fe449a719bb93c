use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::documents::{Page, TemplateSummary};
use crate::editor::{EditingSession, FormState, MutationOutcome, PreviewReport};
use crate::storage::SavedDocument;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSummaryResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}

impl From<TemplateSummary> for TemplateSummaryResponse {
    fn from(summary: TemplateSummary) -> Self {
        Self {
            id: summary.id,
            title: summary.title,
            description: summary.description,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    pub template_id: String,
    /// Values merged into the fresh form state.
    #[schema(value_type = Option<Object>)]
    pub prefill: Option<FormState>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub template_id: String,
    pub title: String,
    /// Live form state.
    #[schema(value_type = Object)]
    pub values: FormState,
    /// Debounced projection that previews and exports render.
    #[schema(value_type = Object)]
    pub projection: FormState,
    pub projection_version: u64,
    pub projection_pending: bool,
    pub opened_at: DateTime<Utc>,
}

impl SessionView {
    pub fn of(session: &EditingSession) -> Self {
        let snapshot = session.projection();
        Self {
            id: session.id(),
            template_id: session.template_id().to_string(),
            title: session.title().to_string(),
            values: session.current_state(),
            projection: (*snapshot.values).clone(),
            projection_version: snapshot.version,
            projection_pending: session.is_projection_pending(),
            opened_at: session.opened_at(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetValueRequest {
    pub value: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse {
    #[schema(value_type = String, example = "applied")]
    pub outcome: MutationOutcome,
    #[schema(value_type = Object)]
    pub values: FormState,
}

/// Field values keyed by field id.
#[derive(Debug, Deserialize, ToSchema)]
#[schema(value_type = Object)]
pub struct PrefillRequest(pub FormState);

#[derive(Debug, Serialize, ToSchema)]
pub struct PrefillResponse {
    pub merged: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PreviewQuery {
    /// Width of the hosting container in CSS pixels.
    pub width: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub projection_version: u64,
    pub pages: usize,
    pub height_px: u32,
    pub is_multi_page: bool,
    #[schema(value_type = Vec<Object>)]
    pub layout: Vec<Page>,
}

impl PreviewResponse {
    pub fn new(projection_version: u64, report: PreviewReport, layout: Vec<Page>) -> Self {
        Self {
            projection_version,
            pages: report.pages,
            height_px: report.height_px,
            is_multi_page: report.is_multi_page,
            layout,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SavedDocumentResponse {
    pub id: Uuid,
    pub template_id: String,
    pub title: String,
    #[schema(value_type = Object)]
    pub values: FormState,
    pub saved_at: DateTime<Utc>,
}

impl From<SavedDocument> for SavedDocumentResponse {
    fn from(document: SavedDocument) -> Self {
        Self {
            id: document.id,
            template_id: document.template_id,
            title: document.title,
            values: document.values,
            saved_at: document.saved_at,
        }
    }
}
