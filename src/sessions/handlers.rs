use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use super::delivery::{InlineViewer, ResponseDownload};
use super::models::{
    MutationResponse, OpenSessionRequest, PrefillRequest, PrefillResponse, PreviewQuery,
    PreviewResponse, SavedDocumentResponse, SessionView, SetValueRequest,
    TemplateSummaryResponse,
};
use crate::auth::ActorAccess;
use crate::editor::preview::{spawn_preview_loop, PAGE_WIDTH_PX};
use crate::editor::{
    AccessGate, EditingSession, ExportAction, ExportError, ExportRequest, MutationOutcome,
    PreviewListener, PreviewOutcome, PreviewSurface, PromptRecorder, SaveError,
    GENERATION_FAILED_NOTICE, SIGN_IN_PROMPT,
};
use crate::{metrics, AppState, ErrorResponse};

const SESSION_NOT_FOUND: &str = "Сесията за редактиране не е намерена или е изтекла.";
const TEMPLATE_NOT_FOUND: &str = "Шаблонът не е намерен.";
const SAVE_FAILED: &str = "Документът не можа да бъде запазен. Моля, опитайте отново.";
const INDEX_OUT_OF_RANGE: &str = "Номерът на записа надвишава допустимия брой записи.";

/// Access gate of one request, backed by its bearer token.
struct RequestGate {
    gate: AccessGate,
    prompts: Arc<PromptRecorder>,
    access: Arc<ActorAccess>,
}

impl RequestGate {
    fn new(req: &HttpRequest, state: &AppState) -> Self {
        let access = Arc::new(ActorAccess::from_request(req, &state.config.jwt_secret));
        let prompts = Arc::new(PromptRecorder::new());
        let gate = AccessGate::new(access.clone(), prompts.clone());
        Self {
            gate,
            prompts,
            access,
        }
    }

    /// 401 carrying the prompt the gate showed.
    fn denied(&self) -> HttpResponse {
        let message = self
            .prompts
            .last_message()
            .unwrap_or_else(|| SIGN_IN_PROMPT.to_string());
        HttpResponse::Unauthorized().json(ErrorResponse::unauthorized(&message))
    }
}

async fn find_session(state: &AppState, id: Uuid) -> Result<Arc<EditingSession>, HttpResponse> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| HttpResponse::NotFound().json(ErrorResponse::not_found(SESSION_NOT_FOUND)))
}

fn mutation_response(
    session: &EditingSession,
    gate: &RequestGate,
    outcome: MutationOutcome,
) -> HttpResponse {
    match outcome {
        MutationOutcome::Denied => gate.denied(),
        outcome => HttpResponse::Ok().json(MutationResponse {
            outcome,
            values: session.current_state(),
        }),
    }
}

fn export_error(error: ExportError, gate: &RequestGate) -> HttpResponse {
    match error {
        ExportError::AccessDenied => gate.denied(),
        ExportError::ContextBlocked => HttpResponse::Conflict()
            .json(ErrorResponse::new("ViewerBlocked", error.user_notice())),
        other => HttpResponse::InternalServerError()
            .json(ErrorResponse::new("GenerationFailed", other.user_notice())),
    }
}

fn export_request(session: &EditingSession) -> ExportRequest {
    ExportRequest::from_session(session, chrono::Local::now().date_naive())
}

#[utoipa::path(
    get,
    path = "/api/templates",
    tag = "Templates",
    responses(
        (status = 200, description = "Available document templates", body = Vec<TemplateSummaryResponse>)
    )
)]
pub async fn list_templates(state: web::Data<AppState>) -> impl Responder {
    let summaries: Vec<TemplateSummaryResponse> = state
        .catalogue
        .summaries()
        .into_iter()
        .map(TemplateSummaryResponse::from)
        .collect();
    HttpResponse::Ok().json(summaries)
}

#[utoipa::path(
    get,
    path = "/api/templates/{id}",
    tag = "Templates",
    params(("id" = String, Path, description = "Template id")),
    responses(
        (status = 200, description = "Template schema with sections and fields"),
        (status = 404, description = "Unknown template", body = ErrorResponse)
    )
)]
pub async fn get_template(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match state.catalogue.get(&path.into_inner()) {
        Some(entry) => HttpResponse::Ok().json(entry.schema.as_ref()),
        None => HttpResponse::NotFound().json(ErrorResponse::not_found(TEMPLATE_NOT_FOUND)),
    }
}

#[utoipa::path(
    post,
    path = "/api/sessions",
    tag = "Editing Sessions",
    request_body = OpenSessionRequest,
    responses(
        (status = 201, description = "Session opened with default values", body = SessionView),
        (status = 401, description = "Sign-in required to open with prefilled values", body = ErrorResponse),
        (status = 404, description = "Unknown template", body = ErrorResponse)
    )
)]
pub async fn open_session(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<OpenSessionRequest>,
) -> impl Responder {
    let request = body.into_inner();
    let Some(entry) = state.catalogue.get(&request.template_id) else {
        return HttpResponse::NotFound().json(ErrorResponse::not_found(TEMPLATE_NOT_FOUND));
    };
    if request.prefill.is_some() {
        let gate = RequestGate::new(&req, &state);
        if !gate.gate.require_access() {
            return gate.denied();
        }
    }

    let session = state.sessions.open(entry).await;
    if let Some(prefill) = request.prefill {
        session.apply_prefill(prefill);
    }
    HttpResponse::Created().json(SessionView::of(&session))
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    tag = "Editing Sessions",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Live values and current projection", body = SessionView),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn get_session(state: web::Data<AppState>, path: web::Path<Uuid>) -> impl Responder {
    match find_session(&state, path.into_inner()).await {
        Ok(session) => HttpResponse::Ok().json(SessionView::of(&session)),
        Err(response) => response,
    }
}

#[utoipa::path(
    delete,
    path = "/api/sessions/{id}",
    tag = "Editing Sessions",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session ended"),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn close_session(state: web::Data<AppState>, path: web::Path<Uuid>) -> impl Responder {
    if state.sessions.close(path.into_inner()).await {
        HttpResponse::NoContent().finish()
    } else {
        HttpResponse::NotFound().json(ErrorResponse::not_found(SESSION_NOT_FOUND))
    }
}

#[utoipa::path(
    put,
    path = "/api/sessions/{id}/fields/{field}",
    tag = "Editing Sessions",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("field" = String, Path, description = "Scalar field id")
    ),
    request_body = SetValueRequest,
    responses(
        (status = 200, description = "Mutation applied or ignored", body = MutationResponse),
        (status = 401, description = "Sign-in required", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn set_field(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String)>,
    body: web::Json<SetValueRequest>,
) -> impl Responder {
    let (id, field) = path.into_inner();
    let session = match find_session(&state, id).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    let gate = RequestGate::new(&req, &state);
    let outcome = session.editor(&gate.gate).set_scalar(&field, &body.value);
    mutation_response(&session, &gate, outcome)
}

#[utoipa::path(
    put,
    path = "/api/sessions/{id}/lists/{field}/{index}/{sub}",
    tag = "Editing Sessions",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("field" = String, Path, description = "List field id"),
        ("index" = usize, Path, description = "Record index; shorter lists are padded"),
        ("sub" = String, Path, description = "Sub-field id")
    ),
    request_body = SetValueRequest,
    responses(
        (status = 200, description = "Mutation applied or ignored", body = MutationResponse),
        (status = 400, description = "Index beyond the list limit", body = ErrorResponse),
        (status = 401, description = "Sign-in required", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn set_list_item_field(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String, usize, String)>,
    body: web::Json<SetValueRequest>,
) -> impl Responder {
    let (id, field, index, sub) = path.into_inner();
    let session = match find_session(&state, id).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    if index >= session.max_list_items() {
        return HttpResponse::BadRequest().json(ErrorResponse::bad_request(INDEX_OUT_OF_RANGE));
    }
    let gate = RequestGate::new(&req, &state);
    let outcome = session
        .editor(&gate.gate)
        .set_list_item_field(&field, index, &sub, &body.value);
    mutation_response(&session, &gate, outcome)
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/lists/{field}",
    tag = "Editing Sessions",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("field" = String, Path, description = "List field id")
    ),
    responses(
        (status = 200, description = "Empty record appended", body = MutationResponse),
        (status = 401, description = "Sign-in required", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn append_list_item(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String)>,
) -> impl Responder {
    let (id, field) = path.into_inner();
    let session = match find_session(&state, id).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    let gate = RequestGate::new(&req, &state);
    let outcome = session.editor(&gate.gate).append_list_item(&field);
    mutation_response(&session, &gate, outcome)
}

#[utoipa::path(
    delete,
    path = "/api/sessions/{id}/lists/{field}/{index}",
    tag = "Editing Sessions",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("field" = String, Path, description = "List field id"),
        ("index" = usize, Path, description = "Record index")
    ),
    responses(
        (status = 200, description = "Record removed, or ignored when out of range", body = MutationResponse),
        (status = 401, description = "Sign-in required", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn remove_list_item(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String, usize)>,
) -> impl Responder {
    let (id, field, index) = path.into_inner();
    let session = match find_session(&state, id).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    let gate = RequestGate::new(&req, &state);
    let outcome = session.editor(&gate.gate).remove_list_item(&field, index);
    mutation_response(&session, &gate, outcome)
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/prefill",
    tag = "Editing Sessions",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = PrefillRequest,
    responses(
        (status = 200, description = "Declared keys merged", body = PrefillResponse),
        (status = 401, description = "Sign-in required", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn prefill(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<PrefillRequest>,
) -> impl Responder {
    let session = match find_session(&state, path.into_inner()).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    let gate = RequestGate::new(&req, &state);
    if !gate.gate.require_access() {
        return gate.denied();
    }
    let merged = session.apply_prefill(body.into_inner().0);
    HttpResponse::Ok().json(PrefillResponse { merged })
}

/// Listener for one-off previews; the response carries the report.
struct SilentListener;

impl PreviewListener for SilentListener {
    fn on_height_change(&self, _: u32) {}

    fn on_page_count_change(&self, _: bool) {}
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}/preview",
    tag = "Editing Sessions",
    params(("id" = Uuid, Path, description = "Session id"), PreviewQuery),
    responses(
        (status = 200, description = "Laid-out pages of the projection with measurements", body = PreviewResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Generation failed", body = ErrorResponse)
    )
)]
pub async fn preview(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<PreviewQuery>,
) -> impl Responder {
    let session = match find_session(&state, path.into_inner()).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    let snapshot = session.projection();
    let mut surface = PreviewSurface::new(
        Arc::clone(session.definition()),
        session.title(),
        Arc::new(SilentListener),
        query.width.unwrap_or(PAGE_WIDTH_PX),
    );
    match surface.refresh(&snapshot.values) {
        PreviewOutcome::Rendered { report, document } => HttpResponse::Ok().json(
            PreviewResponse::new(snapshot.version, report, document.pages.clone()),
        ),
        PreviewOutcome::Failed { notice } => HttpResponse::InternalServerError()
            .json(ErrorResponse::new("GenerationFailed", notice)),
    }
}

/// Forwards preview callbacks as server-sent events.
struct EventStreamListener {
    events: mpsc::Sender<String>,
}

impl EventStreamListener {
    fn emit(&self, event: &str, data: serde_json::Value) {
        let frame = format!("event: {}\ndata: {}\n\n", event, data);
        if let Err(e) = self.events.try_send(frame) {
            log::debug!("Dropped preview event '{}': {}", event, e);
        }
    }
}

impl PreviewListener for EventStreamListener {
    fn on_height_change(&self, height_px: u32) {
        self.emit("height", serde_json::json!({ "heightPx": height_px }));
    }

    fn on_page_count_change(&self, is_multi_page: bool) {
        self.emit("pageCount", serde_json::json!({ "isMultiPage": is_multi_page }));
    }

    fn on_render_failed(&self, notice: &str) {
        self.emit("renderFailed", serde_json::json!({ "message": notice }));
    }
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}/events",
    tag = "Editing Sessions",
    params(("id" = Uuid, Path, description = "Session id"), PreviewQuery),
    responses(
        (status = 200, description = "text/event-stream of height, pageCount and renderFailed events"),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn preview_events(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<PreviewQuery>,
) -> impl Responder {
    let session = match find_session(&state, path.into_inner()).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel(32);
    let surface = PreviewSurface::new(
        Arc::clone(session.definition()),
        session.title(),
        Arc::new(EventStreamListener { events: tx.clone() }),
        query.width.unwrap_or(PAGE_WIDTH_PX),
    );
    let mut preview = spawn_preview_loop(surface, session.subscribe());
    let abort = preview.abort_handle();
    let session_id = session.id();
    tokio::spawn(async move {
        tokio::select! {
            _ = tx.closed() => {
                abort.abort();
                log::debug!("Preview stream for session {} disconnected", session_id);
            }
            _ = &mut preview => {}
        }
    });

    let stream = ReceiverStream::new(rx)
        .map(|frame| Ok::<_, actix_web::Error>(web::Bytes::from(frame)));
    HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .content_type("text/event-stream")
        .streaming(stream)
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}/download",
    tag = "Export",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "PDF of the projection as an attachment"),
        (status = 401, description = "Sign-in required", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Generation failed", body = ErrorResponse)
    )
)]
pub async fn download(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    let session = match find_session(&state, path.into_inner()).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    let gate = RequestGate::new(&req, &state);
    let action = ExportAction::new(Arc::clone(&state.engine), Arc::clone(&state.artifacts));
    let sink = ResponseDownload::default();

    match action
        .download(&gate.gate, &export_request(&session), &sink)
        .await
    {
        Ok(receipt) => match sink.take() {
            Some(body) => HttpResponse::Ok()
                .content_type("application/pdf")
                .insert_header((
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", receipt.filename),
                ))
                .body(body),
            None => HttpResponse::InternalServerError()
                .json(ErrorResponse::new("GenerationFailed", GENERATION_FAILED_NOTICE)),
        },
        Err(e) => export_error(e, &gate),
    }
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}/print",
    tag = "Export",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "PDF of the projection for printing, shown inline"),
        (status = 401, description = "Sign-in required", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Viewer could not be opened", body = ErrorResponse),
        (status = 500, description = "Generation failed", body = ErrorResponse)
    )
)]
pub async fn print(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    let session = match find_session(&state, path.into_inner()).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    let gate = RequestGate::new(&req, &state);
    let action = ExportAction::new(Arc::clone(&state.engine), Arc::clone(&state.artifacts));
    let viewer = InlineViewer::default();

    match action
        .print(&gate.gate, &export_request(&session), &viewer)
        .await
    {
        Ok(receipt) => match viewer.take() {
            Some(body) => HttpResponse::Ok()
                .content_type("application/pdf")
                .insert_header((
                    header::CONTENT_DISPOSITION,
                    format!("inline; filename=\"{}\"", receipt.filename),
                ))
                .body(body),
            None => HttpResponse::InternalServerError()
                .json(ErrorResponse::new("GenerationFailed", GENERATION_FAILED_NOTICE)),
        },
        Err(e) => export_error(e, &gate),
    }
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/save",
    tag = "Editing Sessions",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 201, description = "Projection saved for the signed-in actor", body = SavedDocumentResponse),
        (status = 401, description = "Sign-in required", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn save(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    let session = match find_session(&state, path.into_inner()).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    let gate = RequestGate::new(&req, &state);
    let owner = gate.access.actor_id().unwrap_or_default().to_string();

    match session
        .editor(&gate.gate)
        .save(state.documents.as_ref(), &owner)
        .await
    {
        Ok(document) => HttpResponse::Created().json(SavedDocumentResponse::from(document)),
        Err(SaveError::AccessDenied) => gate.denied(),
        Err(SaveError::Store(e)) => {
            log::error!("Failed to save session {}: {}", session.id(), e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(SAVE_FAILED))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/documents",
    tag = "Editing Sessions",
    responses(
        (status = 200, description = "Documents saved by the signed-in actor, newest first", body = Vec<SavedDocumentResponse>),
        (status = 401, description = "Sign-in required", body = ErrorResponse)
    )
)]
pub async fn list_documents(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    let gate = RequestGate::new(&req, &state);
    if !gate.gate.require_access() {
        return gate.denied();
    }
    let owner = gate.access.actor_id().unwrap_or_default();

    match state.documents.list(owner).await {
        Ok(documents) => HttpResponse::Ok().json(
            documents
                .into_iter()
                .map(SavedDocumentResponse::from)
                .collect::<Vec<_>>(),
        ),
        Err(e) => {
            log::error!("Failed to list documents: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Неуспешно зареждане на документите."))
        }
    }
}

pub async fn document_metrics() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics::gather_text())
}

/// Configure template, session and document routes under `/api`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/templates").route(web::get().to(list_templates)))
        .service(web::resource("/templates/{id}").route(web::get().to(get_template)))
        .service(web::resource("/sessions").route(web::post().to(open_session)))
        .service(
            web::resource("/sessions/{id}")
                .route(web::get().to(get_session))
                .route(web::delete().to(close_session)),
        )
        .service(web::resource("/sessions/{id}/fields/{field}").route(web::put().to(set_field)))
        .service(
            web::resource("/sessions/{id}/lists/{field}")
                .route(web::post().to(append_list_item)),
        )
        .service(
            web::resource("/sessions/{id}/lists/{field}/{index}")
                .route(web::delete().to(remove_list_item)),
        )
        .service(
            web::resource("/sessions/{id}/lists/{field}/{index}/{sub}")
                .route(web::put().to(set_list_item_field)),
        )
        .service(web::resource("/sessions/{id}/prefill").route(web::post().to(prefill)))
        .service(web::resource("/sessions/{id}/preview").route(web::get().to(preview)))
        .service(web::resource("/sessions/{id}/events").route(web::get().to(preview_events)))
        .service(web::resource("/sessions/{id}/download").route(web::get().to(download)))
        .service(web::resource("/sessions/{id}/print").route(web::get().to(print)))
        .service(web::resource("/sessions/{id}/save").route(web::post().to(save)))
        .service(web::resource("/documents").route(web::get().to(list_documents)));
}
