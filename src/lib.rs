use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod config;
pub mod documents;
pub mod editor;
pub mod metrics;
pub mod sessions;
pub mod state;
pub mod storage;

pub use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::new("Unauthorized", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::sessions::handlers::list_templates,
        crate::sessions::handlers::get_template,
        crate::sessions::handlers::open_session,
        crate::sessions::handlers::get_session,
        crate::sessions::handlers::close_session,
        crate::sessions::handlers::set_field,
        crate::sessions::handlers::set_list_item_field,
        crate::sessions::handlers::append_list_item,
        crate::sessions::handlers::remove_list_item,
        crate::sessions::handlers::prefill,
        crate::sessions::handlers::preview,
        crate::sessions::handlers::preview_events,
        crate::sessions::handlers::download,
        crate::sessions::handlers::print,
        crate::sessions::handlers::save,
        crate::sessions::handlers::list_documents
    ),
    components(
        schemas(
            sessions::models::TemplateSummaryResponse,
            sessions::models::OpenSessionRequest,
            sessions::models::SessionView,
            sessions::models::SetValueRequest,
            sessions::models::MutationResponse,
            sessions::models::PrefillRequest,
            sessions::models::PrefillResponse,
            sessions::models::PreviewResponse,
            sessions::models::SavedDocumentResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Templates", description = "Fillable document templates."),
        (name = "Editing Sessions", description = "Form state, debounced preview and saving."),
        (name = "Export", description = "PDF download and print.")
    ),
    servers(
        (url = "http://127.0.0.1:8080", description = "Localhost server")
    )
)]
pub struct ApiDoc;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // Load .env file
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = config::AppConfig::from_env().context("invalid configuration")?;
    let bind = (config.bind_address.clone(), config.port);
    let origins = config.allowed_origins.clone();

    let app_state = match AppState::new(config) {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!("Failed to load document templates. Check TEMPLATE_DIR. Error: {}", e);
            std::process::exit(1);
        }
    };

    let prometheus = PrometheusMetricsBuilder::new("blanki_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| anyhow::anyhow!("failed to create Prometheus metrics middleware: {}", e))?;

    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let cors = origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(app_state)
            .service(web::scope("/api").configure(sessions::config))
            .service(
                web::resource("/metrics/documents")
                    .route(web::get().to(sessions::handlers::document_metrics)),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
