mod common;

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use serde_json::{json, Value};
use std::time::Duration;

use blanki_server::editor::SIGN_IN_PROMPT;
use blanki_server::{sessions, AppState};
use common::{bearer, test_state};

const DEBOUNCE: Duration = Duration::from_millis(50);

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .service(web::scope("/api").configure(sessions::config)),
        )
        .await
    };
}

macro_rules! open_session {
    ($app:expr, $template_id:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/sessions")
            .set_json(json!({ "templateId": $template_id }))
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        test::read_body_json::<Value, _>(resp).await
    }};
}

fn state() -> web::Data<AppState> {
    web::Data::new(test_state(DEBOUNCE))
}

#[actix_web::test]
async fn test_list_and_get_templates() {
    let state = state();
    let app = init_app!(state);

    let req = test::TestRequest::get().uri("/api/templates").to_request();
    let templates: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(templates.as_array().unwrap().len(), 3);

    let req = test::TestRequest::get()
        .uri("/api/templates/receipt")
        .to_request();
    let schema: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(schema["title"], "Разписка");

    let req = test::TestRequest::get()
        .uri("/api/templates/missing")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_open_session_starts_at_defaults() {
    let state = state();
    let app = init_app!(state);

    let session = open_session!(app, "receipt");

    assert_eq!(session["templateId"], "receipt");
    assert_eq!(session["values"]["giverName"], "");
    assert_eq!(session["values"]["items"].as_array().unwrap().len(), 3);
    assert_eq!(session["projectionVersion"], 0);
    assert_eq!(session["projectionPending"], false);

    let req = test::TestRequest::post()
        .uri("/api/sessions")
        .set_json(json!({ "templateId": "missing" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_mutation_without_token_is_denied_with_prompt() {
    let state = state();
    let app = init_app!(state);
    let session = open_session!(app, "receipt");
    let id = session["id"].as_str().unwrap();

    let req = test::TestRequest::put()
        .uri(&format!("/api/sessions/{}/fields/giverName", id))
        .set_json(json!({ "value": "Иван" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], SIGN_IN_PROMPT);

    let req = test::TestRequest::get()
        .uri(&format!("/api/sessions/{}", id))
        .to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(view["values"]["giverName"], "");
    assert_eq!(view["projectionPending"], false);
}

#[actix_web::test]
async fn test_mutations_reach_projection_after_quiet_period() {
    let state = state();
    let app = init_app!(state);
    let session = open_session!(app, "receipt");
    let id = session["id"].as_str().unwrap();

    let req = test::TestRequest::put()
        .uri(&format!("/api/sessions/{}/fields/giverName", id))
        .insert_header(bearer("actor-1"))
        .set_json(json!({ "value": "Иван" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["outcome"], "applied");
    assert_eq!(body["values"]["giverName"], "Иван");

    let req = test::TestRequest::put()
        .uri(&format!("/api/sessions/{}/lists/items/5/description", id))
        .insert_header(bearer("actor-1"))
        .set_json(json!({ "value": "Лаптоп" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let items = body["values"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 6);
    assert_eq!(items[5]["description"], "Лаптоп");

    let req = test::TestRequest::get()
        .uri(&format!("/api/sessions/{}", id))
        .to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(view["projectionPending"], true);
    assert_eq!(view["projection"]["giverName"], "");

    tokio::time::sleep(DEBOUNCE * 4).await;

    let req = test::TestRequest::get()
        .uri(&format!("/api/sessions/{}", id))
        .to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(view["projectionVersion"], 1);
    assert_eq!(view["projection"]["giverName"], "Иван");
    assert_eq!(view["projection"]["items"].as_array().unwrap().len(), 6);
}

#[actix_web::test]
async fn test_list_append_remove_and_ignored_mutations() {
    let state = state();
    let app = init_app!(state);
    let session = open_session!(app, "receipt");
    let id = session["id"].as_str().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/sessions/{}/lists/items", id))
        .insert_header(bearer("actor-1"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["values"]["items"].as_array().unwrap().len(), 4);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/sessions/{}/lists/items/0", id))
        .insert_header(bearer("actor-1"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["outcome"], "applied");
    assert_eq!(body["values"]["items"].as_array().unwrap().len(), 3);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/sessions/{}/lists/items/10", id))
        .insert_header(bearer("actor-1"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["outcome"], "ignored");

    let req = test::TestRequest::put()
        .uri(&format!("/api/sessions/{}/fields/unknown", id))
        .insert_header(bearer("actor-1"))
        .set_json(json!({ "value": "x" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["outcome"], "ignored");
    assert!(body["values"].get("unknown").is_none());
}

#[actix_web::test]
async fn test_prefill_merges_only_declared_keys() {
    let state = state();
    let app = init_app!(state);
    let session = open_session!(app, "power_of_attorney");
    let id = session["id"].as_str().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/sessions/{}/prefill", id))
        .insert_header(bearer("actor-1"))
        .set_json(json!({ "principalName": "Петър Петров", "nickname": "Пешо" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["merged"], 1);

    let req = test::TestRequest::get()
        .uri(&format!("/api/sessions/{}", id))
        .to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(view["values"]["principalName"], "Петър Петров");
    assert!(view["values"].get("nickname").is_none());
}

#[actix_web::test]
async fn test_anonymous_prefill_is_denied_and_changes_nothing() {
    let state = state();
    let app = init_app!(state);
    let session = open_session!(app, "power_of_attorney");
    let id = session["id"].as_str().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/sessions/{}/prefill", id))
        .set_json(json!({ "principalName": "Натрапник" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], SIGN_IN_PROMPT);

    let req = test::TestRequest::get()
        .uri(&format!("/api/sessions/{}", id))
        .to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(view["values"]["principalName"], "");
    assert_eq!(view["projectionPending"], false);

    let req = test::TestRequest::post()
        .uri("/api/sessions")
        .set_json(json!({
            "templateId": "power_of_attorney",
            "prefill": { "principalName": "Натрапник" }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/sessions")
        .insert_header(bearer("actor-1"))
        .set_json(json!({
            "templateId": "power_of_attorney",
            "prefill": { "principalName": "Петър Петров" }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let opened: Value = test::read_body_json(resp).await;
    assert_eq!(opened["values"]["principalName"], "Петър Петров");
}

#[actix_web::test]
async fn test_list_index_beyond_limit_is_rejected() {
    let state = state();
    let app = init_app!(state);
    let session = open_session!(app, "receipt");
    let id = session["id"].as_str().unwrap();

    for index in [usize::MAX, 1_000_000_000, state.config.max_list_items] {
        let req = test::TestRequest::put()
            .uri(&format!(
                "/api/sessions/{}/lists/items/{}/description",
                id, index
            ))
            .insert_header(bearer("actor-1"))
            .set_json(json!({ "value": "x" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "index {}", index);
    }

    let req = test::TestRequest::get()
        .uri(&format!("/api/sessions/{}", id))
        .to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(view["values"]["items"].as_array().unwrap().len(), 3);
    assert_eq!(view["projectionPending"], false);
}

#[actix_web::test]
async fn test_preview_reports_measurements() {
    let state = state();
    let app = init_app!(state);
    let session = open_session!(app, "leave_request");
    let id = session["id"].as_str().unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/api/sessions/{}/preview", id))
        .to_request();
    let preview: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(preview["pages"], 1);
    assert_eq!(preview["heightPx"], 1123);
    assert_eq!(preview["isMultiPage"], false);
    assert_eq!(preview["layout"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::get()
        .uri(&format!("/api/sessions/{}/preview?width=397", id))
        .to_request();
    let preview: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(preview["heightPx"], 562);
}

#[actix_web::test]
async fn test_download_requires_access_and_releases_artifact() {
    let state = state();
    let app = init_app!(state);
    let session = open_session!(app, "receipt");
    let id = session["id"].as_str().unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/api/sessions/{}/download", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(state.artifacts.created(), 0);

    let req = test::TestRequest::get()
        .uri(&format!("/api/sessions/{}/download", id))
        .insert_header(bearer("actor-1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
    let disposition = resp
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"razpiska-"));
    assert!(disposition.ends_with(".pdf\""));

    let body = test::read_body(resp).await;
    assert!(body.starts_with(b"%PDF"));
    assert_eq!(state.artifacts.created(), 1);
    assert_eq!(state.artifacts.released(), 1);
    assert_eq!(state.artifacts.live(), 0);
}

#[actix_web::test]
async fn test_print_serves_inline_pdf() {
    let state = state();
    let app = init_app!(state);
    let session = open_session!(app, "power_of_attorney");
    let id = session["id"].as_str().unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/api/sessions/{}/print", id))
        .insert_header(bearer("actor-1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("inline; filename=\"palnomoshtno-"));
    assert_eq!(state.artifacts.live(), 0);
}

#[actix_web::test]
async fn test_save_stores_projection_for_actor() {
    let state = state();
    let app = init_app!(state);
    let session = open_session!(app, "receipt");
    let id = session["id"].as_str().unwrap();

    let req = test::TestRequest::put()
        .uri(&format!("/api/sessions/{}/fields/place", id))
        .insert_header(bearer("actor-1"))
        .set_json(json!({ "value": "София" }))
        .to_request();
    test::call_service(&app, req).await;
    tokio::time::sleep(DEBOUNCE * 4).await;

    let req = test::TestRequest::put()
        .uri(&format!("/api/sessions/{}/fields/place", id))
        .insert_header(bearer("actor-1"))
        .set_json(json!({ "value": "Пловдив" }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/sessions/{}/save", id))
        .insert_header(bearer("actor-1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let saved: Value = test::read_body_json(resp).await;
    assert_eq!(saved["templateId"], "receipt");
    assert_eq!(saved["values"]["place"], "София");

    let req = test::TestRequest::get()
        .uri("/api/documents")
        .insert_header(bearer("actor-1"))
        .to_request();
    let documents: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(documents.as_array().unwrap().len(), 1);

    let req = test::TestRequest::get()
        .uri("/api/documents")
        .insert_header(bearer("actor-2"))
        .to_request();
    let documents: Value = test::call_and_read_body_json(&app, req).await;
    assert!(documents.as_array().unwrap().is_empty());

    let req = test::TestRequest::get().uri("/api/documents").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_closed_or_unknown_session_is_not_found() {
    let state = state();
    let app = init_app!(state);
    let session = open_session!(app, "receipt");
    let id = session["id"].as_str().unwrap();

    let req = test::TestRequest::delete()
        .uri(&format!("/api/sessions/{}", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    for uri in [
        format!("/api/sessions/{}", id),
        format!("/api/sessions/{}/preview", id),
        format!("/api/sessions/{}", uuid::Uuid::new_v4()),
    ] {
        let req = test::TestRequest::get().uri(&uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}
