#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use onboard_api::config::ServerConfig;
use onboard_api::router::build_app_router;
use onboard_api::state::AppState;
use onboard_db::{DraftStore, MemoryDraftSlot};
use onboard_events::{
    CsvWorkbookExporter, EventBus, MemoryRecordStore, RecordingCrmSink, StaticPrefillResolver,
};
use onboard_session::{Collaborators, SessionRegistry, SessionSettings};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const PREFILL_TOKEN: &str = "tok-andes";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        database_url: None,
        crm_base_url: None,
        record_store_base_url: None,
        prefill_base_url: None,
        draft_debounce_ms: 10,
        draft_retention_days: 14,
    }
}

/// The application plus handles on its in-memory collaborators.
pub struct TestApp {
    pub router: Router,
    pub registry: Arc<SessionRegistry>,
    pub store: DraftStore,
    pub crm: Arc<RecordingCrmSink>,
    pub records: Arc<MemoryRecordStore>,
}

pub fn build_test_app() -> TestApp {
    build_test_app_with_crm(RecordingCrmSink::new())
}

/// Build the full application router over in-memory collaborators, using
/// the same middleware stack as production.
pub fn build_test_app_with_crm(crm: RecordingCrmSink) -> TestApp {
    let config = test_config();
    let store = DraftStore::new(Arc::new(MemoryDraftSlot::new()));
    let crm = Arc::new(crm);
    let records = Arc::new(MemoryRecordStore::new());

    let prefill = StaticPrefillResolver::new().with_record(
        PREFILL_TOKEN,
        json!({
            "razonSocial": "Andes SpA",
            "rut": "76.086.428-5",
            "rubro": "Servicios"
        }),
    );
    let collaborators = Collaborators {
        prefill: Arc::new(prefill),
        record_store: records.clone(),
        crm: crm.clone(),
        exporter: Arc::new(CsvWorkbookExporter),
        events: Arc::new(EventBus::default()),
    };
    let registry = Arc::new(SessionRegistry::new(
        store.clone(),
        collaborators,
        SessionSettings {
            debounce: Duration::from_millis(config.draft_debounce_ms),
        },
    ));

    let state = AppState {
        registry: Arc::clone(&registry),
        config: Arc::new(config.clone()),
        pool: None,
    };

    TestApp {
        router: build_app_router(state, &config),
        registry,
        store,
        crm,
        records,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Onboarding helpers
// ---------------------------------------------------------------------------

pub fn session_uri(key: &str, action: &str) -> String {
    if action.is_empty() {
        format!("/api/v1/onboarding/sessions/{key}")
    } else {
        format!("/api/v1/onboarding/sessions/{key}/{action}")
    }
}

/// Open a blank session and return its key.
pub async fn open_session(app: &TestApp) -> String {
    let response = post_json(app.router.clone(), "/api/v1/onboarding/sessions", json!({})).await;
    let json = body_json(response).await;
    json["data"]["session"]["sessionKey"]
        .as_str()
        .unwrap()
        .to_string()
}

pub fn company() -> Value {
    json!({
        "razonSocial": "Andes SpA",
        "nombreFantasia": "Andes",
        "rut": "76.086.428-5",
        "giro": "Servicios de aseo",
        "direccion": "Av. Providencia 1234",
        "comuna": "Providencia",
        "emailFacturacion": "facturas@andes.cl",
        "telefonoContacto": "+56222222222",
        "sistemaMarcaje": ["web"],
        "rubro": "Servicios"
    })
}

pub fn admin() -> Value {
    json!({
        "nombre": "Ana",
        "apellido": "Pérez",
        "rut": "12.345.678-5",
        "email": "ana@andes.cl",
        "telefono": "+56911111111"
    })
}

/// Drive a session to the summary step, choosing "later" at both decisions.
pub async fn walk_to_summary(app: &TestApp, key: &str) {
    let r = app.router.clone();
    post(r.clone(), &session_uri(key, "advance")).await;
    post(r.clone(), &session_uri(key, "advance")).await;
    put_json(
        r.clone(),
        &session_uri(key, "fields"),
        json!({"path": "company", "value": company()}),
    )
    .await;
    post(r.clone(), &session_uri(key, "advance")).await;
    put_json(
        r.clone(),
        &session_uri(key, "fields"),
        json!({"path": "admins", "value": [admin()]}),
    )
    .await;
    post(r.clone(), &session_uri(key, "advance")).await;
    post_json(r.clone(), &session_uri(key, "decision"), json!({"decision": "later"})).await;
    let response = post_json(r, &session_uri(key, "decision"), json!({"decision": "later"})).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["session"]["currentStep"], "summary");
}
