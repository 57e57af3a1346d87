use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower::ServiceExt;

use repairdesk::catalog::Catalog;
use repairdesk::config::AppConfig;
use repairdesk::handlers;
use repairdesk::services::calling::CallProvider;
use repairdesk::state::AppState;

// ── Mock call provider ──

struct MockCallProvider {
    dialed: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl CallProvider for MockCallProvider {
    async fn place_call(&self, to: &str) -> anyhow::Result<()> {
        self.dialed.lock().unwrap().push(to.to_string());
        Ok(())
    }
}

// ── Helpers ──

fn test_config(ttl_minutes: i64) -> AppConfig {
    AppConfig {
        port: 3000,
        catalog_path: None,
        session_ttl_minutes: ttl_minutes,
        twilio_account_sid: String::new(),
        twilio_auth_token: String::new(),
        twilio_phone_number: String::new(),
    }
}

fn test_state(ttl_minutes: i64) -> (Arc<AppState>, Arc<Mutex<Vec<String>>>) {
    let dialed = Arc::new(Mutex::new(vec![]));
    let (chat_tx, _) = broadcast::channel(64);
    let state = Arc::new(AppState {
        sessions: Mutex::new(HashMap::new()),
        catalog: Catalog {
            cars: vec!["Toyota Corolla".to_string(), "Honda Civic".to_string()],
            issues: vec!["Brakes".to_string(), "Engine".to_string()],
        },
        config: test_config(ttl_minutes),
        caller: Box::new(MockCallProvider {
            dialed: Arc::clone(&dialed),
        }),
        chat_tx,
    });
    (state, dialed)
}

fn test_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::chat::chat_page))
        .route("/health", get(handlers::health::health))
        .route("/api/chat/session", post(handlers::chat::create_session))
        .route("/api/chat/:id", get(handlers::chat::get_session))
        .route("/api/chat/:id/message", post(handlers::chat::send_message))
        .route("/api/chat/:id/option", post(handlers::chat::click_option))
        .route("/api/chat/:id/summary", get(handlers::chat::get_summary))
        .route("/api/chat/:id/call", post(handlers::chat::call_customer))
        .route("/api/chat/:id/events", get(handlers::chat::events_stream))
        .with_state(state)
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn request_json(
    state: &Arc<AppState>,
    req: Request<Body>,
) -> (StatusCode, serde_json::Value) {
    let res = test_app(Arc::clone(state)).oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn create_session(state: &Arc<AppState>) -> String {
    let (status, json) = request_json(
        state,
        post_json("/api/chat/session", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["session_id"].as_str().unwrap().to_string()
}

async fn submit(state: &Arc<AppState>, id: &str, text: &str) -> serde_json::Value {
    let (status, json) = request_json(
        state,
        post_json(
            &format!("/api/chat/{id}/message"),
            serde_json::json!({ "text": text }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json
}

async fn click(state: &Arc<AppState>, id: &str, option: &str) -> serde_json::Value {
    let (status, json) = request_json(
        state,
        post_json(
            &format!("/api/chat/{id}/option"),
            serde_json::json!({ "option": option }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json
}

fn last_message_text(session: &serde_json::Value) -> String {
    session["messages"]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m["text"].as_str())
        .unwrap_or_default()
        .to_string()
}

// ── Basic surface ──

#[tokio::test]
async fn test_health() {
    let (state, _) = test_state(30);
    let (status, json) = request_json(&state, get_request("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_chat_page_serves_html() {
    let (state, _) = test_state(30);
    let res = test_app(state)
        .oneshot(get_request("/"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("<!DOCTYPE html>"));
    assert!(text.contains("Repair Desk"));
}

#[tokio::test]
async fn test_create_session_starts_at_car_step() {
    let (state, _) = test_state(30);
    let (status, json) = request_json(
        &state,
        post_json("/api/chat/session", serde_json::json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["step"], "car");
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["sender"], "bot");
    assert!(messages[0]["text"]
        .as_str()
        .unwrap()
        .contains("enter the car model"));
}

#[tokio::test]
async fn test_unknown_session_not_found() {
    let (state, _) = test_state(30);
    let (status, json) = request_json(&state, get_request("/api/chat/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("session not found"));
}

#[tokio::test]
async fn test_expired_session_is_gone() {
    let (state, _) = test_state(0);
    let id = create_session(&state).await;

    let (status, json) = request_json(&state, get_request(&format!("/api/chat/{id}"))).await;
    assert_eq!(status, StatusCode::GONE);
    assert!(json["error"].as_str().unwrap().contains("session expired"));
}

// ── Wizard flow over HTTP ──

#[tokio::test]
async fn test_unknown_car_keeps_session_on_car_step() {
    let (state, _) = test_state(30);
    let id = create_session(&state).await;

    let session = submit(&state, &id, "Zeppelin").await;
    assert_eq!(session["step"], "car");
    assert!(last_message_text(&session).contains("No matching car models found"));
}

#[tokio::test]
async fn test_issue_option_clicks_toggle_selection() {
    let (state, _) = test_state(30);
    let id = create_session(&state).await;
    submit(&state, &id, "Toyota Corolla").await;

    let session = click(&state, &id, "Brakes").await;
    assert_eq!(session["selected_issues"], serde_json::json!(["Brakes"]));

    let session = click(&state, &id, "Brakes").await;
    assert_eq!(session["selected_issues"], serde_json::json!([]));
}

#[tokio::test]
async fn test_full_wizard_walkthrough() {
    let (state, _) = test_state(30);
    let id = create_session(&state).await;

    let session = submit(&state, &id, "toyota corolla").await;
    assert_eq!(session["step"], "issues");
    assert!(last_message_text(&session).contains("Identified: Toyota Corolla"));

    click(&state, &id, "Brakes").await;
    let session = submit(&state, &id, "").await;
    assert_eq!(session["step"], "customer_name");

    let session = submit(&state, &id, "Jane").await;
    assert_eq!(session["step"], "customer_mobile");

    let session = submit(&state, &id, "555-1234").await;
    assert_eq!(session["step"], "priorities");

    let session = submit(&state, &id, "1").await;
    assert_eq!(session["step"], "estimated_time");

    let session = submit(&state, &id, "2 days").await;
    assert_eq!(session["step"], "repair_status");
    assert!(last_message_text(&session).contains("Set the repair status for Brakes"));

    let session = click(&state, &id, "completed").await;
    assert_eq!(session["step"], "select_issue");

    let session = click(&state, &id, "done").await;
    assert_eq!(session["step"], "new_issues");

    let session = click(&state, &id, "no").await;
    assert_eq!(session["step"], "complete");

    let (status, json) = request_json(
        &state,
        get_request(&format!("/api/chat/{id}/summary")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["complete"], true);
    let summary = json["summary"].as_str().unwrap();
    assert!(summary.contains("Car model: Toyota Corolla"));
    assert!(summary.contains("Customer name: Jane"));
    assert!(summary.contains("Brakes (priority 1): completed"));
}

#[tokio::test]
async fn test_summary_before_completion() {
    let (state, _) = test_state(30);
    let id = create_session(&state).await;
    submit(&state, &id, "Toyota Corolla").await;

    let (status, json) = request_json(
        &state,
        get_request(&format!("/api/chat/{id}/summary")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["complete"], false);
    assert!(json.get("summary").is_none());
}

// ── Customer call ──

#[tokio::test]
async fn test_call_requires_recorded_number() {
    let (state, dialed) = test_state(30);
    let id = create_session(&state).await;

    let (status, json) = request_json(
        &state,
        post_json(&format!("/api/chat/{id}/call"), serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("no customer contact number"));
    assert!(dialed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_call_dials_recorded_number() {
    let (state, dialed) = test_state(30);
    let id = create_session(&state).await;

    submit(&state, &id, "Toyota Corolla").await;
    click(&state, &id, "Engine").await;
    submit(&state, &id, "").await;
    submit(&state, &id, "Jane").await;
    submit(&state, &id, "555-1234").await;

    let (status, json) = request_json(
        &state,
        post_json(&format!("/api/chat/{id}/call"), serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(dialed.lock().unwrap().as_slice(), ["555-1234".to_string()]);
}
