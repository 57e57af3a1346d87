use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::response::Html;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;

use crate::errors::AppError;
use crate::models::{Conversation, Message, Step};
use crate::services::conversation;
use crate::state::AppState;

static CHAT_HTML: &str = include_str!("../web/chat.html");

pub async fn chat_page() -> Html<&'static str> {
    Html(CHAT_HTML)
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub step: String,
    pub messages: Vec<Message>,
    pub selected_issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_ranks: Option<String>,
}

fn session_response(conv: &Conversation) -> SessionResponse {
    SessionResponse {
        session_id: conv.id.clone(),
        step: conv.step.name().to_string(),
        messages: conv.messages.clone(),
        selected_issues: conv.selected_issues().to_vec(),
        pending_ranks: conv.pending_ranks(),
    }
}

/// Look up a session, dropping it when its idle TTL has lapsed.
fn fetch_live<'a>(
    sessions: &'a mut HashMap<String, Conversation>,
    id: &str,
) -> Result<&'a mut Conversation, AppError> {
    let now = chrono::Utc::now().naive_utc();
    if sessions.get(id).is_some_and(|c| c.is_expired(now)) {
        sessions.remove(id);
        tracing::debug!(session = id, "pruned expired session");
        return Err(AppError::SessionExpired(id.to_string()));
    }
    sessions
        .get_mut(id)
        .ok_or_else(|| AppError::SessionNotFound(id.to_string()))
}

// POST /api/chat/session
pub async fn create_session(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    let id = uuid::Uuid::new_v4().to_string();
    let conv = conversation::new_conversation(id.clone(), state.config.session_ttl_minutes);
    let response = session_response(&conv);

    let mut sessions = state.sessions.lock().unwrap();
    let now = chrono::Utc::now().naive_utc();
    sessions.retain(|_, c| !c.is_expired(now));
    sessions.insert(id.clone(), conv);
    tracing::info!(session = %id, open_sessions = sessions.len(), "session created");

    Json(response)
}

// GET /api/chat/:id
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let mut sessions = state.sessions.lock().unwrap();
    let conv = fetch_live(&mut sessions, &id)?;
    Ok(Json(session_response(conv)))
}

// POST /api/chat/:id/message
#[derive(Deserialize)]
pub struct SubmitRequest {
    pub text: String,
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SubmitRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let mut sessions = state.sessions.lock().unwrap();
    let conv = fetch_live(&mut sessions, &id)?;
    conversation::process_submit(&state, conv, &body.text);
    Ok(Json(session_response(conv)))
}

// POST /api/chat/:id/option
#[derive(Deserialize)]
pub struct OptionRequest {
    pub option: String,
}

pub async fn click_option(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<OptionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let mut sessions = state.sessions.lock().unwrap();
    let conv = fetch_live(&mut sessions, &id)?;
    conversation::process_option(&state, conv, &body.option);
    Ok(Json(session_response(conv)))
}

// GET /api/chat/:id/summary
#[derive(Serialize)]
pub struct SummaryResponse {
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SummaryResponse>, AppError> {
    let mut sessions = state.sessions.lock().unwrap();
    let conv = fetch_live(&mut sessions, &id)?;
    let complete = matches!(conv.step, Step::Complete);
    Ok(Json(SummaryResponse {
        complete,
        summary: complete.then(|| conversation::render_summary(conv)),
    }))
}

// POST /api/chat/:id/call
pub async fn call_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    // Copy the number out so the session lock is not held across the call.
    let to = {
        let mut sessions = state.sessions.lock().unwrap();
        let conv = fetch_live(&mut sessions, &id)?;
        if conv.repair.customer_mobile.is_empty() {
            return Err(AppError::BadRequest(
                "no customer contact number recorded yet".to_string(),
            ));
        }
        conv.repair.customer_mobile.clone()
    };

    state
        .caller
        .place_call(&to)
        .await
        .map_err(|e| AppError::Call(e.to_string()))?;

    tracing::info!(session = %id, "customer call placed");
    Ok(Json(serde_json::json!({ "ok": true })))
}

// GET /api/chat/:id/events (SSE stream of transcript appends)
pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    {
        let mut sessions = state.sessions.lock().unwrap();
        fetch_live(&mut sessions, &id)?;
    }

    let rx = state.chat_tx.subscribe();
    let session_id = id;

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) if event.session_id == session_id => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok::<_, Infallible>(
                Event::default().data(data).event("transcript"),
            ))
        }
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(_)) => None,
    });

    let keepalive_stream = IntervalStream::new(tokio::time::interval(Duration::from_secs(30)))
        .map(|_| Ok(Event::default().comment("keepalive")));

    Ok(Sse::new(StreamExt::merge(live_stream, keepalive_stream)))
}
