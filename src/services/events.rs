use crate::models::{ChatEvent, Message};
use crate::state::AppState;

/// Notify subscribers that a message was appended to a session's transcript.
pub fn record_chat_event(state: &AppState, session_id: &str, message: &Message) {
    let event = ChatEvent {
        session_id: session_id.to_string(),
        message: message.clone(),
    };
    // Broadcast to SSE subscribers; ignore if no receivers
    let _ = state.chat_tx.send(event);
}
