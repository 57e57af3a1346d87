use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::models::{ChatEvent, Conversation};
use crate::services::calling::CallProvider;

pub struct AppState {
    pub sessions: Mutex<HashMap<String, Conversation>>,
    pub catalog: Catalog,
    pub config: AppConfig,
    pub caller: Box<dyn CallProvider>,
    pub chat_tx: broadcast::Sender<ChatEvent>,
}
