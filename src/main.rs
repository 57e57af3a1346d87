use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use repairdesk::catalog::Catalog;
use repairdesk::config::AppConfig;
use repairdesk::handlers;
use repairdesk::services::calling::twilio::TwilioVoiceProvider;
use repairdesk::services::calling::{CallProvider, LogCallProvider};
use repairdesk::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let catalog = Catalog::load(config.catalog_path.as_deref())?;
    tracing::info!(
        cars = catalog.cars.len(),
        issues = catalog.issues.len(),
        "catalog loaded"
    );

    let caller: Box<dyn CallProvider> = if config.twilio_account_sid.is_empty() {
        tracing::info!("Twilio not configured, customer calls will be logged only");
        Box::new(LogCallProvider)
    } else {
        tracing::info!("using Twilio voice call provider");
        Box::new(TwilioVoiceProvider::new(
            config.twilio_account_sid.clone(),
            config.twilio_auth_token.clone(),
            config.twilio_phone_number.clone(),
        ))
    };

    let (chat_tx, _) = broadcast::channel(256);

    let state = Arc::new(AppState {
        sessions: Mutex::new(HashMap::new()),
        catalog,
        config: config.clone(),
        caller,
        chat_tx,
    });

    let app = Router::new()
        .route("/", get(handlers::chat::chat_page))
        .route("/health", get(handlers::health::health))
        .route("/api/chat/session", post(handlers::chat::create_session))
        .route("/api/chat/:id", get(handlers::chat::get_session))
        .route("/api/chat/:id/message", post(handlers::chat::send_message))
        .route("/api/chat/:id/option", post(handlers::chat::click_option))
        .route("/api/chat/:id/summary", get(handlers::chat::get_summary))
        .route("/api/chat/:id/call", post(handlers::chat::call_customer))
        .route("/api/chat/:id/events", get(handlers::chat::events_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
