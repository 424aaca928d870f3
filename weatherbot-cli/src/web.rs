//! Single-page browser chat backed by in-memory sessions.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;
use weatherbot_core::{Agent, Config, ConversationTurn, SessionStore, ToolInvocation};

const INDEX_HTML: &str = include_str!("../assets/index.html");

pub struct AppState {
    /// The agent, or the message explaining why chat is unavailable.
    agent: Result<Agent, String>,
    sessions: SessionStore,
}

impl AppState {
    pub fn new(agent: Result<Agent, String>, sessions: SessionStore) -> Self {
        Self { agent, sessions }
    }

    fn agent(&self) -> Result<&Agent, ApiError> {
        self.agent
            .as_ref()
            .map_err(|msg| ApiError(StatusCode::SERVICE_UNAVAILABLE, msg.clone()))
    }
}

#[derive(Debug, Serialize)]
struct Transcript {
    id: Uuid,
    turns: Vec<ConversationTurn>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    steps: Vec<ToolInvocation>,
}

#[derive(Debug, Serialize)]
struct Status {
    ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewMessage {
    content: String,
}

#[derive(Debug)]
struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(status))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/messages", post(post_message))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(bind: SocketAddr, config: &Config) -> anyhow::Result<()> {
    let agent = Agent::from_config(config).map_err(|err| {
        warn!("Chat disabled: {err:#}");
        err.to_string()
    });
    let sessions = SessionStore::new(config.session_ttl());
    let app = router(Arc::new(AppState::new(agent, sessions)));

    let listener =
        TcpListener::bind(bind).await.with_context(|| format!("Failed to bind {bind}"))?;
    info!("Weather chatbot listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server failed")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn status(State(state): State<Arc<AppState>>) -> Json<Status> {
    Json(match &state.agent {
        Ok(_) => Status { ready: true, message: None },
        Err(msg) => Status { ready: false, message: Some(msg.clone()) },
    })
}

async fn create_session(State(state): State<Arc<AppState>>) -> Result<Json<Transcript>, ApiError> {
    state.agent()?;
    let id = state.sessions.create().await;
    Ok(Json(Transcript { id, turns: Vec::new(), steps: Vec::new() }))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Transcript>, ApiError> {
    let session = state.sessions.get(id).await.ok_or_else(|| unknown_session(id))?;

    Ok(Json(Transcript { id, turns: session.transcript().await, steps: Vec::new() }))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(unknown_session(id))
    }
}

async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(message): Json<NewMessage>,
) -> Result<Json<Transcript>, ApiError> {
    let agent = state.agent()?;
    let session = state.sessions.get(id).await.ok_or_else(|| unknown_session(id))?;

    let content = message.content.trim();
    if content.is_empty() {
        return Err(ApiError(StatusCode::BAD_REQUEST, "Message is empty".to_string()));
    }

    let outcome = session.exchange(agent, content).await.map_err(|err| {
        warn!(session = %id, "Chat turn failed: {err:#}");
        ApiError(StatusCode::BAD_GATEWAY, format!("{err:#}"))
    })?;

    Ok(Json(Transcript { id, turns: session.transcript().await, steps: outcome.steps }))
}

fn unknown_session(id: Uuid) -> ApiError {
    ApiError(StatusCode::NOT_FOUND, format!("Unknown session {id}"))
}
