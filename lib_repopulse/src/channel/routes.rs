use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::channel::{broadcaster, page};
use crate::github::fetcher::RemoteFetcher;
use crate::projects::ProjectRegistry;

/// Per-channel tuning.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Triggers that may wait while a fetch is in flight. Extras are dropped.
    pub trigger_queue: usize,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self { trigger_queue: 16 }
    }
}

/// Read-only state shared by every handler and channel.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Projects to report on, fixed at startup.
    pub registry: Arc<ProjectRegistry>,
    /// Shared, stateless provider client.
    pub fetcher: Arc<RemoteFetcher>,
    /// Channel loop settings.
    pub options: ChannelOptions,
}

impl AppState {
    /// Bundles the shared components.
    pub fn new(registry: ProjectRegistry, fetcher: RemoteFetcher, options: ChannelOptions) -> Self {
        Self {
            registry: Arc::new(registry),
            fetcher: Arc::new(fetcher),
            options,
        }
    }
}

/// `GET /`, `GET /health` and `GET /ws`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(page::render_index(&state.registry))
}

async fn health_handler() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "OK")
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| broadcaster::handle_socket(socket, state))
}
