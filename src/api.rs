use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::header,
    response::{sse::Sse, IntoResponse},
    routing::get,
    Json, Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::config::RelayConfig;
use crate::feed::{FeedSource, HnFeedClient};
use crate::scheduler::DeltaScheduler;
use crate::seen::SeenSet;
use crate::session::SessionManager;
use crate::stats::stats_stream;
use crate::stream::sse_stream;

#[derive(Clone)]
pub struct AppState {
    pub seen: Arc<SeenSet>,
    pub sessions: Arc<SessionManager>,
    pub stats_interval: Duration,
    pub ui_dir: String,
}

impl AppState {
    /// Production wiring: Hacker News over HTTP.
    pub fn from_config(cfg: &RelayConfig) -> Self {
        let feed = HnFeedClient::new(cfg.feed_base_url.clone()).with_timeout(cfg.request_timeout());
        Self::with_feed(Arc::new(feed), cfg)
    }

    /// Same wiring around any feed (fixtures in tests).
    pub fn with_feed(feed: Arc<dyn FeedSource>, cfg: &RelayConfig) -> Self {
        let seen = Arc::new(SeenSet::new());
        let scheduler = DeltaScheduler::new(feed, Arc::clone(&seen), cfg.scheduler());
        Self {
            seen,
            sessions: SessionManager::new(scheduler, cfg.sink()),
            stats_interval: cfg.stats_interval(),
            ui_dir: cfg.ui_dir.clone(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let ui = ServeDir::new(&state.ui_dir);
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/hn-events", get(hn_events))
        .route("/stats", get(stats))
        .route("/debug/seen", get(debug_seen))
        .fallback_service(ui)
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn hn_events(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.sessions.open();
    (
        [(header::CONNECTION, "keep-alive")],
        Sse::new(sse_stream(session.events)),
    )
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONNECTION, "keep-alive")],
        Sse::new(stats_stream(state.stats_interval)),
    )
}

#[derive(serde::Serialize)]
struct SeenInfo {
    seen: usize,
    sessions: usize,
}

async fn debug_seen(State(state): State<AppState>) -> Json<SeenInfo> {
    Json(SeenInfo {
        seen: state.seen.len(),
        sessions: state.sessions.active_sessions(),
    })
}
