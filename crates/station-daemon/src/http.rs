//! HTTP surface of the daemon.
//!
//! Routes:
//!   GET  /api/radio         → WebSocket push channel (ws.rs)
//!   GET  /api/radio-state   → current playhead snapshot
//!   POST /api/radio-state   → admin action `{"action":"toggle"}`
//!   GET  /api/listeners     → `{"count":N,"timestamp":ms}`
//!   GET  /api/music         → track bytes, Range aware (media.rs)

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use station_proto::playlist::Playlist;
use station_proto::protocol::{AdminAction, AdminRequest, ListenerCount, RadioState};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::media;
use crate::presence::PresenceTracker;
use crate::scheduler::Scheduler;
use crate::ws;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub presence: Arc<PresenceTracker>,
    pub playlist: Arc<Playlist>,
    pub library_dir: Arc<PathBuf>,
    pub trust_proxy_headers: bool,
    pub heartbeat_interval: Duration,
}

pub fn router(state: AppState) -> Router {
    let listeners_cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/api/radio", get(ws::radio_websocket))
        .route("/api/radio-state", get(radio_state).post(admin_action))
        .route(
            "/api/listeners",
            get(listener_count).layer(listeners_cors),
        )
        .route("/api/music", get(media::serve_track))
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    bind_address: &str,
    port: u16,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", bind_address, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", addr, e))?;
    info!("HTTP API listening on http://{}", addr);

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}

async fn snapshot(state: &AppState) -> RadioState {
    let listeners = state.presence.count().await;
    state.scheduler.get_state().await.with_listener_count(listeners)
}

async fn radio_state(State(state): State<AppState>) -> Json<RadioState> {
    Json(snapshot(&state).await)
}

async fn admin_action(
    State(state): State<AppState>,
    body: Result<Json<AdminRequest>, JsonRejection>,
) -> ApiResult<Json<RadioState>> {
    let Json(request) = body.map_err(|e| ApiError::InvalidBody(e.body_text()))?;

    match request.parse() {
        Some(AdminAction::Toggle) => {
            state.scheduler.toggle_play_pause().await;
            Ok(Json(snapshot(&state).await))
        }
        None => Err(ApiError::InvalidAction(request.raw_action())),
    }
}

async fn listener_count(State(state): State<AppState>) -> Response {
    let body = ListenerCount {
        count: state.presence.count().await,
        timestamp: chrono::Utc::now().timestamp_millis(),
    };

    let mut response = Json(body).into_response();
    let h = response.headers_mut();
    h.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    response
}
