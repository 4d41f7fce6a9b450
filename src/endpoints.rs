//! HTTP endpoints and router assembly.
//!
//! Two path spaces: the game protocol under `/lbp` (digest-stamped for the
//! legacy clients) and the management API under `/api/v3` (plain JSON,
//! never digest-stamped).

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::digest::{stamp_digest, AlgorithmFamily};
use crate::state::AppState;

/// Build the full application router. The digest layer wraps everything and
/// decides activation by path, so game and management routes can live in one
/// router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/lbp/eula", get(eula_handler))
        .route("/lbp/announce", get(announce_handler))
        .route("/api/v3/instance", get(instance_handler))
        .route("/api/v3/statistics", get(statistics_handler))
        .route(
            "/api/v3/playlists/:playlist_id/levels",
            get(playlist_levels_handler).post(add_playlist_level_handler),
        )
        .route(
            "/api/v3/users/:user_id/uploads",
            get(user_uploads_handler).post(record_user_upload_handler),
        )
        .layer(from_fn_with_state(state.clone(), stamp_digest))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Game Routes ───────────────────────────────────────────────────────────

/// License text the client shows on first connect.
async fn eula_handler() -> &'static str {
    "This server is a community instance. By connecting you agree to the \
     community guidelines published by the operator.\n"
}

/// Announcement text the client shows after signing in.
async fn announce_handler() -> &'static str {
    "Welcome back! This instance is operated independently of the original \
     publisher.\n"
}

// ── Management Routes ─────────────────────────────────────────────────────

/// Instance metadata. Key material is reported as counts only.
async fn instance_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": "lantern",
        "version": env!("CARGO_PKG_VERSION"),
        "sha1_digest_keys": state.digest_keys.key_count(AlgorithmFamily::Plain),
        "hmac_digest_keys": state.digest_keys.key_count(AlgorithmFamily::Keyed),
        "max_daily_level_uploads": state.config.max_daily_level_uploads,
    }))
}

/// Store counters.
async fn statistics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "playlist_relations": state.playlists.relation_count(),
        "tracked_upload_users": state.daily_uploads.tracked_users(),
    }))
}

/// Levels contained in a playlist, in order.
async fn playlist_levels_handler(
    State(state): State<AppState>,
    Path(playlist_id): Path<i32>,
) -> impl IntoResponse {
    Json(state.playlists.levels_in(playlist_id))
}

#[derive(Deserialize)]
struct AddLevelRequest {
    level_id: i32,
}

/// Add a level to a playlist.
async fn add_playlist_level_handler(
    State(state): State<AppState>,
    Path(playlist_id): Path<i32>,
    Json(request): Json<AddLevelRequest>,
) -> impl IntoResponse {
    if state.playlists.add(playlist_id, request.level_id) {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

/// A user's current-window upload counter.
async fn user_uploads_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> impl IntoResponse {
    Json(state.daily_uploads.get(user_id))
}

/// Record one upload for a user, refusing past the daily cap.
async fn record_user_upload_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> impl IntoResponse {
    let max = state.config.max_daily_level_uploads as i32;
    if state.daily_uploads.current_count(user_id) >= max {
        tracing::debug!(user_id, max, "Daily upload limit reached");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "daily upload limit reached", "max": max })),
        );
    }

    let count = state.daily_uploads.record_upload(user_id);
    (StatusCode::OK, Json(json!({ "count": count, "max": max })))
}
