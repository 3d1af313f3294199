// HTTP routes: latest detection, detection log and liveness

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use moodcam_archive::{clamp_limit, newest_first, Archive, ArchiveError};
use moodcam_core::{LatestSlot, LatestState, LogEntry};
use moodcam_eye::LoopStatus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub latest: LatestSlot,
    pub archive: Arc<dyn Archive>,
    /// Hard cap on `/emotion-logs`, never above the store-wide maximum
    pub log_limit: usize,
    /// Absent when the server runs without a detection loop
    pub detection_loop: Option<LoopStatus>,
}

impl AppState {
    pub fn new(latest: LatestSlot, archive: Arc<dyn Archive>) -> Self {
        Self {
            latest,
            archive,
            log_limit: moodcam_archive::MAX_LOG_RECORDS,
            detection_loop: None,
        }
    }

    pub fn with_log_limit(mut self, limit: usize) -> Self {
        self.log_limit = limit.clamp(1, moodcam_archive::MAX_LOG_RECORDS);
        self
    }

    pub fn with_loop_status(mut self, status: LoopStatus) -> Self {
        self.detection_loop = Some(status);
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Any failure surfaced to a client; always a 500 with `{"error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Archive(#[from] ArchiveError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self);
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub detection_loop: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/emotion", get(latest_emotion_handler))
        .route("/emotion-logs", get(emotion_logs_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn latest_emotion_handler(State(state): State<AppState>) -> Json<LatestState> {
    let latest = state.latest.snapshot();
    Json(LatestState::clone(&latest))
}

async fn emotion_logs_handler(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    let limit = clamp_limit(query.limit).min(state.log_limit);
    let records = state.archive.recent_records(limit).await?;
    Ok(Json(newest_first(records, limit)))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let running = state
        .detection_loop
        .as_ref()
        .map(|status| status.is_running())
        .unwrap_or(false);

    Json(HealthResponse {
        status: "ok".to_string(),
        detection_loop: if running { "running" } else { "stopped" }.to_string(),
    })
}
