//! HTTP routes.
//!
//! Besides the WebSocket upgrade at `/ws`, the server answers a handful of
//! request/response calls that clients use before and after a match: name
//! and code checks before joining, the results export for the host, and a
//! quiz lookup.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use shared::{LeaderboardEntry, Quiz};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};

use crate::network::{ws_handler, TransportSettings};
use crate::registry::{LookupError, MatchRegistry};

/// State shared by every route.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<MatchRegistry>,
    pub transport: TransportSettings,
}

impl AppState {
    pub fn new(registry: MatchRegistry, transport: TransportSettings) -> Self {
        Self {
            registry: Arc::new(registry),
            transport,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckNameRequest {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckCodeRequest {
    pub code: String,
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always false
    pub success: bool,
    pub message: String,
    /// Machine-readable error code
    pub code: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("failed to export results: {0}")]
    Export(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Lookup(LookupError::MatchNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Lookup(LookupError::QuizNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Lookup(LookupError::NameTaken(_)) => StatusCode::CONFLICT,
            ApiError::Lookup(LookupError::AlreadyStarted(_)) => StatusCode::CONFLICT,
            ApiError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Lookup(LookupError::MatchNotFound(_)) => "MATCH_NOT_FOUND",
            ApiError::Lookup(LookupError::QuizNotFound(_)) => "QUIZ_NOT_FOUND",
            ApiError::Lookup(LookupError::NameTaken(_)) => "NAME_TAKEN",
            ApiError::Lookup(LookupError::AlreadyStarted(_)) => "ALREADY_STARTED",
            ApiError::Export(_) => "EXPORT_FAILED",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
            code: self.error_code().to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .route("/api/game/check-name", post(check_name))
        .route("/api/game/check", post(check_code))
        .route("/api/games/:code/export/csv", get(export_csv))
        .route("/api/quizzes/:id", get(get_quiz))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn check_name(
    State(state): State<AppState>,
    Json(request): Json<CheckNameRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .registry
        .check_name(&request.code, &request.name)
        .await?;
    Ok(StatusCode::OK)
}

async fn check_code(
    State(state): State<AppState>,
    Json(request): Json<CheckCodeRequest>,
) -> Result<StatusCode, ApiError> {
    state.registry.check_code(&request.code).await?;
    Ok(StatusCode::OK)
}

async fn export_csv(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    let results = state.registry.export_results(&code).await?;
    let body = results_csv(&results)?;

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"quiz_results_{}.csv\"", code),
        ),
    ];
    Ok((headers, body).into_response())
}

async fn get_quiz(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Quiz>, ApiError> {
    Ok(Json(state.registry.quiz(id)?))
}

/// Renders results as CSV, one row per player in the given order.
pub fn results_csv(results: &[LeaderboardEntry]) -> Result<Vec<u8>, ApiError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["Player Name", "Final Score", "Correct Answers"])
        .map_err(|e| ApiError::Export(e.to_string()))?;

    for entry in results {
        writer
            .write_record([
                entry.name.clone(),
                entry.points.to_string(),
                entry.correct_count.to_string(),
            ])
            .map_err(|e| ApiError::Export(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| ApiError::Export(e.to_string()))
}
