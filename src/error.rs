// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Why a track generation was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationFailure {
    /// The generator could not be reached, timed out, or is not configured.
    UpstreamUnavailable,
    /// The generator answered with something that is not a valid curriculum.
    InvalidSchema,
    /// The generator answered with nothing usable.
    EmptyResult,
}

impl GenerationFailure {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::InvalidSchema => "invalid_schema",
            Self::EmptyResult => "empty_result",
        }
    }
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the curriculum, progress, quiz and session layers.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("track generation failed ({reason}): {detail}")]
    Generation {
        reason: GenerationFailure,
        detail: String,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("day {submitted} cannot be completed, current day is {current}")]
    StaleDay { current: i64, submitted: i64 },

    #[error("score {score} is below the passing score of {passing_score}")]
    ScoreBelowThreshold { score: i64, passing_score: i64 },

    #[error("quiz {quiz_id} allows {allowed} attempt(s) and all have been used")]
    AttemptsExhausted { quiz_id: i64, allowed: i64 },

    #[error("track {track_id} has no content for day {day}")]
    MissingDay { track_id: i64, day: i64 },

    #[error("cannot {action} while the session is {state}")]
    InvalidState { state: String, action: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("record store unavailable after {attempts} attempts")]
    StoreUnavailable { attempts: u32 },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl TrackError {
    pub fn generation(reason: GenerationFailure, detail: impl Into<String>) -> Self {
        Self::Generation {
            reason,
            detail: detail.into(),
        }
    }

    pub fn invalid_state(state: impl fmt::Display, action: impl Into<String>) -> Self {
        Self::InvalidState {
            state: state.to_string(),
            action: action.into(),
        }
    }

    /// Stable machine-readable code returned in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Generation { reason, .. } => reason.as_str(),
            Self::NotFound(_) => "not_found",
            Self::StaleDay { .. } => "stale_day",
            Self::ScoreBelowThreshold { .. } => "score_below_threshold",
            Self::AttemptsExhausted { .. } => "attempts_exhausted",
            Self::MissingDay { .. } => "missing_day",
            Self::InvalidState { .. } => "invalid_state",
            Self::InvalidInput(_) => "invalid_input",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::Database(_) => "internal_error",
        }
    }

    /// Store failures worth retrying: pool exhaustion, I/O, and SQLite lock
    /// contention.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => true,
            Self::Database(sqlx::Error::Database(db)) => {
                let message = db.message().to_ascii_lowercase();
                message.contains("database is locked") || message.contains("busy")
            }
            _ => false,
        }
    }

    /// Store failures that retrying cannot fix: the pool has been closed or
    /// its worker is gone.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::Database(sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed)
        )
    }
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // Domain errors carry their own status and code.
    Track(TrackError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

fn track_status(err: &TrackError) -> StatusCode {
    match err {
        TrackError::Generation { reason, .. } => match reason {
            GenerationFailure::InvalidSchema => StatusCode::UNPROCESSABLE_ENTITY,
            GenerationFailure::UpstreamUnavailable | GenerationFailure::EmptyResult => {
                StatusCode::BAD_GATEWAY
            }
        },
        TrackError::NotFound(_) => StatusCode::NOT_FOUND,
        TrackError::StaleDay { .. }
        | TrackError::InvalidState { .. }
        | TrackError::MissingDay { .. } => StatusCode::CONFLICT,
        TrackError::ScoreBelowThreshold { .. } | TrackError::AttemptsExhausted { .. } => {
            StatusCode::FORBIDDEN
        }
        TrackError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        TrackError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        TrackError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_input", msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AppError::Track(err) => {
                let status = track_status(&err);
                if status.is_server_error() {
                    tracing::error!("Request failed: {}", err);
                } else {
                    tracing::debug!("Request rejected: {}", err);
                }
                let message = match &err {
                    TrackError::Database(_) => "Internal Server Error".to_string(),
                    other => other.to_string(),
                };
                (status, err.code(), message)
            }
        };
        let body = Json(json!({
            "error": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<TrackError> for AppError {
    fn from(err: TrackError) -> Self {
        AppError::Track(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
