// src/handlers/tracks.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::{AppError, TrackError},
    models::{
        progress::CompleteDayRequest,
        track::{GenerateTrackRequest, TrackWithProgress},
    },
    state::AppState,
    utils::jwt::Claims,
};

/// Generate a new track for the caller and start it.
pub async fn generate_track(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<GenerateTrackRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let curriculum = state.generator.generate(&payload).await?;
    let progress = state
        .progress
        .get_or_create(&claims.sub, curriculum.track.id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(TrackWithProgress {
            track: curriculum.to_public(),
            progress,
        }),
    ))
}

/// The caller's tracks with progress, most recently used first.
pub async fn list_tracks(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let tracks = state.progress.list_for_user(&claims.sub).await?;
    Ok(Json(json!({ "tracks": tracks })))
}

/// Every active track, whether or not the caller has started it.
pub async fn list_catalog(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let tracks = state.curriculum.list_active().await?;
    Ok(Json(json!({ "tracks": tracks })))
}

/// A track's full content (answers hidden) plus the caller's progress,
/// which is created on first access.
pub async fn get_track(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(track_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let curriculum = state.curriculum.get_curriculum(track_id).await?;
    let progress = state.progress.get_or_create(&claims.sub, track_id).await?;

    Ok(Json(TrackWithProgress {
        track: curriculum.to_public(),
        progress,
    }))
}

/// Record a passed day directly, without going through a session.
pub async fn complete_day(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((track_id, day_number)): Path<(i64, i64)>,
    Json(payload): Json<CompleteDayRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let progress = state
        .progress
        .advance(&claims.sub, track_id, day_number, payload.score)
        .await?;
    Ok(Json(json!({ "progress": progress })))
}

pub async fn pause_track(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(track_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let progress = state.progress.pause(&claims.sub, track_id).await?;
    Ok(Json(json!({ "progress": progress })))
}

/// The caller's recorded attempts on one day's quiz, oldest first.
pub async fn list_attempts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((track_id, day_number)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let lesson = state
        .curriculum
        .get_lesson(track_id, day_number)
        .await?
        .ok_or(TrackError::MissingDay {
            track_id,
            day: day_number,
        })?;
    let attempts = state.attempts.list(&claims.sub, lesson.quiz.id).await?;

    Ok(Json(json!({
        "quiz_id": lesson.quiz.id,
        "allowed": lesson.quiz.attempt_cap(),
        "attempts": attempts,
    })))
}
