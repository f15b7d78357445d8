// src/handlers/sessions.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use validator::Validate;

use crate::{
    engine::TrackSelection,
    error::AppError,
    models::track::GenerateTrackRequest,
    state::AppState,
    utils::jwt::Claims,
};

/// Body of `POST /api/session/select`: exactly one of the two fields.
#[derive(Debug, Deserialize)]
pub struct SelectTrackRequest {
    pub track_id: Option<i64>,
    pub generate: Option<GenerateTrackRequest>,
}

impl SelectTrackRequest {
    fn into_selection(self) -> Result<TrackSelection, AppError> {
        match (self.track_id, self.generate) {
            (Some(track_id), None) => Ok(TrackSelection::Existing(track_id)),
            (None, Some(request)) => {
                request.validate()?;
                Ok(TrackSelection::New(request))
            }
            _ => Err(AppError::BadRequest(
                "provide exactly one of track_id or generate".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(length(max = 1000))]
    pub answer: String,
    pub question_index: Option<usize>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewDayRequest {
    #[validate(range(min = 1))]
    pub day: i64,
}

pub async fn get_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    Json(state.orchestrator.view(&claims.sub).await)
}

pub async fn abandon_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    Json(state.orchestrator.abandon(&claims.sub).await)
}

pub async fn select_track(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SelectTrackRequest>,
) -> Result<impl IntoResponse, AppError> {
    let selection = payload.into_selection()?;
    let view = state.orchestrator.select_track(&claims.sub, selection).await?;
    Ok(Json(view))
}

pub async fn present_lesson(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.orchestrator.present_lesson(&claims.sub).await?))
}

pub async fn begin_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.orchestrator.begin_quiz(&claims.sub).await?))
}

pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let outcome = state
        .orchestrator
        .submit_answer(&claims.sub, &payload.answer, payload.question_index)
        .await?;
    Ok(Json(outcome))
}

pub async fn evaluate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.orchestrator.evaluate(&claims.sub).await?))
}

pub async fn continue_track(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.orchestrator.continue_track(&claims.sub).await?))
}

pub async fn review_day(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ReviewDayRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    Ok(Json(state.orchestrator.review_day(&claims.sub, payload.day).await?))
}
