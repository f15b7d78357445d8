// src/models/progress.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
    Paused,
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Paused => "paused",
        })
    }
}

/// A day the learner passed, with the score that passed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayCompletion {
    pub day_number: i64,
    pub score: i64,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'user_progress' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserProgress {
    pub id: i64,
    pub user_id: String,
    pub track_id: i64,
    /// Never decreases; stays at the last day once the track is completed.
    pub current_day: i64,
    pub completed_days: Json<Vec<DayCompletion>>,
    /// `days completed / total days * 100`.
    pub overall_progress: f64,
    pub average_quiz_score: f64,
    pub status: ProgressStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_accessed_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl UserProgress {
    pub fn is_day_completed(&self, day_number: i64) -> bool {
        self.completed_days.iter().any(|d| d.day_number == day_number)
    }

    pub fn is_completed(&self) -> bool {
        self.status == ProgressStatus::Completed
    }
}

/// DTO for `POST /tracks/{id}/days/{n}/complete`.
#[derive(Debug, Deserialize, Validate)]
pub struct CompleteDayRequest {
    #[validate(range(min = 0, max = 100))]
    pub score: i64,
}
