// src/models/track.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::models::{
    progress::UserProgress,
    quiz::{PublicQuestion, Quiz},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Difficulty {
    #[serde(alias = "Beginner")]
    Beginner,
    #[serde(alias = "Intermediate")]
    Intermediate,
    #[serde(alias = "Advanced")]
    Advanced,
}

impl Difficulty {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    /// Case-insensitive parse of the three level names.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents the 'learning_tracks' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LearningTrack {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub total_days: i64,
    pub is_active: bool,
    pub learning_objectives: Json<Vec<String>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'track_days' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TrackDay {
    pub id: i64,
    pub track_id: i64,
    /// 1-based, unique within the track.
    pub day_number: i64,
    pub topic: String,
    pub content: String,
}

/// One day of a track together with its quiz.
#[derive(Debug, Clone, Serialize)]
pub struct Lesson {
    pub day: TrackDay,
    pub quiz: Quiz,
}

/// A stored track with every day, ordered by day number.
#[derive(Debug, Clone, Serialize)]
pub struct Curriculum {
    pub track: LearningTrack,
    pub lessons: Vec<Lesson>,
}

impl Curriculum {
    pub fn lesson(&self, day_number: i64) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.day.day_number == day_number)
    }

    /// Strips answers and explanations for delivery to a learner.
    pub fn to_public(&self) -> PublicCurriculum {
        PublicCurriculum {
            track: self.track.clone(),
            days: self
                .lessons
                .iter()
                .map(|lesson| PublicLesson {
                    day_number: lesson.day.day_number,
                    topic: lesson.day.topic.clone(),
                    content: lesson.day.content.clone(),
                    quiz_title: lesson.quiz.title.clone(),
                    passing_score: lesson.quiz.passing_score,
                    questions: lesson.quiz.questions.iter().map(PublicQuestion::from).collect(),
                })
                .collect(),
        }
    }
}

/// DTO for sending a track to the client (excludes answers).
#[derive(Debug, Serialize)]
pub struct PublicCurriculum {
    #[serde(flatten)]
    pub track: LearningTrack,
    pub days: Vec<PublicLesson>,
}

#[derive(Debug, Serialize)]
pub struct PublicLesson {
    pub day_number: i64,
    pub topic: String,
    pub content: String,
    pub quiz_title: String,
    pub passing_score: i64,
    pub questions: Vec<PublicQuestion>,
}

/// Validated curriculum ready to be persisted in one transaction.
#[derive(Debug, Clone)]
pub struct NewCurriculum {
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub learning_objectives: Vec<String>,
    pub days: Vec<NewDay>,
}

#[derive(Debug, Clone)]
pub struct NewDay {
    pub day_number: i64,
    pub topic: String,
    pub content: String,
    pub quiz: crate::models::quiz::NewQuiz,
}

/// DTO for requesting a generated track.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateTrackRequest {
    #[validate(length(min = 1, max = 200))]
    pub topic: String,
    pub difficulty: Difficulty,
    #[validate(range(min = 1, max = 30))]
    pub total_days: Option<i64>,
}

/// One row of `GET /tracks`: a progress record joined with its track.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TrackSummary {
    pub track_id: i64,
    pub title: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub current_day: i64,
    pub total_days: i64,
    pub status: crate::models::progress::ProgressStatus,
    pub overall_progress: f64,
    pub average_quiz_score: f64,
    pub last_accessed_at: chrono::DateTime<chrono::Utc>,
}

/// Response body pairing a track with the caller's progress on it.
#[derive(Debug, Serialize)]
pub struct TrackWithProgress {
    pub track: PublicCurriculum,
    pub progress: UserProgress,
}
