// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    MultipleChoice,
    TrueFalse,
    FillBlank,
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub day_id: i64,
    pub title: String,
    /// Minimum percentage (0-100) needed to pass.
    pub passing_score: i64,
    pub allow_retakes: bool,
    pub max_attempts: i64,
    /// Ordered by position; loaded separately.
    #[sqlx(skip)]
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    /// Number of attempts a learner gets on this quiz.
    pub fn attempt_cap(&self) -> i64 {
        if self.allow_retakes {
            self.max_attempts.max(1)
        } else {
            1
        }
    }
}

/// Represents the 'quiz_questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i64,
    pub quiz_id: i64,
    pub position: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    /// Stored as a JSON array in the database.
    pub options: Json<Vec<String>>,
    /// Canonical answer value compared against submissions.
    pub correct_answer: String,
    pub explanation: String,
}

/// DTO for sending a question to the client (excludes answer and explanation).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub position: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
}

impl From<&QuizQuestion> for PublicQuestion {
    fn from(q: &QuizQuestion) -> Self {
        Self {
            id: q.id,
            position: q.position,
            question_text: q.question_text.clone(),
            question_type: q.question_type,
            options: q.options.0.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub title: String,
    pub passing_score: i64,
    pub allow_retakes: bool,
    pub max_attempts: i64,
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}

/// One answered question inside a quiz attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: i64,
    pub selected: String,
    pub is_correct: bool,
}

/// Represents the 'quiz_results' table: one row per completed attempt.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizResult {
    pub id: i64,
    pub user_id: String,
    pub quiz_id: i64,
    pub attempt_number: i64,
    pub correct_count: i64,
    pub total_count: i64,
    pub score: i64,
    pub passed: bool,
    pub answers: Json<Vec<AnswerRecord>>,
    /// Seconds between starting the attempt and its last answer.
    pub time_spent_secs: i64,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}
