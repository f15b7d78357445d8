// src/store/attempts.rs

use chrono::Utc;
use sqlx::{SqlitePool, types::Json};

use crate::{
    engine::quiz::QuizAttempt,
    error::TrackError,
    models::quiz::QuizResult,
    store::retry::RetryPolicy,
};

const RESULT_COLUMNS: &str = r#"
    id, user_id, quiz_id, attempt_number, correct_count, total_count,
    score, passed, answers, time_spent_secs, submitted_at
"#;

/// Log of completed quiz attempts, used to enforce attempt caps.
#[derive(Clone)]
pub struct AttemptStore {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl AttemptStore {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// Number of completed attempts `user_id` has made on `quiz_id`.
    pub async fn count(&self, user_id: &str, quiz_id: i64) -> Result<i64, TrackError> {
        self.retry
            .run("count_attempts", move || async move {
                let count: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM quiz_results WHERE user_id = $1 AND quiz_id = $2",
                )
                .bind(user_id)
                .bind(quiz_id)
                .fetch_one(&self.pool)
                .await?;
                Ok(count)
            })
            .await
    }

    /// Records a finished attempt. Incomplete attempts are rejected.
    pub async fn record(&self, user_id: &str, attempt: &QuizAttempt) -> Result<QuizResult, TrackError> {
        if !attempt.is_complete() {
            return Err(TrackError::invalid_state("incomplete", "record a quiz attempt"));
        }
        let score = attempt.score();

        let result = self
            .retry
            .run("record_attempt", move || async move {
                let sql = format!(
                    r#"
                    INSERT INTO quiz_results
                        (user_id, quiz_id, attempt_number, correct_count, total_count, score, passed,
                         answers, time_spent_secs, submitted_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                    RETURNING {}
                    "#,
                    RESULT_COLUMNS
                );
                let result = sqlx::query_as::<_, QuizResult>(&sql)
                .bind(user_id)
                .bind(attempt.quiz_id())
                .bind(attempt.attempt_number())
                .bind(score.correct_count)
                .bind(score.total_count)
                .bind(score.percentage)
                .bind(score.passed)
                .bind(Json(attempt.answers()))
                .bind(attempt.time_spent_secs())
                .bind(Utc::now())
                .fetch_one(&self.pool)
                .await?;
                Ok(result)
            })
            .await?;

        tracing::info!(
            "User {} finished attempt {} on quiz {}: {}% ({}) in {}s",
            user_id,
            result.attempt_number,
            result.quiz_id,
            result.score,
            if result.passed { "passed" } else { "failed" },
            result.time_spent_secs
        );
        Ok(result)
    }

    /// Completed attempts for a quiz, oldest first.
    pub async fn list(&self, user_id: &str, quiz_id: i64) -> Result<Vec<QuizResult>, TrackError> {
        self.retry
            .run("list_attempts", move || async move {
                let sql = format!(
                    r#"
                    SELECT {} FROM quiz_results
                    WHERE user_id = $1 AND quiz_id = $2
                    ORDER BY attempt_number
                    "#,
                    RESULT_COLUMNS
                );
                let results = sqlx::query_as::<_, QuizResult>(&sql)
                    .bind(user_id)
                    .bind(quiz_id)
                    .fetch_all(&self.pool)
                    .await?;
                Ok(results)
            })
            .await
    }

    /// The most recent completed attempt, if any.
    pub async fn latest(&self, user_id: &str, quiz_id: i64) -> Result<Option<QuizResult>, TrackError> {
        self.retry
            .run("latest_attempt", move || async move {
                let sql = format!(
                    r#"
                    SELECT {} FROM quiz_results
                    WHERE user_id = $1 AND quiz_id = $2
                    ORDER BY attempt_number DESC
                    LIMIT 1
                    "#,
                    RESULT_COLUMNS
                );
                let result = sqlx::query_as::<_, QuizResult>(&sql)
                    .bind(user_id)
                    .bind(quiz_id)
                    .fetch_optional(&self.pool)
                    .await?;
                Ok(result)
            })
            .await
    }
}
