// src/store/progress.rs

use chrono::Utc;
use sqlx::{SqlitePool, types::Json};

use crate::{
    error::TrackError,
    models::{
        progress::{DayCompletion, ProgressStatus, UserProgress},
        track::TrackSummary,
    },
    store::{curriculum::CurriculumStore, retry::RetryPolicy},
};

const PROGRESS_COLUMNS: &str = r#"
    id, user_id, track_id, current_day, completed_days, overall_progress,
    average_quiz_score, status, started_at, last_accessed_at, completed_at
"#;

/// The one mutable record per (user, track).
///
/// Every write that moves `current_day` is a compare-and-swap on the value
/// read at validation time, so duplicate or concurrent completions of the
/// same day cannot both succeed.
#[derive(Clone)]
pub struct ProgressStore {
    pool: SqlitePool,
    curriculum: CurriculumStore,
    retry: RetryPolicy,
}

impl ProgressStore {
    pub fn new(pool: SqlitePool, curriculum: CurriculumStore, retry: RetryPolicy) -> Self {
        Self {
            pool,
            curriculum,
            retry,
        }
    }

    /// Returns the caller's record for a track, creating it on first access.
    /// A record that is `not_started` or `paused` becomes `in_progress`.
    pub async fn get_or_create(&self, user_id: &str, track_id: i64) -> Result<UserProgress, TrackError> {
        self.curriculum.get_track(track_id).await?;

        let progress = self
            .retry
            .run("get_or_create_progress", move || async move {
                let now = Utc::now();
                let mut tx = self.pool.begin().await?;

                sqlx::query(
                    r#"
                    INSERT INTO user_progress (user_id, track_id, current_day, status, last_accessed_at)
                    VALUES ($1, $2, 1, 'not_started', $3)
                    ON CONFLICT (user_id, track_id) DO NOTHING
                    "#,
                )
                .bind(user_id)
                .bind(track_id)
                .bind(now)
                .execute(&mut *tx)
                .await?;

                let sql = format!(
                    r#"
                    UPDATE user_progress
                    SET status = CASE WHEN status IN ('not_started', 'paused') THEN 'in_progress' ELSE status END,
                        started_at = COALESCE(started_at, $3),
                        last_accessed_at = $3
                    WHERE user_id = $1 AND track_id = $2
                    RETURNING {}
                    "#,
                    PROGRESS_COLUMNS
                );
                let progress = sqlx::query_as::<_, UserProgress>(&sql)
                    .bind(user_id)
                    .bind(track_id)
                    .bind(now)
                    .fetch_one(&mut *tx)
                    .await?;

                tx.commit().await?;
                Ok(progress)
            })
            .await?;

        tracing::debug!(
            "Progress for user {} on track {}: day {} ({})",
            user_id,
            track_id,
            progress.current_day,
            progress.status
        );
        Ok(progress)
    }

    /// Reads a record without creating or touching it.
    pub async fn get(&self, user_id: &str, track_id: i64) -> Result<UserProgress, TrackError> {
        self.retry
            .run("get_progress", move || async move { self.fetch(user_id, track_id).await })
            .await
    }

    async fn fetch(&self, user_id: &str, track_id: i64) -> Result<UserProgress, TrackError> {
        let sql = format!(
            "SELECT {} FROM user_progress WHERE user_id = $1 AND track_id = $2",
            PROGRESS_COLUMNS
        );
        sqlx::query_as::<_, UserProgress>(&sql)
            .bind(user_id)
            .bind(track_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                TrackError::NotFound(format!("progress for user {} on track {}", user_id, track_id))
            })
    }

    /// Every track the user has progress on, most recently used first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<TrackSummary>, TrackError> {
        self.retry
            .run("list_progress", move || async move {
                let summaries = sqlx::query_as::<_, TrackSummary>(
                    r#"
                    SELECT p.track_id, t.title, t.category, t.difficulty, p.current_day,
                           t.total_days, p.status, p.overall_progress, p.average_quiz_score,
                           p.last_accessed_at
                    FROM user_progress p
                    JOIN learning_tracks t ON t.id = p.track_id
                    WHERE p.user_id = $1
                    ORDER BY p.last_accessed_at DESC, p.id DESC
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
                Ok(summaries)
            })
            .await
    }

    /// Marks `day_number` as passed with `score` and moves to the next day.
    ///
    /// Rejects days other than the current one with `StaleDay` and scores
    /// under the day's passing threshold with `ScoreBelowThreshold`. Passing
    /// the last day completes the track; `current_day` then stays on the last
    /// day, and advancing past it returns the record unchanged.
    pub async fn advance(
        &self,
        user_id: &str,
        track_id: i64,
        day_number: i64,
        score: i64,
    ) -> Result<UserProgress, TrackError> {
        if !(0..=100).contains(&score) {
            return Err(TrackError::InvalidInput(format!(
                "score must be between 0 and 100, got {}",
                score
            )));
        }

        let track = self.curriculum.get_track(track_id).await?;
        let progress = self.get(user_id, track_id).await?;

        if progress.is_completed() && day_number > track.total_days {
            tracing::debug!(
                "Ignoring completion of day {} past the end of finished track {} for user {}",
                day_number,
                track_id,
                user_id
            );
            return Ok(progress);
        }

        if progress.is_completed() || day_number != progress.current_day {
            tracing::warn!(
                "Rejected stale completion of day {} by user {} on track {} (current day {}, {})",
                day_number,
                user_id,
                track_id,
                progress.current_day,
                progress.status
            );
            return Err(TrackError::StaleDay {
                current: progress.current_day,
                submitted: day_number,
            });
        }

        let lesson = self
            .curriculum
            .get_lesson(track_id, day_number)
            .await?
            .ok_or(TrackError::MissingDay {
                track_id,
                day: day_number,
            })?;

        if score < lesson.quiz.passing_score {
            return Err(TrackError::ScoreBelowThreshold {
                score,
                passing_score: lesson.quiz.passing_score,
            });
        }

        let now = Utc::now();
        let mut completed = progress.completed_days.0.clone();
        completed.push(DayCompletion {
            day_number,
            score,
            completed_at: now,
        });

        let completed_count = completed.len() as f64;
        let average = completed.iter().map(|d| d.score as f64).sum::<f64>() / completed_count;
        let overall = (completed_count / track.total_days as f64 * 100.0).min(100.0);
        let finished = day_number >= track.total_days;
        let (next_day, status, completed_at) = if finished {
            (track.total_days, ProgressStatus::Completed, Some(now))
        } else {
            (day_number + 1, ProgressStatus::InProgress, None)
        };

        let completed = &completed;
        let progress_id = progress.id;
        let updated = self
            .retry
            .run("advance_progress", move || async move {
                let sql = format!(
                    r#"
                    UPDATE user_progress
                    SET current_day = $1,
                        completed_days = $2,
                        overall_progress = $3,
                        average_quiz_score = $4,
                        status = $5,
                        last_accessed_at = $6,
                        completed_at = $7
                    WHERE id = $8 AND current_day = $9 AND status <> 'completed'
                    RETURNING {}
                    "#,
                    PROGRESS_COLUMNS
                );
                let updated = sqlx::query_as::<_, UserProgress>(&sql)
                    .bind(next_day)
                    .bind(Json(completed))
                    .bind(overall)
                    .bind(average)
                    .bind(status)
                    .bind(now)
                    .bind(completed_at)
                    .bind(progress_id)
                    .bind(day_number)
                    .fetch_optional(&self.pool)
                    .await?;
                Ok(updated)
            })
            .await?;

        match updated {
            Some(updated) => {
                tracing::info!(
                    "User {} completed day {} of track {} with {}% (now {})",
                    user_id,
                    day_number,
                    track_id,
                    score,
                    updated.status
                );
                Ok(updated)
            }
            None => {
                // Another writer advanced this record between our read and write.
                let current = self.get(user_id, track_id).await?;
                tracing::warn!(
                    "Lost completion race for day {} by user {} on track {}",
                    day_number,
                    user_id,
                    track_id
                );
                Err(TrackError::StaleDay {
                    current: current.current_day,
                    submitted: day_number,
                })
            }
        }
    }

    /// Parks an unfinished track. Completed tracks cannot be paused.
    pub async fn pause(&self, user_id: &str, track_id: i64) -> Result<UserProgress, TrackError> {
        let progress = self.get(user_id, track_id).await?;
        if progress.is_completed() {
            return Err(TrackError::invalid_state(progress.status, "pause a track"));
        }
        let progress_id = progress.id;

        self.retry
            .run("pause_progress", move || async move {
                let sql = format!(
                    r#"
                    UPDATE user_progress
                    SET status = 'paused', last_accessed_at = $1
                    WHERE id = $2 AND status <> 'completed'
                    RETURNING {}
                    "#,
                    PROGRESS_COLUMNS
                );
                sqlx::query_as::<_, UserProgress>(&sql)
                    .bind(Utc::now())
                    .bind(progress_id)
                    .fetch_optional(&self.pool)
                    .await?
                    .ok_or_else(|| TrackError::invalid_state(ProgressStatus::Completed, "pause a track"))
            })
            .await
    }
}
