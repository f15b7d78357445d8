// src/store/curriculum.rs

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{SqlitePool, types::Json};

use crate::{
    error::TrackError,
    models::{
        quiz::{Quiz, QuizQuestion},
        track::{Curriculum, LearningTrack, Lesson, NewCurriculum, TrackDay},
    },
    store::retry::RetryPolicy,
};

/// Read/write access to the immutable curriculum tables.
#[derive(Clone)]
pub struct CurriculumStore {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl CurriculumStore {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// Persists a whole curriculum in one transaction and returns it as
    /// stored. Nothing is written if any insert fails.
    pub async fn insert(&self, new: &NewCurriculum) -> Result<Curriculum, TrackError> {
        let track_id = self.retry.run("insert_curriculum", || self.insert_once(new)).await?;
        tracing::info!(
            "Stored track {} '{}' with {} days",
            track_id,
            new.title,
            new.days.len()
        );
        self.get_curriculum(track_id).await
    }

    async fn insert_once(&self, new: &NewCurriculum) -> Result<i64, TrackError> {
        let mut tx = self.pool.begin().await?;
        let total_days = i64::try_from(new.days.len())
            .map_err(|_| TrackError::InvalidInput("too many days".to_string()))?;

        let track_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO learning_tracks
                (title, description, category, difficulty, total_days, is_active, learning_objectives, created_at)
            VALUES ($1, $2, $3, $4, $5, 1, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.category)
        .bind(new.difficulty)
        .bind(total_days)
        .bind(Json(&new.learning_objectives))
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        for day in &new.days {
            let day_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO track_days (track_id, day_number, topic, content)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(track_id)
            .bind(day.day_number)
            .bind(&day.topic)
            .bind(&day.content)
            .fetch_one(&mut *tx)
            .await?;

            let quiz_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO quizzes (day_id, title, passing_score, allow_retakes, max_attempts)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(day_id)
            .bind(&day.quiz.title)
            .bind(day.quiz.passing_score)
            .bind(day.quiz.allow_retakes)
            .bind(day.quiz.max_attempts)
            .fetch_one(&mut *tx)
            .await?;

            for (position, question) in day.quiz.questions.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO quiz_questions
                        (quiz_id, position, question_text, question_type, options, correct_answer, explanation)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(quiz_id)
                .bind(position as i64)
                .bind(&question.question_text)
                .bind(question.question_type)
                .bind(Json(&question.options))
                .bind(&question.correct_answer)
                .bind(&question.explanation)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(track_id)
    }

    pub async fn get_track(&self, track_id: i64) -> Result<LearningTrack, TrackError> {
        self.retry
            .run("get_track", move || async move {
                sqlx::query_as::<_, LearningTrack>(
                    r#"
                    SELECT id, title, description, category, difficulty, total_days,
                           is_active, learning_objectives, created_at
                    FROM learning_tracks
                    WHERE id = $1
                    "#,
                )
                .bind(track_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| TrackError::NotFound(format!("track {}", track_id)))
            })
            .await
    }

    /// Lists tracks that are open to new learners, newest first.
    pub async fn list_active(&self) -> Result<Vec<LearningTrack>, TrackError> {
        self.retry
            .run("list_active_tracks", move || async move {
                let tracks = sqlx::query_as::<_, LearningTrack>(
                    r#"
                    SELECT id, title, description, category, difficulty, total_days,
                           is_active, learning_objectives, created_at
                    FROM learning_tracks
                    WHERE is_active = 1
                    ORDER BY id DESC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?;
                Ok(tracks)
            })
            .await
    }

    /// Loads a track with all of its days, quizzes and questions.
    pub async fn get_curriculum(&self, track_id: i64) -> Result<Curriculum, TrackError> {
        let track = self.get_track(track_id).await?;
        let lessons = self
            .retry
            .run("get_lessons", || self.load_lessons(track_id, None))
            .await?;
        Ok(Curriculum { track, lessons })
    }

    /// Loads a single day. `Ok(None)` means the track exists but has no such
    /// day.
    pub async fn get_lesson(&self, track_id: i64, day_number: i64) -> Result<Option<Lesson>, TrackError> {
        self.get_track(track_id).await?;
        let mut lessons = self
            .retry
            .run("get_lesson", || self.load_lessons(track_id, Some(day_number)))
            .await?;
        Ok(lessons.pop())
    }

    async fn load_lessons(&self, track_id: i64, day_number: Option<i64>) -> Result<Vec<Lesson>, TrackError> {
        let days = sqlx::query_as::<_, TrackDay>(
            r#"
            SELECT id, track_id, day_number, topic, content
            FROM track_days
            WHERE track_id = $1 AND ($2 IS NULL OR day_number = $2)
            ORDER BY day_number
            "#,
        )
        .bind(track_id)
        .bind(day_number)
        .fetch_all(&self.pool)
        .await?;

        let quizzes = sqlx::query_as::<_, Quiz>(
            r#"
            SELECT q.id, q.day_id, q.title, q.passing_score, q.allow_retakes, q.max_attempts
            FROM quizzes q
            JOIN track_days d ON d.id = q.day_id
            WHERE d.track_id = $1 AND ($2 IS NULL OR d.day_number = $2)
            "#,
        )
        .bind(track_id)
        .bind(day_number)
        .fetch_all(&self.pool)
        .await?;

        let questions = sqlx::query_as::<_, QuizQuestion>(
            r#"
            SELECT qq.id, qq.quiz_id, qq.position, qq.question_text, qq.question_type,
                   qq.options, qq.correct_answer, qq.explanation
            FROM quiz_questions qq
            JOIN quizzes q ON q.id = qq.quiz_id
            JOIN track_days d ON d.id = q.day_id
            WHERE d.track_id = $1 AND ($2 IS NULL OR d.day_number = $2)
            ORDER BY qq.quiz_id, qq.position
            "#,
        )
        .bind(track_id)
        .bind(day_number)
        .fetch_all(&self.pool)
        .await?;

        let mut questions_by_quiz: HashMap<i64, Vec<QuizQuestion>> = HashMap::new();
        for question in questions {
            questions_by_quiz.entry(question.quiz_id).or_default().push(question);
        }

        let mut quiz_by_day: HashMap<i64, Quiz> = quizzes
            .into_iter()
            .map(|mut quiz| {
                quiz.questions = questions_by_quiz.remove(&quiz.id).unwrap_or_default();
                (quiz.day_id, quiz)
            })
            .collect();

        // A day without a quiz is a partial track; callers treat it as missing.
        let lessons = days
            .into_iter()
            .filter_map(|day| quiz_by_day.remove(&day.id).map(|quiz| Lesson { day, quiz }))
            .collect();

        Ok(lessons)
    }
}
