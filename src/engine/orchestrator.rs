// src/engine/orchestrator.rs

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::{
    engine::{
        quiz::{AnswerFeedback, QuizAttempt, QuizScore},
        session::{SessionState, SessionView, TrackSession},
    },
    error::TrackError,
    generation::TrackGenerator,
    models::track::GenerateTrackRequest,
    store::{AttemptStore, CurriculumStore, ProgressStore},
};

/// What `select_track` should load.
#[derive(Debug, Clone)]
pub enum TrackSelection {
    Existing(i64),
    New(GenerateTrackRequest),
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutcome {
    pub feedback: AnswerFeedback,
    pub session: SessionView,
}

/// Drives every user's session through the lesson/quiz/advance loop.
///
/// Each user has one session behind its own mutex, so operations for one
/// user are serialized while different users never contend. Sessions left
/// untouched for `idle_ttl` are dropped when a new one is opened.
pub struct SessionOrchestrator {
    curriculum: CurriculumStore,
    progress: ProgressStore,
    attempts: AttemptStore,
    generator: TrackGenerator,
    idle_ttl: Duration,
    sessions: RwLock<HashMap<String, Arc<Mutex<TrackSession>>>>,
}

type SessionMap = HashMap<String, Arc<Mutex<TrackSession>>>;

impl SessionOrchestrator {
    pub fn new(
        curriculum: CurriculumStore,
        progress: ProgressStore,
        attempts: AttemptStore,
        generator: TrackGenerator,
        idle_ttl: Duration,
    ) -> Self {
        Self {
            curriculum,
            progress,
            attempts,
            generator,
            idle_ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    async fn session(&self, user_id: &str) -> Arc<Mutex<TrackSession>> {
        if let Some(session) = self.sessions.read().await.get(user_id) {
            return session.clone();
        }
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(user_id) {
            self.evict_idle(&mut sessions);
        }
        sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TrackSession::new(user_id))))
            .clone()
    }

    fn evict_idle(&self, sessions: &mut SessionMap) {
        let before = sessions.len();
        sessions.retain(|_, handle| {
            // Another handle means an operation is about to lock it.
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            match handle.try_lock() {
                Ok(session) => session.touched_at.elapsed() < self.idle_ttl,
                Err(_) => true,
            }
        });
        let dropped = before - sessions.len();
        if dropped > 0 {
            tracing::debug!("Dropped {} idle session(s), {} left", dropped, sessions.len());
        }
    }

    /// Number of sessions currently held in memory.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Loads an existing track or generates a new one and makes it the
    /// session's track. A completed track is opened in review mode.
    pub async fn select_track(&self, user_id: &str, selection: TrackSelection) -> Result<SessionView, TrackError> {
        let handle = self.session(user_id).await;
        let mut session = handle.lock().await;
        if session.state == SessionState::QuizActive {
            return Err(TrackError::invalid_state(session.state, "select a track"));
        }

        let curriculum = match selection {
            TrackSelection::Existing(track_id) => self.curriculum.get_curriculum(track_id).await?,
            TrackSelection::New(request) => self.generator.generate(&request).await?,
        };
        let progress = self.progress.get_or_create(user_id, curriculum.track.id).await?;

        tracing::info!(
            "User {} selected track {} at day {}{}",
            user_id,
            curriculum.track.id,
            progress.current_day,
            if progress.is_completed() { " (review)" } else { "" }
        );
        session.select(Arc::new(curriculum), progress);
        Ok(session.view())
    }

    /// Shows the lesson for the current day.
    pub async fn present_lesson(&self, user_id: &str) -> Result<SessionView, TrackError> {
        let handle = self.session(user_id).await;
        let mut session = handle.lock().await;
        session.require(
            &[
                SessionState::TrackSelected,
                SessionState::LessonPresented,
                SessionState::RetryOffered,
            ],
            "present a lesson",
        )?;

        let day = session
            .target_day()
            .ok_or_else(|| TrackError::invalid_state(session.state, "present a lesson"))?;
        let track_id = session.track_id().unwrap_or_default();
        if session.curriculum.as_ref().and_then(|c| c.lesson(day)).is_none() {
            tracing::warn!("Track {} has no lesson for day {}", track_id, day);
            return Err(TrackError::MissingDay { track_id, day });
        }

        session.lesson_day = Some(day);
        session.attempt = None;
        session.transition(SessionState::LessonPresented);
        Ok(session.view())
    }

    /// Starts a new attempt on the presented day's quiz. Running out of
    /// attempts blocks the session.
    ///
    /// If the learner already passed this quiz but the pass never reached
    /// their progress (the session was dropped before `evaluate`), that
    /// attempt is resumed as `QuizScored` instead.
    pub async fn begin_quiz(&self, user_id: &str) -> Result<SessionView, TrackError> {
        let handle = self.session(user_id).await;
        let mut session = handle.lock().await;
        session.require(
            &[SessionState::LessonPresented, SessionState::RetryOffered],
            "begin a quiz",
        )?;

        let quiz = match session.lesson() {
            Some(lesson) => Arc::new(lesson.quiz.clone()),
            None => return Err(TrackError::invalid_state(session.state, "begin a quiz")),
        };
        if !session.is_reviewing() {
            let day = session.lesson_day.unwrap_or_default();
            let pending = session
                .progress
                .as_ref()
                .is_some_and(|p| !p.is_completed() && p.current_day == day && !p.is_day_completed(day));
            let latest = if pending {
                self.attempts.latest(user_id, quiz.id).await?
            } else {
                None
            };
            if let Some(result) = latest.filter(|r| r.passed) {
                tracing::info!(
                    "User {} resumes passed attempt {} on quiz {}",
                    user_id,
                    result.attempt_number,
                    result.quiz_id
                );
                session.attempt = None;
                session.last_score = Some(QuizScore::from(&result));
                session.transition(SessionState::QuizScored);
                return Ok(session.view());
            }
        }

        let previous = if session.is_reviewing() {
            0
        } else {
            self.attempts.count(user_id, quiz.id).await?
        };

        match QuizAttempt::begin(quiz, previous) {
            Ok(attempt) => {
                tracing::debug!(
                    "User {} started attempt {} on quiz {}",
                    user_id,
                    attempt.attempt_number(),
                    attempt.quiz_id()
                );
                session.attempt = Some(attempt);
                session.last_score = None;
                session.transition(SessionState::QuizActive);
                Ok(session.view())
            }
            Err(err @ TrackError::AttemptsExhausted { .. }) => {
                tracing::warn!("User {} is blocked: {}", user_id, err);
                session.blocked_reason = Some(err.to_string());
                session.attempt = None;
                session.transition(SessionState::Blocked);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Answers the current question. `question_index` defaults to the
    /// current question; any other index is rejected. The final answer
    /// scores the attempt and, outside review mode, records it.
    pub async fn submit_answer(
        &self,
        user_id: &str,
        answer: &str,
        question_index: Option<usize>,
    ) -> Result<AnswerOutcome, TrackError> {
        let handle = self.session(user_id).await;
        let mut session = handle.lock().await;
        session.require(&[SessionState::QuizActive], "submit an answer")?;

        let mut attempt = session
            .attempt
            .clone()
            .ok_or_else(|| TrackError::invalid_state(session.state, "submit an answer"))?;
        let index = question_index.unwrap_or_else(|| attempt.current_index());
        let feedback = attempt.submit(index, answer)?;

        if attempt.is_complete() {
            if !session.is_reviewing() {
                self.attempts.record(user_id, &attempt).await?;
            }
            session.last_score = Some(attempt.score());
            session.attempt = Some(attempt);
            session.transition(SessionState::QuizScored);
        } else {
            session.attempt = Some(attempt);
            session.touch();
        }

        Ok(AnswerOutcome {
            feedback,
            session: session.view(),
        })
    }

    /// Acts on a scored attempt: a pass advances the learner's progress, a
    /// failure offers a retry. Nothing is advanced while reviewing.
    pub async fn evaluate(&self, user_id: &str) -> Result<SessionView, TrackError> {
        let handle = self.session(user_id).await;
        let mut session = handle.lock().await;
        session.require(&[SessionState::QuizScored], "evaluate a quiz")?;

        let score = session
            .last_score
            .ok_or_else(|| TrackError::invalid_state(session.state, "evaluate a quiz"))?;
        let day = session.lesson_day.unwrap_or_default();
        let track_id = session.track_id().unwrap_or_default();
        session.attempt = None;

        if !score.passed {
            tracing::info!(
                "User {} scored {}% on day {} of track {}, retry offered",
                user_id,
                score.percentage,
                day,
                track_id
            );
            session.transition(SessionState::RetryOffered);
            return Ok(session.view());
        }

        if !session.is_reviewing() {
            match self.progress.advance(user_id, track_id, day, score.percentage).await {
                Ok(progress) => session.progress = Some(progress),
                Err(err @ TrackError::StaleDay { .. }) => {
                    // Progress moved on elsewhere; resync and start over from it.
                    let progress = self.progress.get(user_id, track_id).await?;
                    session.review = progress.is_completed();
                    session.review_day = None;
                    session.progress = Some(progress);
                    session.lesson_day = None;
                    session.transition(SessionState::TrackSelected);
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        }

        session.transition(SessionState::DayAdvanced);
        Ok(session.view())
    }

    /// Replays an already completed day: its lesson and quiz can be taken
    /// again, but no attempt is recorded and progress does not move.
    pub async fn review_day(&self, user_id: &str, day: i64) -> Result<SessionView, TrackError> {
        let handle = self.session(user_id).await;
        let mut session = handle.lock().await;
        session.require(
            &[
                SessionState::TrackSelected,
                SessionState::LessonPresented,
                SessionState::RetryOffered,
                SessionState::DayAdvanced,
                SessionState::TrackCompleted,
            ],
            "review a day",
        )?;

        let track_id = session
            .track_id()
            .ok_or_else(|| TrackError::invalid_state(session.state, "review a day"))?;
        let progress = self.progress.get(user_id, track_id).await?;
        if !progress.is_day_completed(day) {
            return Err(TrackError::InvalidInput(format!(
                "day {} of track {} has not been completed yet",
                day, track_id
            )));
        }
        if session.curriculum.as_ref().and_then(|c| c.lesson(day)).is_none() {
            return Err(TrackError::MissingDay { track_id, day });
        }

        tracing::info!("User {} is reviewing day {} of track {}", user_id, day, track_id);
        session.progress = Some(progress);
        session.review_day = Some(day);
        session.lesson_day = Some(day);
        session.attempt = None;
        session.last_score = None;
        session.transition(SessionState::LessonPresented);
        Ok(session.view())
    }

    /// Moves on from an advanced day to the next lesson, or finishes. Also
    /// ends a day review, returning to the learner's current day.
    pub async fn continue_track(&self, user_id: &str) -> Result<SessionView, TrackError> {
        let handle = self.session(user_id).await;
        let mut session = handle.lock().await;
        if session.review_day.is_some() {
            session.require(
                &[
                    SessionState::LessonPresented,
                    SessionState::RetryOffered,
                    SessionState::DayAdvanced,
                ],
                "continue the track",
            )?;
            session.review_day = None;
            session.review = session.progress.as_ref().is_some_and(|p| p.is_completed());
            session.attempt = None;
        } else {
            session.require(&[SessionState::DayAdvanced], "continue the track")?;
        }

        let finished = session.review || session.progress.as_ref().is_some_and(|p| p.is_completed());
        if finished {
            tracing::info!(
                "User {} finished track {}",
                user_id,
                session.track_id().unwrap_or_default()
            );
            session.lesson_day = None;
            session.transition(SessionState::TrackCompleted);
            return Ok(session.view());
        }

        let day = session
            .target_day()
            .ok_or_else(|| TrackError::invalid_state(session.state, "continue the track"))?;
        let track_id = session.track_id().unwrap_or_default();
        if session.curriculum.as_ref().and_then(|c| c.lesson(day)).is_none() {
            session.lesson_day = None;
            session.transition(SessionState::TrackSelected);
            return Err(TrackError::MissingDay { track_id, day });
        }

        session.lesson_day = Some(day);
        session.last_score = None;
        session.transition(SessionState::LessonPresented);
        Ok(session.view())
    }

    /// Current snapshot; an unknown user is `idle`.
    pub async fn view(&self, user_id: &str) -> SessionView {
        let handle = self.sessions.read().await.get(user_id).cloned();
        match handle {
            Some(handle) => handle.lock().await.view(),
            None => TrackSession::new(user_id).view(),
        }
    }

    /// Drops the session, discarding any attempt in progress.
    pub async fn abandon(&self, user_id: &str) -> SessionView {
        if self.sessions.write().await.remove(user_id).is_some() {
            tracing::info!("User {} abandoned their session", user_id);
        }
        TrackSession::new(user_id).view()
    }
}
