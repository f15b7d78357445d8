// src/engine/session.rs

//! Per-user learning session state.
//!
//! A session walks a single track day by day:
//! - `Idle` -> `TrackSelected` -> `LessonPresented` -> `QuizActive` -> `QuizScored`
//! - From `QuizScored`:
//!   - `DayAdvanced` (passed) -> `LessonPresented` (next day) or `TrackCompleted`
//!   - `RetryOffered` (failed) -> `QuizActive` (new attempt) or `Blocked` (cap used up)
//!
//! `select_track` is accepted from every state except `QuizActive`; `abandon`
//! is accepted from every state. `review_day` replays an already completed
//! day without touching progress; `continue_track` then returns to the
//! learner's current day.

use std::{fmt, sync::Arc, time::Instant};

use serde::{Deserialize, Serialize};

use crate::{
    engine::quiz::{QuizAttempt, QuizScore},
    error::TrackError,
    models::{
        progress::UserProgress,
        quiz::QuestionType,
        track::{Curriculum, Lesson},
    },
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    TrackSelected,
    LessonPresented,
    QuizActive,
    QuizScored,
    DayAdvanced,
    RetryOffered,
    TrackCompleted,
    /// The current day's attempts are used up.
    Blocked,
}

impl SessionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::TrackSelected => "track_selected",
            Self::LessonPresented => "lesson_presented",
            Self::QuizActive => "quiz_active",
            Self::QuizScored => "quiz_scored",
            Self::DayAdvanced => "day_advanced",
            Self::RetryOffered => "retry_offered",
            Self::TrackCompleted => "track_completed",
            Self::Blocked => "blocked",
        }
    }

    /// States only left through `select_track` or `abandon`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::TrackCompleted | Self::Blocked)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable session owned by the orchestrator, one per user.
#[derive(Debug)]
pub struct TrackSession {
    pub user_id: String,
    pub state: SessionState,
    pub curriculum: Option<Arc<Curriculum>>,
    pub progress: Option<UserProgress>,
    /// Set when the selected track was already completed: lessons and
    /// quizzes can be replayed but nothing is recorded.
    pub review: bool,
    /// An earlier, already completed day being revisited.
    pub review_day: Option<i64>,
    pub lesson_day: Option<i64>,
    pub attempt: Option<QuizAttempt>,
    pub last_score: Option<QuizScore>,
    pub blocked_reason: Option<String>,
    pub touched_at: Instant,
}

impl TrackSession {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            state: SessionState::Idle,
            curriculum: None,
            progress: None,
            review: false,
            review_day: None,
            lesson_day: None,
            attempt: None,
            last_score: None,
            blocked_reason: None,
            touched_at: Instant::now(),
        }
    }

    /// True while nothing the learner does is recorded: the whole track is
    /// complete or a single completed day is being revisited.
    pub fn is_reviewing(&self) -> bool {
        self.review || self.review_day.is_some()
    }

    pub fn touch(&mut self) {
        self.touched_at = Instant::now();
    }

    /// Fails with `InvalidState` unless the session is in one of `allowed`.
    pub fn require(&self, allowed: &[SessionState], action: &str) -> Result<(), TrackError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(TrackError::invalid_state(self.state, action))
        }
    }

    pub fn transition(&mut self, to: SessionState) {
        tracing::debug!("Session for user {}: {} -> {}", self.user_id, self.state, to);
        self.state = to;
        self.touch();
    }

    /// Replaces whatever the session held with a freshly selected track.
    pub fn select(&mut self, curriculum: Arc<Curriculum>, progress: UserProgress) {
        self.review = progress.is_completed();
        self.review_day = None;
        self.curriculum = Some(curriculum);
        self.progress = Some(progress);
        self.lesson_day = None;
        self.attempt = None;
        self.last_score = None;
        self.blocked_reason = None;
        self.transition(SessionState::TrackSelected);
    }

    /// The day a lesson should be shown for: a day picked for review, the
    /// learner's current day, or the last day when reviewing a completed
    /// track.
    pub fn target_day(&self) -> Option<i64> {
        match (&self.curriculum, &self.progress) {
            (Some(_), _) if self.review_day.is_some() => self.review_day,
            (Some(curriculum), _) if self.review => Some(curriculum.track.total_days),
            (_, Some(progress)) => Some(progress.current_day),
            _ => None,
        }
    }

    pub fn track_id(&self) -> Option<i64> {
        self.curriculum.as_ref().map(|c| c.track.id)
    }

    pub fn lesson(&self) -> Option<&Lesson> {
        let day = self.lesson_day?;
        self.curriculum.as_ref()?.lesson(day)
    }

    pub fn view(&self) -> SessionView {
        let lesson = self.lesson().map(|lesson| LessonView {
            day_number: lesson.day.day_number,
            topic: lesson.day.topic.clone(),
            content: lesson.day.content.clone(),
            quiz_title: lesson.quiz.title.clone(),
            question_count: lesson.quiz.questions.len(),
            passing_score: lesson.quiz.passing_score,
        });

        let question = match (&self.attempt, self.state) {
            (Some(attempt), SessionState::QuizActive) => {
                attempt.current_question().map(|q| QuestionView {
                    index: attempt.current_index(),
                    total: attempt.quiz().questions.len(),
                    question_text: q.question_text.clone(),
                    question_type: q.question_type,
                    options: q.options.0.clone(),
                })
            }
            _ => None,
        };

        SessionView {
            state: self.state,
            track_id: self.track_id(),
            track_title: self.curriculum.as_ref().map(|c| c.track.title.clone()),
            current_day: self.progress.as_ref().map(|p| p.current_day),
            total_days: self.curriculum.as_ref().map(|c| c.track.total_days),
            review_mode: self.is_reviewing(),
            review_day: self.review_day,
            lesson,
            question,
            attempt_number: self.attempt.as_ref().map(|a| a.attempt_number()),
            score: self.last_score,
            progress: self.progress.clone(),
            blocked_reason: self.blocked_reason.clone(),
        }
    }
}

/// Snapshot of a session for clients. Never contains correct answers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub state: SessionState,
    pub track_id: Option<i64>,
    pub track_title: Option<String>,
    pub current_day: Option<i64>,
    pub total_days: Option<i64>,
    pub review_mode: bool,
    pub review_day: Option<i64>,
    pub lesson: Option<LessonView>,
    pub question: Option<QuestionView>,
    pub attempt_number: Option<i64>,
    pub score: Option<QuizScore>,
    pub progress: Option<UserProgress>,
    pub blocked_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LessonView {
    pub day_number: i64,
    pub topic: String,
    pub content: String,
    pub quiz_title: String,
    pub question_count: usize,
    pub passing_score: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub index: usize,
    pub total: usize,
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::TrackCompleted.is_terminal());
        assert!(SessionState::Blocked.is_terminal());
        assert!(!SessionState::RetryOffered.is_terminal());
        assert!(!SessionState::Idle.is_terminal());
    }

    #[test]
    fn test_require_reports_current_state() {
        let session = TrackSession::new("learner");
        let err = session
            .require(&[SessionState::LessonPresented], "begin a quiz")
            .unwrap_err();
        assert_eq!(err.code(), "invalid_state");
        assert!(err.to_string().contains("idle"));
    }

    #[test]
    fn test_idle_view_is_empty() {
        let view = TrackSession::new("learner").view();
        assert_eq!(view.state, SessionState::Idle);
        assert!(view.track_id.is_none());
        assert!(view.lesson.is_none());
        assert!(view.question.is_none());
        assert!(!view.review_mode);
    }

    #[test]
    fn test_day_review_counts_as_review_mode() {
        let mut session = TrackSession::new("learner");
        assert!(!session.is_reviewing());
        session.review_day = Some(1);
        assert!(session.is_reviewing());

        let view = session.view();
        assert!(view.review_mode);
        assert_eq!(view.review_day, Some(1));
        // No track loaded, so there is nothing to present.
        assert_eq!(session.target_day(), None);
    }

    #[test]
    fn test_transition_refreshes_activity() {
        let mut session = TrackSession::new("learner");
        let before = session.touched_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        session.transition(SessionState::TrackSelected);
        assert!(session.touched_at > before);
    }

    #[test]
    fn test_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(SessionState::RetryOffered).unwrap(),
            serde_json::json!("retry_offered")
        );
        assert_eq!(SessionState::QuizActive.to_string(), "quiz_active");
    }
}
