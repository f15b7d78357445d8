// src/engine/quiz.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::TrackError,
    models::quiz::{AnswerRecord, Quiz, QuizQuestion, QuizResult},
};

/// Result of scoring a finished (or partial) attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuizScore {
    pub correct_count: i64,
    pub total_count: i64,
    /// `round(correct / total * 100)`.
    pub percentage: i64,
    /// `percentage >= passing_score`; a tie passes.
    pub passed: bool,
}

impl From<&QuizResult> for QuizScore {
    fn from(result: &QuizResult) -> Self {
        Self {
            correct_count: result.correct_count,
            total_count: result.total_count,
            percentage: result.score,
            passed: result.passed,
        }
    }
}

/// Feedback for a single submitted answer.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerFeedback {
    pub question_index: usize,
    pub question_id: i64,
    pub is_correct: bool,
    pub selected: String,
    pub correct_answer: String,
    pub explanation: String,
    pub is_complete: bool,
}

/// Scores `correct_count` out of `total_count` against a passing threshold.
pub fn calculate_score(correct_count: i64, total_count: i64, passing_score: i64) -> QuizScore {
    let percentage = if total_count <= 0 {
        0
    } else {
        ((correct_count as f64 / total_count as f64) * 100.0).round() as i64
    };
    QuizScore {
        correct_count,
        total_count,
        percentage,
        passed: percentage >= passing_score,
    }
}

/// One pass through a quiz. Lives only as long as the session that owns it.
#[derive(Debug, Clone)]
pub struct QuizAttempt {
    quiz: Arc<Quiz>,
    attempt_number: i64,
    current_index: usize,
    answers: Vec<AnswerRecord>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl QuizAttempt {
    /// Starts attempt `previous_attempts + 1`.
    ///
    /// Fails with `AttemptsExhausted` once the quiz's cap is used up (the cap
    /// is 1 when retakes are not allowed).
    pub fn begin(quiz: Arc<Quiz>, previous_attempts: i64) -> Result<Self, TrackError> {
        if quiz.questions.is_empty() {
            return Err(TrackError::InvalidInput(format!(
                "quiz {} has no questions",
                quiz.id
            )));
        }
        let allowed = quiz.attempt_cap();
        if previous_attempts >= allowed {
            return Err(TrackError::AttemptsExhausted {
                quiz_id: quiz.id,
                allowed,
            });
        }
        Ok(Self {
            quiz,
            attempt_number: previous_attempts + 1,
            current_index: 0,
            answers: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        })
    }

    /// Answers the question at `question_index`, which must be the current
    /// one. Comparison is an exact match on the canonical answer value,
    /// ignoring surrounding whitespace.
    pub fn submit(&mut self, question_index: usize, answer: &str) -> Result<AnswerFeedback, TrackError> {
        if self.is_complete() {
            return Err(TrackError::invalid_state("complete", "answer a finished quiz"));
        }
        if question_index != self.current_index {
            return Err(TrackError::invalid_state(
                format!("on question {}", self.current_index),
                format!("answer question {}", question_index),
            ));
        }

        let question = &self.quiz.questions[self.current_index];
        let selected = answer.trim().to_string();
        let is_correct = selected == question.correct_answer;

        self.answers.push(AnswerRecord {
            question_id: question.id,
            selected: selected.clone(),
            is_correct,
        });
        let feedback = AnswerFeedback {
            question_index,
            question_id: question.id,
            is_correct,
            selected,
            correct_answer: question.correct_answer.clone(),
            explanation: question.explanation.clone(),
            is_complete: self.current_index + 1 >= self.quiz.questions.len(),
        };
        self.current_index += 1;
        if feedback.is_complete {
            self.finished_at = Some(Utc::now());
        }
        Ok(feedback)
    }

    pub fn is_complete(&self) -> bool {
        self.current_index >= self.quiz.questions.len()
    }

    pub fn score(&self) -> QuizScore {
        let correct = self.answers.iter().filter(|a| a.is_correct).count() as i64;
        calculate_score(correct, self.quiz.questions.len() as i64, self.quiz.passing_score)
    }

    pub fn current_question(&self) -> Option<&QuizQuestion> {
        self.quiz.questions.get(self.current_index)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn quiz_id(&self) -> i64 {
        self.quiz.id
    }

    pub fn attempt_number(&self) -> i64 {
        self.attempt_number
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    /// Whole seconds from `begin` to the last answer, or to now while the
    /// attempt is still open.
    pub fn time_spent_secs(&self) -> i64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_seconds().max(0)
    }
}
