// src/engine/mod.rs

pub mod orchestrator;
pub mod quiz;
pub mod session;

pub use orchestrator::{SessionOrchestrator, TrackSelection};
pub use quiz::{AnswerFeedback, QuizAttempt, QuizScore};
pub use session::{SessionState, SessionView};
