// src/generation/mod.rs

//! Track generation: ask a content generator for a curriculum, validate the
//! answer strictly, and persist it whole or not at all.

pub mod openai;
pub mod schema;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    config::{DEFAULT_TOTAL_DAYS, MAX_TRACK_DAYS},
    error::{GenerationFailure, TrackError},
    models::track::{Curriculum, Difficulty, GenerateTrackRequest},
    store::CurriculumStore,
};

pub use openai::OpenAiGenerator;

/// Errors a content generator backend can report.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("content generator is not configured")]
    Disabled,
    #[error("content generator returned an empty response")]
    EmptyResponse,
    #[error("content generator request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Other(String),
}

impl From<GeneratorError> for TrackError {
    fn from(err: GeneratorError) -> Self {
        let reason = match err {
            GeneratorError::EmptyResponse => GenerationFailure::EmptyResult,
            _ => GenerationFailure::UpstreamUnavailable,
        };
        TrackError::generation(reason, err.to_string())
    }
}

/// A validated request for a new curriculum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub topic: String,
    pub difficulty: Difficulty,
    pub total_days: i64,
}

impl GenerationRequest {
    pub fn from_input(input: &GenerateTrackRequest) -> Result<Self, TrackError> {
        let topic = input.topic.trim();
        if topic.is_empty() {
            return Err(TrackError::InvalidInput("topic must not be empty".to_string()));
        }
        if topic.chars().count() > 200 {
            return Err(TrackError::InvalidInput(
                "topic must be at most 200 characters".to_string(),
            ));
        }
        let total_days = input.total_days.unwrap_or(DEFAULT_TOTAL_DAYS);
        if !(1..=MAX_TRACK_DAYS).contains(&total_days) {
            return Err(TrackError::InvalidInput(format!(
                "total_days must be between 1 and {}",
                MAX_TRACK_DAYS
            )));
        }
        Ok(Self {
            topic: topic.to_string(),
            difficulty: input.difficulty,
            total_days,
        })
    }
}

/// Anything that can turn a request into raw curriculum JSON.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeneratorError>;
}

/// Instructions sent to the generator describing the exact document shape.
pub fn curriculum_prompt(request: &GenerationRequest) -> String {
    format!(
        r#"You are a curriculum designer. Build a {days}-day learning track about "{topic}" for a {difficulty} learner.

Respond with a single JSON object and nothing else, using exactly this shape:
{{
  "title": "short track title",
  "description": "one or two sentences",
  "category": "broad subject area",
  "difficulty": "{difficulty}",
  "learningObjectives": ["objective", "..."],
  "days": [
    {{
      "dayNumber": 1,
      "topic": "what this day covers",
      "content": "the lesson text, several paragraphs",
      "quiz": {{
        "title": "quiz title",
        "passingScore": 70,
        "allowRetakes": true,
        "maxAttempts": 3,
        "questions": [
          {{
            "questionText": "the question",
            "type": "multiple_choice",
            "options": ["A", "B", "C", "D"],
            "correctAnswer": "the exact text of the correct option",
            "explanation": "why the answer is correct"
          }}
        ]
      }}
    }}
  ]
}}

Rules:
- "days" must contain exactly {days} entries numbered 1 to {days}.
- Every day has a quiz with 3 to 5 questions.
- "type" is one of "multiple_choice", "true_false" or "fill_blank".
- For multiple_choice, "correctAnswer" must be copied exactly from "options".
- For true_false, "correctAnswer" is "true" or "false".
- For fill_blank, omit "options" and give the expected word or phrase."#,
        days = request.total_days,
        topic = request.topic,
        difficulty = request.difficulty,
    )
}

/// Generates, validates and stores new tracks.
#[derive(Clone)]
pub struct TrackGenerator {
    generator: Arc<dyn ContentGenerator>,
    curriculum: CurriculumStore,
    timeout: Duration,
}

impl TrackGenerator {
    pub fn new(generator: Arc<dyn ContentGenerator>, curriculum: CurriculumStore, timeout: Duration) -> Self {
        Self {
            generator,
            curriculum,
            timeout,
        }
    }

    /// Produces and persists a new track. On any failure nothing is stored.
    pub async fn generate(&self, input: &GenerateTrackRequest) -> Result<Curriculum, TrackError> {
        let request = GenerationRequest::from_input(input)?;
        tracing::info!(
            "Generating {}-day {} track on '{}'",
            request.total_days,
            request.difficulty,
            request.topic
        );

        let raw = match tokio::time::timeout(self.timeout, self.generator.generate(&request)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                tracing::error!("Content generator failed for '{}': {}", request.topic, err);
                return Err(err.into());
            }
            Err(_) => {
                tracing::error!(
                    "Content generator timed out after {:?} for '{}'",
                    self.timeout,
                    request.topic
                );
                return Err(TrackError::generation(
                    GenerationFailure::UpstreamUnavailable,
                    format!("no response within {:?}", self.timeout),
                ));
            }
        };

        let new = schema::parse_document(&raw)
            .and_then(|document| document.into_curriculum(&request))
            .map_err(|err| {
                tracing::warn!("Rejected generated curriculum for '{}': {}", request.topic, err);
                err
            })?;

        self.curriculum.insert(&new).await
    }
}
