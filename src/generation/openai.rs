// src/generation/openai.rs

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    config::GeneratorConfig,
    generation::{ContentGenerator, GenerationRequest, GeneratorError, curriculum_prompt},
};

/// Content generator backed by an OpenAI-compatible chat completions API.
#[derive(Clone)]
pub struct OpenAiGenerator {
    client: Client,
    config: Option<GeneratorConfig>,
}

impl OpenAiGenerator {
    pub fn new(config: Option<GeneratorConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl ContentGenerator for OpenAiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeneratorError> {
        let config = self.config.as_ref().ok_or(GeneratorError::Disabled)?;

        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: curriculum_prompt(request),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "Create the {}-day {} track on \"{}\" now.",
                        request.total_days, request.difficulty, request.topic
                    ),
                },
            ],
            temperature: 0.7,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        tracing::debug!("Requesting curriculum from model {}", config.model);
        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeneratorError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GeneratorError::EmptyResponse)?;

        Ok(content.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::track::Difficulty;

    #[tokio::test]
    async fn test_unconfigured_generator_is_disabled() {
        let generator = OpenAiGenerator::new(None);
        assert!(!generator.enabled());
        let request = GenerationRequest {
            topic: "Budgeting".into(),
            difficulty: Difficulty::Beginner,
            total_days: 3,
        };
        assert!(matches!(
            generator.generate(&request).await,
            Err(GeneratorError::Disabled)
        ));
    }

    #[test]
    fn test_payload_requests_json_object() {
        let format = serde_json::to_value(ResponseFormat {
            kind: "json_object",
        })
        .unwrap();
        assert_eq!(format, serde_json::json!({ "type": "json_object" }));
    }
}
