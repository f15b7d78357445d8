// src/config.rs

use std::{env, time::Duration};

use dotenvy::dotenv;
use thiserror::Error;
use url::Url;

/// Passing threshold applied when the generator does not specify one.
pub const DEFAULT_PASSING_SCORE: i64 = 70;

/// Attempt cap applied when the generator does not specify one.
pub const DEFAULT_MAX_ATTEMPTS: i64 = 3;

/// Track length used when a caller omits `total_days`.
pub const DEFAULT_TOTAL_DAYS: i64 = 7;

/// Upper bound on requested track length.
pub const MAX_TRACK_DAYS: i64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Settings for the OpenAI-compatible content generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub port: u16,
    pub log_dir: String,
    /// `None` when no API key is configured; generation then reports the
    /// upstream as unavailable.
    pub generator: Option<GeneratorConfig>,
    pub generation_timeout: Duration,
    pub store_max_retries: u32,
    pub store_retry_base: Duration,
    /// Sessions untouched for this long are dropped.
    pub session_idle_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://daily_learn.db".to_string());

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());

        let port = parse_var("PORT", 3000u16)?;

        let generator = match env::var("OPENAI_API_KEY") {
            Ok(api_key) if !api_key.trim().is_empty() => {
                let base_url = env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
                Url::parse(&base_url).map_err(|e| ConfigError::Invalid {
                    name: "OPENAI_BASE_URL",
                    reason: e.to_string(),
                })?;
                let model = env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
                Some(GeneratorConfig {
                    base_url,
                    api_key,
                    model,
                })
            }
            _ => None,
        };

        let generation_timeout = Duration::from_secs(parse_var("GENERATION_TIMEOUT_SECS", 60u64)?);
        let store_max_retries = parse_var("STORE_MAX_RETRIES", 3u32)?;
        let store_retry_base = Duration::from_millis(parse_var("STORE_RETRY_BASE_MS", 50u64)?);
        let session_idle_ttl = Duration::from_secs(parse_var("SESSION_IDLE_TTL_SECS", 3600u64)?);

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            port,
            log_dir,
            generator,
            generation_timeout,
            store_max_retries,
            store_retry_base,
            session_idle_ttl,
        })
    }

    /// Configuration for tests and local tooling: in-memory database, no
    /// generator, short retry delays.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: jwt_secret.to_string(),
            rust_log: "error".to_string(),
            port: 0,
            log_dir: "logs".to_string(),
            generator: None,
            generation_timeout: Duration::from_secs(5),
            store_max_retries: 2,
            store_retry_base: Duration::from_millis(1),
            session_idle_ttl: Duration::from_secs(3600),
        }
    }
}

fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
