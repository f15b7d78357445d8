// tests/common/mod.rs

#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use daily_learn::{
    config::Config,
    db,
    generation::{ContentGenerator, GenerationRequest, GeneratorError},
    models::track::{Difficulty, GenerateTrackRequest},
    state::AppState,
};
use serde_json::{Value, json};
use sqlx::SqlitePool;

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

/// What the scripted generator does when asked for a curriculum.
#[derive(Clone)]
pub enum Reply {
    Json(String),
    Unavailable,
    Hang,
}

/// In-process stand-in for the content generator.
pub struct ScriptedGenerator {
    reply: Reply,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }

    /// Serves a valid track of `days` days for whatever is requested.
    pub fn budgeting(days: i64) -> Self {
        Self::new(Reply::Json(budgeting_track(days, 3).to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Reply::Json(raw) => Ok(raw.clone()),
            Reply::Unavailable => Err(GeneratorError::Other("connection refused".to_string())),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(GeneratorError::Other("too late".to_string()))
            }
        }
    }
}

/// Correct answers for every day of `budgeting_track`, in question order.
pub const CORRECT_ANSWERS: [&str; 2] = ["Needs", "true"];

/// A beginner "Budgeting" curriculum. Each day has two questions with a
/// passing score of 70, so one wrong answer (50%) fails.
pub fn budgeting_track(days: i64, max_attempts: i64) -> Value {
    let days: Vec<Value> = (1..=days)
        .map(|n| {
            json!({
                "dayNumber": n,
                "topic": format!("Budgeting day {}", n),
                "content": format!("<p>Lesson {} on tracking income and expenses.</p>", n),
                "quiz": {
                    "title": format!("Day {} check", n),
                    "passingScore": 70,
                    "allowRetakes": true,
                    "maxAttempts": max_attempts,
                    "questions": [
                        {
                            "questionText": "Rent is one of your...",
                            "type": "multiple_choice",
                            "options": ["Needs", "Wants", "Savings"],
                            "correctAnswer": "Needs",
                            "explanation": "Housing is a need."
                        },
                        {
                            "questionText": "A budget should be reviewed monthly.",
                            "type": "true_false",
                            "correctAnswer": "true",
                            "explanation": "Spending changes month to month."
                        }
                    ]
                }
            })
        })
        .collect();

    json!({
        "title": "Budgeting Basics",
        "description": "Build and keep a simple monthly budget.",
        "category": "Personal finance",
        "difficulty": "beginner",
        "learningObjectives": ["Track spending", "Separate needs from wants"],
        "days": days
    })
}

pub fn budgeting_request(days: i64) -> GenerateTrackRequest {
    GenerateTrackRequest {
        topic: "Budgeting".to_string(),
        difficulty: Difficulty::Beginner,
        total_days: Some(days),
    }
}

pub async fn test_pool() -> SqlitePool {
    let pool = db::connect("sqlite::memory:", 1)
        .await
        .expect("Failed to open in-memory database");
    db::migrate(&pool).await.expect("Failed to migrate database");
    pool
}

pub async fn test_state_with(generator: Arc<dyn ContentGenerator>, config: Config) -> AppState {
    AppState::new(test_pool().await, config, generator)
}

pub async fn test_state(generator: ScriptedGenerator) -> AppState {
    test_state_with(Arc::new(generator), Config::for_tests(JWT_SECRET)).await
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("Failed to count rows")
}
