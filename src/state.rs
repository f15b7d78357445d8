// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::{
    config::Config,
    engine::SessionOrchestrator,
    generation::{ContentGenerator, TrackGenerator},
    store::{AttemptStore, CurriculumStore, ProgressStore, RetryPolicy},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub curriculum: CurriculumStore,
    pub progress: ProgressStore,
    pub attempts: AttemptStore,
    pub generator: TrackGenerator,
    pub orchestrator: Arc<SessionOrchestrator>,
}

impl AppState {
    /// Wires the stores, the generation adapter and the session orchestrator
    /// around one pool.
    pub fn new(pool: SqlitePool, config: Config, generator: Arc<dyn ContentGenerator>) -> Self {
        let retry = RetryPolicy::from_config(&config);
        let curriculum = CurriculumStore::new(pool.clone(), retry);
        let progress = ProgressStore::new(pool.clone(), curriculum.clone(), retry);
        let attempts = AttemptStore::new(pool.clone(), retry);
        let generator = TrackGenerator::new(generator, curriculum.clone(), config.generation_timeout);
        let orchestrator = Arc::new(SessionOrchestrator::new(
            curriculum.clone(),
            progress.clone(),
            attempts.clone(),
            generator.clone(),
            config.session_idle_ttl,
        ));

        Self {
            pool,
            config,
            curriculum,
            progress,
            attempts,
            generator,
            orchestrator,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
