// tests/generation_tests.rs

mod common;

use std::{sync::Arc, time::Duration};

use common::{
    JWT_SECRET, Reply, ScriptedGenerator, budgeting_request, budgeting_track, count_rows,
    test_state, test_state_with,
};
use daily_learn::{
    config::Config,
    error::{GenerationFailure, TrackError},
    models::quiz::QuestionType,
};
use serde_json::json;

fn failure(err: TrackError) -> GenerationFailure {
    match err {
        TrackError::Generation { reason, .. } => reason,
        other => panic!("expected a generation failure, got {:?}", other),
    }
}

async fn assert_nothing_stored(pool: &sqlx::SqlitePool) {
    for table in ["learning_tracks", "track_days", "quizzes", "quiz_questions"] {
        assert_eq!(count_rows(pool, table).await, 0, "{} should be empty", table);
    }
}

#[tokio::test]
async fn valid_curriculum_is_stored_whole() {
    let state = test_state(ScriptedGenerator::budgeting(3)).await;

    let curriculum = state.generator.generate(&budgeting_request(3)).await.unwrap();
    assert_eq!(curriculum.track.title, "Budgeting Basics");
    assert_eq!(curriculum.track.total_days, 3);
    assert!(curriculum.track.is_active);
    assert_eq!(curriculum.lessons.len(), 3);
    for (i, lesson) in curriculum.lessons.iter().enumerate() {
        assert_eq!(lesson.day.day_number, i as i64 + 1);
        assert_eq!(lesson.quiz.questions.len(), 2);
        assert_eq!(lesson.quiz.passing_score, 70);
        assert_eq!(lesson.quiz.questions[1].question_type, QuestionType::TrueFalse);
    }

    assert_eq!(count_rows(&state.pool, "learning_tracks").await, 1);
    assert_eq!(count_rows(&state.pool, "track_days").await, 3);
    assert_eq!(count_rows(&state.pool, "quiz_questions").await, 6);

    let reloaded = state.curriculum.get_curriculum(curriculum.track.id).await.unwrap();
    assert_eq!(reloaded.lessons.len(), 3);
    assert_eq!(reloaded.lessons[0].quiz.questions[0].options.0, vec!["Needs", "Wants", "Savings"]);
}

#[tokio::test]
async fn answer_outside_options_is_rejected_and_nothing_is_stored() {
    let mut track = budgeting_track(3, 3);
    track["days"][1]["quiz"]["questions"][0]["correctAnswer"] = json!("Emergency fund");
    let state = test_state(ScriptedGenerator::new(Reply::Json(track.to_string()))).await;

    let err = state.generator.generate(&budgeting_request(3)).await.unwrap_err();
    assert_eq!(err.code(), "invalid_schema");
    assert_eq!(failure(err), GenerationFailure::InvalidSchema);
    assert_nothing_stored(&state.pool).await;
}

#[tokio::test]
async fn wrong_day_count_is_invalid_schema() {
    let state = test_state(ScriptedGenerator::budgeting(2)).await;

    let err = state.generator.generate(&budgeting_request(3)).await.unwrap_err();
    assert_eq!(failure(err), GenerationFailure::InvalidSchema);
    assert_nothing_stored(&state.pool).await;
}

#[tokio::test]
async fn unreachable_generator_is_upstream_unavailable() {
    let state = test_state(ScriptedGenerator::new(Reply::Unavailable)).await;

    let err = state.generator.generate(&budgeting_request(3)).await.unwrap_err();
    assert_eq!(failure(err), GenerationFailure::UpstreamUnavailable);
    assert_nothing_stored(&state.pool).await;
}

#[tokio::test]
async fn slow_generator_times_out() {
    let mut config = Config::for_tests(JWT_SECRET);
    config.generation_timeout = Duration::from_millis(50);
    let state = test_state_with(Arc::new(ScriptedGenerator::new(Reply::Hang)), config).await;

    let err = state.generator.generate(&budgeting_request(3)).await.unwrap_err();
    assert_eq!(failure(err), GenerationFailure::UpstreamUnavailable);
    assert_nothing_stored(&state.pool).await;
}

#[tokio::test]
async fn dayless_response_is_empty_result() {
    let raw = json!({
        "title": "Budgeting Basics",
        "description": "Nothing here",
        "difficulty": "beginner",
        "days": []
    });
    let state = test_state(ScriptedGenerator::new(Reply::Json(raw.to_string()))).await;

    let err = state.generator.generate(&budgeting_request(3)).await.unwrap_err();
    assert_eq!(failure(err), GenerationFailure::EmptyResult);
    assert_nothing_stored(&state.pool).await;
}

#[tokio::test]
async fn invalid_request_never_reaches_the_generator() {
    let generator = Arc::new(ScriptedGenerator::budgeting(3));
    let state = test_state_with(generator.clone(), Config::for_tests(JWT_SECRET)).await;

    let mut request = budgeting_request(3);
    request.topic = "   ".to_string();
    assert!(matches!(
        state.generator.generate(&request).await,
        Err(TrackError::InvalidInput(_))
    ));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn catalog_lists_generated_tracks() {
    let state = test_state(ScriptedGenerator::budgeting(1)).await;
    let first = state.generator.generate(&budgeting_request(1)).await.unwrap();
    let second = state.generator.generate(&budgeting_request(1)).await.unwrap();

    let catalog = state.curriculum.list_active().await.unwrap();
    let ids: Vec<i64> = catalog.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![second.track.id, first.track.id]);
}
