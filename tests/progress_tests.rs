// tests/progress_tests.rs

mod common;

use common::{ScriptedGenerator, budgeting_request, test_state};
use daily_learn::{error::TrackError, models::progress::ProgressStatus, state::AppState};

async fn state_with_track(days: i64) -> (AppState, i64) {
    let state = test_state(ScriptedGenerator::budgeting(days)).await;
    let curriculum = state
        .generator
        .generate(&budgeting_request(days))
        .await
        .expect("Failed to generate track");
    (state, curriculum.track.id)
}

#[tokio::test]
async fn first_access_starts_at_day_one() {
    let (state, track_id) = state_with_track(3).await;

    let progress = state.progress.get_or_create("alice", track_id).await.unwrap();
    assert_eq!(progress.current_day, 1);
    assert_eq!(progress.status, ProgressStatus::InProgress);
    assert!(progress.started_at.is_some());
    assert!(progress.completed_days.is_empty());

    // A second access returns the same record.
    let again = state.progress.get_or_create("alice", track_id).await.unwrap();
    assert_eq!(again.id, progress.id);
}

#[tokio::test]
async fn passing_day_one_moves_to_day_two() {
    let (state, track_id) = state_with_track(3).await;
    state.progress.get_or_create("alice", track_id).await.unwrap();

    let progress = state.progress.advance("alice", track_id, 1, 100).await.unwrap();
    assert_eq!(progress.current_day, 2);
    assert!(progress.is_day_completed(1));
    assert_eq!(progress.average_quiz_score, 100.0);
    assert!((progress.overall_progress - 100.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn failing_score_leaves_progress_unchanged() {
    let (state, track_id) = state_with_track(3).await;
    state.progress.get_or_create("alice", track_id).await.unwrap();

    let err = state.progress.advance("alice", track_id, 1, 50).await.unwrap_err();
    assert!(matches!(
        err,
        TrackError::ScoreBelowThreshold {
            score: 50,
            passing_score: 70
        }
    ));

    let progress = state.progress.get("alice", track_id).await.unwrap();
    assert_eq!(progress.current_day, 1);
    assert!(progress.completed_days.is_empty());
}

#[tokio::test]
async fn threshold_score_passes() {
    let (state, track_id) = state_with_track(3).await;
    state.progress.get_or_create("alice", track_id).await.unwrap();

    let progress = state.progress.advance("alice", track_id, 1, 70).await.unwrap();
    assert_eq!(progress.current_day, 2);
}

#[tokio::test]
async fn completing_every_day_finishes_the_track() {
    let (state, track_id) = state_with_track(3).await;
    state.progress.get_or_create("alice", track_id).await.unwrap();

    state.progress.advance("alice", track_id, 1, 100).await.unwrap();
    state.progress.advance("alice", track_id, 2, 80).await.unwrap();
    let progress = state.progress.advance("alice", track_id, 3, 90).await.unwrap();

    assert_eq!(progress.status, ProgressStatus::Completed);
    assert_eq!(progress.current_day, 3);
    assert!(progress.completed_at.is_some());
    assert_eq!(progress.overall_progress, 100.0);
    assert_eq!(progress.average_quiz_score, 90.0);

    // Finished days cannot be completed again.
    let err = state.progress.advance("alice", track_id, 3, 100).await.unwrap_err();
    assert!(matches!(err, TrackError::StaleDay { .. }));
    assert!(state.curriculum.get_lesson(track_id, 4).await.unwrap().is_none());
}

#[tokio::test]
async fn advancing_past_a_finished_track_changes_nothing() {
    let (state, track_id) = state_with_track(1).await;
    state.progress.get_or_create("alice", track_id).await.unwrap();
    let finished = state.progress.advance("alice", track_id, 1, 100).await.unwrap();
    assert!(finished.is_completed());

    let again = state.progress.advance("alice", track_id, 2, 100).await.unwrap();
    assert_eq!(again.id, finished.id);
    assert_eq!(again.current_day, 1);
    assert_eq!(again.status, ProgressStatus::Completed);
    assert_eq!(again.completed_days.len(), 1);
    assert_eq!(again.completed_at, finished.completed_at);

    // Repeating the last day is still stale.
    assert!(matches!(
        state.progress.advance("alice", track_id, 1, 100).await,
        Err(TrackError::StaleDay {
            current: 1,
            submitted: 1
        })
    ));
}

#[tokio::test]
async fn closed_store_is_unavailable() {
    let (state, track_id) = state_with_track(1).await;
    state.progress.get_or_create("alice", track_id).await.unwrap();
    state.pool.close().await;

    let err = state.progress.get("alice", track_id).await.unwrap_err();
    assert!(matches!(err, TrackError::StoreUnavailable { .. }));
    assert_eq!(err.code(), "store_unavailable");

    let err = state.curriculum.get_track(track_id).await.unwrap_err();
    assert!(matches!(err, TrackError::StoreUnavailable { .. }));
    assert!(matches!(
        state.progress.advance("alice", track_id, 1, 100).await,
        Err(TrackError::StoreUnavailable { .. })
    ));
}

#[tokio::test]
async fn concurrent_completions_of_the_same_day_admit_one() {
    let (state, track_id) = state_with_track(3).await;
    state.progress.get_or_create("alice", track_id).await.unwrap();
    state.progress.advance("alice", track_id, 1, 100).await.unwrap();

    let (first, second) = tokio::join!(
        state.progress.advance("alice", track_id, 2, 80),
        state.progress.advance("alice", track_id, 2, 80),
    );

    let outcomes = [first, second];
    let succeeded = outcomes.iter().filter(|r| r.is_ok()).count();
    let stale = outcomes
        .iter()
        .filter(|r| matches!(r, Err(TrackError::StaleDay { .. })))
        .count();
    assert_eq!(succeeded, 1);
    assert_eq!(stale, 1);

    let progress = state.progress.get("alice", track_id).await.unwrap();
    assert_eq!(progress.current_day, 3);
    assert_eq!(progress.completed_days.len(), 2);
}

#[tokio::test]
async fn repeated_completion_is_rejected_as_stale() {
    let (state, track_id) = state_with_track(3).await;
    state.progress.get_or_create("alice", track_id).await.unwrap();

    state.progress.advance("alice", track_id, 1, 100).await.unwrap();
    let err = state.progress.advance("alice", track_id, 1, 100).await.unwrap_err();
    assert!(matches!(
        err,
        TrackError::StaleDay {
            current: 2,
            submitted: 1
        }
    ));

    // Skipping ahead is just as stale.
    let err = state.progress.advance("alice", track_id, 3, 100).await.unwrap_err();
    assert!(matches!(err, TrackError::StaleDay { .. }));
}

#[tokio::test]
async fn current_day_stays_within_bounds() {
    let (state, track_id) = state_with_track(2).await;
    let mut last = state.progress.get_or_create("alice", track_id).await.unwrap();

    for day in 1..=2 {
        let _ = state.progress.advance("alice", track_id, day, 40).await;
        let next = state.progress.advance("alice", track_id, day, 100).await.unwrap();
        assert!(next.current_day >= last.current_day);
        assert!(next.current_day >= 1 && next.current_day <= 2);
        last = next;
    }
    assert!(last.is_completed());
}

#[tokio::test]
async fn progress_is_per_user() {
    let (state, track_id) = state_with_track(3).await;
    state.progress.get_or_create("alice", track_id).await.unwrap();
    state.progress.get_or_create("bob", track_id).await.unwrap();

    state.progress.advance("alice", track_id, 1, 100).await.unwrap();
    assert_eq!(state.progress.get("bob", track_id).await.unwrap().current_day, 1);

    let summaries = state.progress.list_for_user("alice").await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].track_id, track_id);
    assert_eq!(summaries[0].current_day, 2);
    assert_eq!(summaries[0].total_days, 3);
}

#[tokio::test]
async fn unknown_track_and_missing_progress_are_not_found() {
    let (state, track_id) = state_with_track(1).await;

    assert!(matches!(
        state.progress.get_or_create("alice", 9999).await,
        Err(TrackError::NotFound(_))
    ));
    assert!(matches!(
        state.progress.advance("alice", track_id, 1, 100).await,
        Err(TrackError::NotFound(_))
    ));
}

#[tokio::test]
async fn out_of_range_score_is_invalid_input() {
    let (state, track_id) = state_with_track(1).await;
    state.progress.get_or_create("alice", track_id).await.unwrap();

    assert!(matches!(
        state.progress.advance("alice", track_id, 1, 101).await,
        Err(TrackError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn pause_and_resume() {
    let (state, track_id) = state_with_track(1).await;
    state.progress.get_or_create("alice", track_id).await.unwrap();

    let paused = state.progress.pause("alice", track_id).await.unwrap();
    assert_eq!(paused.status, ProgressStatus::Paused);

    let resumed = state.progress.get_or_create("alice", track_id).await.unwrap();
    assert_eq!(resumed.status, ProgressStatus::InProgress);

    state.progress.advance("alice", track_id, 1, 100).await.unwrap();
    assert!(matches!(
        state.progress.pause("alice", track_id).await,
        Err(TrackError::InvalidState { .. })
    ));
    // Re-opening a completed track keeps it completed.
    let reopened = state.progress.get_or_create("alice", track_id).await.unwrap();
    assert_eq!(reopened.status, ProgressStatus::Completed);
}
