// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{sessions, tracks},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Every route sits behind `auth_middleware`; the token subject is the
///   learner id.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let track_routes = Router::new()
        .route("/", get(tracks::list_tracks))
        .route("/catalog", get(tracks::list_catalog))
        .route("/generate", post(tracks::generate_track))
        .route("/{id}", get(tracks::get_track))
        .route("/{id}/pause", post(tracks::pause_track))
        .route("/{id}/days/{day}/complete", post(tracks::complete_day))
        .route("/{id}/days/{day}/attempts", get(tracks::list_attempts));

    let session_routes = Router::new()
        .route(
            "/",
            get(sessions::get_session).delete(sessions::abandon_session),
        )
        .route("/select", post(sessions::select_track))
        .route("/lesson", post(sessions::present_lesson))
        .route("/quiz", post(sessions::begin_quiz))
        .route("/answer", post(sessions::submit_answer))
        .route("/evaluate", post(sessions::evaluate))
        .route("/review", post(sessions::review_day))
        .route("/continue", post(sessions::continue_track));

    Router::new()
        .nest("/api/tracks", track_routes)
        .nest("/api/session", session_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
