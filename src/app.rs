use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/feedback",
            get(handlers::list_feedback).post(handlers::submit_feedback),
        )
        .route("/api/feedback/:id", get(handlers::get_feedback))
        .route("/api/feedback/:id/status", post(handlers::update_status))
        .route("/api/feedback/:id/vote", post(handlers::cast_vote))
        .route("/api/stats", get(handlers::get_stats))
        .route("/api/login", post(handlers::login))
        .route("/api/logout", post(handlers::logout))
        .route("/api/session", get(handlers::current_session))
        .with_state(state)
}
