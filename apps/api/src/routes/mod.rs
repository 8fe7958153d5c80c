pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::apply::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/apply", post(handlers::handle_apply))
        .route("/api/apply/history", get(handlers::handle_history))
        .route("/api/apply/track", post(handlers::handle_track))
        .with_state(state)
}
