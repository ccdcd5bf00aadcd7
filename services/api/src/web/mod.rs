pub mod cors;
pub mod messages;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod tabs;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use messages::message_handler;
pub use rest::{badge_handler, health_handler};
pub use state::AppState;

/// The API routes with state applied. The binary adds `cors::cors_layer` and the
/// Swagger UI on top.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/badge", get(badge_handler))
        .route("/messages", post(message_handler))
        .with_state(app_state)
}
