//! HTTP surface: router, handlers, shared state

pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

pub use state::AppState;

/// Build the service router over shared application state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/predict", post(handlers::predict))
        .route("/predict/with-feast", post(handlers::predict_with_feast))
        .with_state(state)
}
