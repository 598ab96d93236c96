use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Signal intake
        .route("/webhook", post(handlers::webhook))
        // Operator endpoints
        .route("/status", get(handlers::status))
        .route("/cancel_all", post(handlers::cancel_all))
        .route("/close_position", post(handlers::close_position))
        // Add state and CORS
        .with_state(state)
        .layer(cors)
}
