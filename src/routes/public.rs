use crate::AppState;
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints that skip the auth gate.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
}
