//! HTTP route handlers.
//!
//! Every request passes through the request logging middleware, which binds a
//! request-scoped logger (available to handlers as `Extension<RequestLogger>`)
//! and writes the access log.

pub mod health;

use axum::{middleware, routing::get, Router};
use axum::http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::CACHE_CONTROL_HEALTH;
use crate::middleware::request_log_layer;
use crate::state::AppState;

/// Creates the Axum router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Health check - no caching, always fresh for liveness probes
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_HEALTH),
        ));

    Router::new()
        .merge(health_routes)
        .with_state(state.clone())
        // Request logging - binds the per-request logger and writes the access log
        .layer(middleware::from_fn_with_state(state, request_log_layer))
}
