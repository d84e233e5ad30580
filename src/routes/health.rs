//! Health check endpoint for container orchestration.
//!
//! Returns the health service's text with 200 OK, or the service's error as
//! `{statusCode, message}` JSON with the error's status.

use axum::{extract::State, Extension};

use crate::error::AppError;
use crate::logging::RequestLogger;
use crate::state::AppState;

/// Health check handler.
pub async fn health(
    State(state): State<AppState>,
    Extension(logger): Extension<RequestLogger>,
) -> Result<String, AppError> {
    let text = state.health.get_text().await?;
    logger.trace("Health check passed", Some("HealthController"), None);
    Ok(text)
}
