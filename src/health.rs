//! Readiness text for the health endpoint.

use async_trait::async_trait;

use crate::error::AppError;

/// Source of the health endpoint's response text.
#[async_trait]
pub trait HealthService: Send + Sync {
    async fn get_text(&self) -> Result<String, AppError>;
}

/// Reports `"{name} UP!!"` for the configured application name.
#[derive(Debug, Clone)]
pub struct AppHealthService {
    name: String,
}

impl AppHealthService {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl HealthService for AppHealthService {
    async fn get_text(&self) -> Result<String, AppError> {
        Ok(format!("{} UP!!", self.name))
    }
}
