//! Shared application state for request handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::health::HealthService;
use crate::logging::LoggerFactory;

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
///
/// Contains the application configuration, the health service, and the
/// factory that creates a logger for each request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub health: Arc<dyn HealthService>,
    pub loggers: LoggerFactory,
}

impl AppState {
    pub fn new(config: AppConfig, health: Arc<dyn HealthService>, loggers: LoggerFactory) -> Self {
        Self {
            config: Arc::new(config),
            health,
            loggers,
        }
    }
}
