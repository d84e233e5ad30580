//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::Router;

use monorepo_api::config::AppConfig;
use monorepo_api::health::HealthService;
use monorepo_api::logging::{LogClock, LogRecord, LogSink, LogSinks, LoggerFactory};
use monorepo_api::{create_router, AppError, AppState};

/// Sink that keeps every record in memory.
#[derive(Default)]
pub struct MemorySink(Mutex<Vec<LogRecord>>);

impl LogSink for MemorySink {
    fn write(&self, record: &LogRecord) {
        self.0.lock().unwrap().push(record.clone());
    }
}

impl MemorySink {
    pub fn records(&self) -> Vec<LogRecord> {
        self.0.lock().unwrap().clone()
    }
}

/// Health service that always fails with the given error factory.
pub struct FailingHealth(pub fn() -> AppError);

#[async_trait]
impl HealthService for FailingHealth {
    async fn get_text(&self) -> Result<String, AppError> {
        Err((self.0)())
    }
}

pub fn test_config(app_name: &str) -> AppConfig {
    toml::from_str(&format!(
        r#"
[application]
name = "{}"

[http]
host = "127.0.0.1"
port = 0

[logging]
level = "trace"
timezone = "utc"
"#,
        app_name
    ))
    .unwrap()
}

pub fn setup(config: AppConfig, health: Arc<dyn HealthService>) -> (Router, Arc<MemorySink>) {
    let memory = Arc::new(MemorySink::default());
    let sinks = LogSinks::new().with(memory.clone());
    let loggers = LoggerFactory::new(sinks, LogClock::utc())
        .with_application(config.application.name());
    let state = AppState::new(config, health, loggers);
    (create_router(state), memory)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("host", "api.test")
        .body(Body::empty())
        .unwrap()
}

pub async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
