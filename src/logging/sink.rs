//! Destinations for log records.
//!
//! Every request-scoped logger writes each record to all configured sinks. A
//! sink must never block the request path and must never fail the caller; any
//! delivery problem is reported on the console instead.

use std::sync::Arc;

use super::level::LogLevel;
use super::record::LogRecord;
use crate::config::REQUEST_LOG_TARGET;

/// A destination for structured log records.
pub trait LogSink: Send + Sync {
    fn write(&self, record: &LogRecord);
}

/// Shared, cloneable set of sinks.
#[derive(Clone, Default)]
pub struct LogSinks {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl LogSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn write(&self, record: &LogRecord) {
        for sink in &self.sinks {
            sink.write(record);
        }
    }
}

/// Human-readable console output through `tracing`.
///
/// Colors and layout come from the subscriber's fmt layer installed in
/// `init_tracing`; this sink only maps levels and fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

macro_rules! console_event {
    ($level:expr, $record:ident, $fields:ident, $error:ident, $fatal:expr) => {
        tracing::event!(
            target: REQUEST_LOG_TARGET,
            $level,
            trace_id = %$record.trace_id,
            application = $record.application.as_deref().unwrap_or("-"),
            context = $record.context.as_deref().unwrap_or("-"),
            url = $record.url.as_deref(),
            timestamp = %$record.timestamp,
            fields = $fields,
            error = $error,
            fatal = $fatal,
            "{}",
            $record.message
        )
    };
}

impl LogSink for ConsoleSink {
    fn write(&self, record: &LogRecord) {
        let fields = (!record.fields.is_empty())
            .then(|| serde_json::Value::Object(record.fields.clone()).to_string());
        let fields = fields.as_deref();
        let error = record
            .error
            .as_ref()
            .map(|e| format!("{} {:?}: {}", e.status_code, e.kind, e.message));
        let error = error.as_deref();

        match record.level {
            LogLevel::Trace => {
                console_event!(tracing::Level::TRACE, record, fields, error, false)
            }
            LogLevel::Info => console_event!(tracing::Level::INFO, record, fields, error, false),
            LogLevel::Warn => console_event!(tracing::Level::WARN, record, fields, error, false),
            LogLevel::Error => {
                console_event!(tracing::Level::ERROR, record, fields, error, false)
            }
            LogLevel::Fatal => console_event!(tracing::Level::ERROR, record, fields, error, true),
        }
    }
}
