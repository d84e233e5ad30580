//! Request-scoped logger.
//!
//! A [`LoggerFactory`] is built once at startup and holds the process-wide
//! pieces: the sinks and the clock. For every inbound request the middleware
//! calls [`LoggerFactory::connect`] to get a fresh [`RequestLogger`], binds the
//! request's trace id, application name, context and URL, and hands it to
//! handlers through request extensions.
//!
//! Bindings are copied into each record when it is built, so rebinding only
//! affects later calls.

use axum::http::{HeaderMap, Method};

use super::clock::{format_timestamp, LogClock};
use super::curl::to_curl;
use super::level::LogLevel;
use super::record::{new_trace_id, normalize, ErrorRecord, Failure, Fields, LogRecord};
use super::sink::LogSinks;

/// Process-wide logger configuration shared by all requests.
#[derive(Clone)]
pub struct LoggerFactory {
    sinks: LogSinks,
    clock: LogClock,
    application: Option<String>,
}

impl LoggerFactory {
    pub fn new(sinks: LogSinks, clock: LogClock) -> Self {
        Self {
            sinks,
            clock,
            application: None,
        }
    }

    /// Default application name bound to every new logger
    pub fn with_application(mut self, name: impl Into<String>) -> Self {
        self.application = Some(name.into());
        self
    }

    /// Create a logger for one request with the given minimum level.
    pub fn connect(&self, level: LogLevel) -> RequestLogger {
        RequestLogger {
            sinks: self.sinks.clone(),
            clock: self.clock,
            level,
            bindings: Bindings {
                trace_id: new_trace_id(),
                application: self.application.clone(),
                context: None,
                url: None,
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Bindings {
    trace_id: String,
    application: Option<String>,
    context: Option<String>,
    url: Option<String>,
}

/// Level for an HTTP exchange in the access log.
///
/// Errors win over everything, redirects are not logged, the rest is info.
pub fn classify(status: u16, has_error: bool) -> Option<LogLevel> {
    if status >= 400 || has_error {
        Some(LogLevel::Error)
    } else if (300..400).contains(&status) {
        None
    } else {
        Some(LogLevel::Info)
    }
}

/// Logger bound to a single request.
#[derive(Clone)]
pub struct RequestLogger {
    sinks: LogSinks,
    clock: LogClock,
    level: LogLevel,
    bindings: Bindings,
}

impl RequestLogger {
    pub fn trace_id(&self) -> &str {
        &self.bindings.trace_id
    }

    pub fn set_application(&mut self, name: impl Into<String>) {
        self.bindings.application = Some(name.into());
    }

    pub fn set_context(&mut self, context: impl Into<String>) {
        self.bindings.context = Some(context.into());
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.bindings.url = Some(url.into());
    }

    pub fn set_trace_id(&mut self, trace_id: impl Into<String>) {
        self.bindings.trace_id = trace_id.into();
    }

    /// Info-level record; the default entry point.
    pub fn log(&self, message: impl Into<String>, context: Option<&str>, fields: Option<Fields>) {
        self.log_at(LogLevel::Info, message, context, fields);
    }

    pub fn trace(&self, message: impl Into<String>, context: Option<&str>, fields: Option<Fields>) {
        self.log_at(LogLevel::Trace, message, context, fields);
    }

    pub fn info(&self, message: impl Into<String>, context: Option<&str>, fields: Option<Fields>) {
        self.log_at(LogLevel::Info, message, context, fields);
    }

    pub fn warn(&self, message: impl Into<String>, context: Option<&str>, fields: Option<Fields>) {
        self.log_at(LogLevel::Warn, message, context, fields);
    }

    /// Write a plain record at an explicit level.
    pub fn log_at(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        context: Option<&str>,
        fields: Option<Fields>,
    ) {
        if !level.enabled_at(self.level) {
            return;
        }
        let record = self.build(level, message.into(), context, fields.unwrap_or_default(), None);
        self.sinks.write(&record);
    }

    /// Normalize and log a failure at error level.
    ///
    /// Returns the normalized record so callers can reuse it, e.g. for a response.
    pub fn error(
        &self,
        failure: &Failure,
        message: Option<&str>,
        context: Option<&str>,
    ) -> ErrorRecord {
        self.log_failure(LogLevel::Error, failure, message, context)
    }

    /// Same normalization as [`error`](Self::error), recorded at fatal level.
    /// Does not stop the process.
    pub fn fatal(
        &self,
        failure: &Failure,
        message: Option<&str>,
        context: Option<&str>,
    ) -> ErrorRecord {
        self.log_failure(LogLevel::Fatal, failure, message, context)
    }

    /// Log an already-normalized error record at error level.
    pub fn error_record(&self, error: ErrorRecord, message: Option<&str>, fields: Option<Fields>) {
        if !LogLevel::Error.enabled_at(self.level) {
            return;
        }
        let message = message.map(str::to_string).unwrap_or_else(|| error.message.clone());
        let context = error.context.clone();
        let record = self.build(
            LogLevel::Error,
            message,
            context.as_deref(),
            fields.unwrap_or_default(),
            Some(error),
        );
        self.sinks.write(&record);
    }

    /// Log an outbound HTTP exchange with a curl rendition of the request.
    ///
    /// `status` is `None` when no response was received. Redirects are not logged.
    pub fn outbound(
        &self,
        method: &Method,
        url: &str,
        headers: &HeaderMap,
        body: Option<&[u8]>,
        status: Option<u16>,
    ) {
        let level = match status {
            Some(status) => classify(status, false),
            None => Some(LogLevel::Error),
        };
        let Some(level) = level else {
            return;
        };

        let mut fields = Fields::new();
        fields.insert("method".into(), method.as_str().into());
        fields.insert("url".into(), url.into());
        if let Some(status) = status {
            fields.insert("statusCode".into(), status.into());
        }
        fields.insert("curl".into(), to_curl(method, url, headers, body).into());

        let message = match status {
            Some(status) => format!("{} {} -> {}", method, url, status),
            None => format!("{} {} -> no response", method, url),
        };
        self.log_at(level, message, Some("HttpClient"), Some(fields));
    }

    fn log_failure(
        &self,
        level: LogLevel,
        failure: &Failure,
        message: Option<&str>,
        context: Option<&str>,
    ) -> ErrorRecord {
        let error = normalize(failure);
        if level.enabled_at(self.level) {
            let message = message.map(str::to_string).unwrap_or_else(|| error.message.clone());
            let context = context.map(str::to_string).or_else(|| error.context.clone());
            let record = self.build(
                level,
                message,
                context.as_deref(),
                Fields::new(),
                Some(error.clone()),
            );
            self.sinks.write(&record);
        }
        error
    }

    fn build(
        &self,
        level: LogLevel,
        message: String,
        context: Option<&str>,
        fields: Fields,
        error: Option<ErrorRecord>,
    ) -> LogRecord {
        let now = self.clock.now();
        // String failures carry a fresh id; others fall back to the request's
        let trace_id = error
            .as_ref()
            .and_then(|e| e.trace_id.clone())
            .unwrap_or_else(|| self.bindings.trace_id.clone());

        LogRecord {
            level,
            message,
            context: context
                .map(str::to_string)
                .or_else(|| self.bindings.context.clone()),
            fields,
            timestamp: format_timestamp(&now),
            recorded_at: now,
            trace_id,
            application: self.bindings.application.clone(),
            url: self.bindings.url.clone(),
            error,
        }
    }
}
