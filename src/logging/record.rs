//! Log and error record types, and normalization of failures into error records.
//!
//! Failures are classified where they are raised: callers build a [`Failure`]
//! variant instead of handing the logger an arbitrary value to inspect. The
//! [`normalize`] function then maps every variant onto exactly one
//! [`ErrorRecord`], which is what gets logged and what HTTP error responses
//! are rendered from.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::level::LogLevel;

/// Structured fields attached to a log record
pub type Fields = Map<String, Value>;

/// Status used when a failure does not declare one
pub const DEFAULT_ERROR_STATUS: u16 = 500;

/// Message returned to clients for errors whose detail must not leak
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// A single log line, as delivered to every sink.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub fields: Fields,
    /// Local time rendered with the configured offset
    pub timestamp: String,
    #[serde(rename = "@timestamp")]
    pub recorded_at: DateTime<FixedOffset>,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

/// Classification tag carried by every [`ErrorRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Explicit status and message, already well-formed
    Application,
    /// Bare runtime error, normalized to 500
    Generic,
    /// Ad-hoc string, normalized to 500 with a generated trace id
    String,
    /// Passed through without guarantees
    Unknown,
}

/// Canonical error shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub status_code: u16,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl ErrorRecord {
    /// JSON body sent to HTTP clients: `{statusCode, message}`.
    pub fn response_body(&self) -> Value {
        json!({
            "statusCode": self.status_code,
            "message": self.message,
        })
    }
}

/// What an application exception exposes through its response accessor.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Text(String),
    Body(Value),
}

/// Application exception with an explicit status and response payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ApiException {
    pub status_code: Option<u16>,
    pub message: String,
    pub context: Option<String>,
    pub response: ApiResponse,
    pub trace_id: Option<String>,
}

impl ApiException {
    /// Exception whose response is its own message, with no declared status.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status_code: None,
            response: ApiResponse::Text(message.clone()),
            message,
            context: None,
            trace_id: None,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Replace the response with a structured body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.response = ApiResponse::Body(body);
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

/// Runtime error type names that get generic handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeKind {
    Error,
    TypeError,
    Other(String),
}

/// A failure handed to the logger, tagged by shape where it was raised.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    Message(String),
    Api(ApiException),
    Runtime {
        kind: RuntimeKind,
        message: String,
        stack: Option<String>,
        trace_id: Option<String>,
    },
    Opaque(Value),
}

impl Failure {
    /// Generic runtime error with the plain `Error` type name
    pub fn error(message: impl Into<String>) -> Self {
        Failure::Runtime {
            kind: RuntimeKind::Error,
            message: message.into(),
            stack: None,
            trace_id: None,
        }
    }

}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Failure::Message(message.to_string())
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Failure::Message(message)
    }
}

impl From<ApiException> for Failure {
    fn from(exception: ApiException) -> Self {
        Failure::Api(exception)
    }
}

/// Generate a fresh trace id
pub fn new_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Normalize a failure into its canonical error record.
///
/// String failures always get a freshly generated trace id; every other shape
/// keeps its own trace id, if it has one.
pub fn normalize(failure: &Failure) -> ErrorRecord {
    match failure {
        Failure::Message(message) => ErrorRecord {
            status_code: DEFAULT_ERROR_STATUS,
            message: message.clone(),
            kind: ErrorKind::String,
            context: None,
            stack: None,
            body: None,
            trace_id: Some(new_trace_id()),
        },
        Failure::Api(exception) => normalize_api(exception),
        Failure::Runtime {
            kind,
            message,
            stack,
            trace_id,
        } => match kind {
            RuntimeKind::Error | RuntimeKind::TypeError => ErrorRecord {
                status_code: DEFAULT_ERROR_STATUS,
                message: message.clone(),
                kind: ErrorKind::Generic,
                context: None,
                stack: stack.clone(),
                body: None,
                trace_id: trace_id.clone(),
            },
            RuntimeKind::Other(name) => ErrorRecord {
                status_code: DEFAULT_ERROR_STATUS,
                message: message.clone(),
                kind: ErrorKind::Unknown,
                context: None,
                stack: stack.clone(),
                body: Some(json!({ "name": name, "message": message })),
                trace_id: trace_id.clone(),
            },
        },
        Failure::Opaque(value) => ErrorRecord {
            status_code: status_field(value).unwrap_or(DEFAULT_ERROR_STATUS),
            message: string_field(value, "message").unwrap_or_default(),
            kind: ErrorKind::Unknown,
            context: string_field(value, "context"),
            stack: string_field(value, "stack"),
            body: Some(value.clone()),
            trace_id: trace_id_field(value),
        },
    }
}

fn normalize_api(exception: &ApiException) -> ErrorRecord {
    match &exception.response {
        ApiResponse::Text(text) => ErrorRecord {
            status_code: declared_status(exception).unwrap_or(DEFAULT_ERROR_STATUS),
            message: text.clone(),
            kind: ErrorKind::Application,
            context: exception.context.clone(),
            stack: None,
            body: None,
            trace_id: exception.trace_id.clone(),
        },
        ApiResponse::Body(body) => ErrorRecord {
            status_code: declared_status(exception)
                .or_else(|| status_field(body))
                .unwrap_or(DEFAULT_ERROR_STATUS),
            message: string_field(body, "message").unwrap_or_else(|| exception.message.clone()),
            kind: ErrorKind::Application,
            context: exception.context.clone(),
            stack: None,
            body: Some(body.clone()),
            trace_id: exception
                .trace_id
                .clone()
                .or_else(|| trace_id_field(body)),
        },
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn is_http_status(code: &u16) -> bool {
    (100..=599).contains(code)
}

/// Declared status, ignored when it is not a usable HTTP status
fn declared_status(exception: &ApiException) -> Option<u16> {
    exception.status_code.filter(is_http_status)
}

/// Numeric `statusCode` or `status`, if it fits an HTTP status
fn status_field(value: &Value) -> Option<u16> {
    ["statusCode", "status"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_u64))
        .find_map(|code| u16::try_from(code).ok().filter(is_http_status))
}

fn trace_id_field(value: &Value) -> Option<String> {
    string_field(value, "traceid").or_else(|| string_field(value, "traceId"))
}
