//! Request logging middleware.
//!
//! Creates a request-scoped logger for each incoming request and binds the
//! trace id, application name, context and reconstructed URL to it. The logger
//! is placed in the request extensions for handlers. Once the response is
//! ready, one access-log line is written at the level given by
//! [`classify`](crate::logging::classify).

use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::logging::{classify, curl::to_curl, ErrorRecord, Fields, LogLevel};
use crate::state::AppState;

/// Header carrying the trace id in both directions
pub const TRACE_ID_HEADER: &str = "traceid";

/// Rebuild the absolute URL the client used.
pub fn request_url(headers: &HeaderMap, uri: &axum::http::Uri) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .or(uri.scheme_str())
        .unwrap_or("http");
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .or(uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    format!("{}://{}{}", scheme, host, path)
}

/// Middleware that binds a request logger and writes the access log.
///
/// This should be the outermost middleware layer so the span and the logger
/// cover all request processing.
pub async fn request_log_layer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let url = request_url(request.headers(), request.uri());

    let mut logger = state.loggers.connect(state.config.logging.level);
    if let Some(trace_id) = request
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        logger.set_trace_id(trace_id);
    }
    logger.set_application(state.config.application.name());
    logger.set_context(format!("{} {}", method, path));
    logger.set_url(url.clone());

    // Kept for the curl rendition of failed exchanges
    let request_headers = request.headers().clone();
    request.extensions_mut().insert(logger.clone());

    let span = tracing::info_span!(
        "request",
        trace_id = %logger.trace_id(),
        method = %method,
        path = %path,
        duration_ms = tracing::field::Empty,
    );

    let start = Instant::now();

    async move {
        let mut response = next.run(request).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::Span::current().record("duration_ms", duration_ms);

        let status = response.status().as_u16();
        let error = response.extensions_mut().remove::<ErrorRecord>();

        if let Some(level) = classify(status, error.is_some()) {
            let mut fields = Fields::new();
            fields.insert("method".into(), method.as_str().into());
            fields.insert("statusCode".into(), status.into());
            fields.insert("durationMs".into(), duration_ms.into());

            let message = format!("{} {} {} {}ms", method, path, status, duration_ms);
            match (level, error) {
                (LogLevel::Error, error) => {
                    fields.insert(
                        "curl".into(),
                        to_curl(&method, &url, &request_headers, None).into(),
                    );
                    match error {
                        Some(error) => logger.error_record(error, Some(&message), Some(fields)),
                        None => logger.log_at(LogLevel::Error, message, None, Some(fields)),
                    }
                }
                (level, _) => logger.log_at(level, message, None, Some(fields)),
            }
        }

        if let Ok(value) = HeaderValue::from_str(logger.trace_id()) {
            response.headers_mut().insert(TRACE_ID_HEADER, value);
        }

        response
    }
    .instrument(span)
    .await
}
