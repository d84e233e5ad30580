//! Render HTTP requests as replayable curl command lines.

use axum::http::{HeaderMap, Method};

/// Headers whose values are masked in curl output
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
];

/// Replacement for masked header values
const MASK: &str = "[REDACTED]";

/// Quote a value for a POSIX shell using single quotes.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Build a curl command equivalent to the given request.
///
/// Header values that are not valid UTF-8 are rendered lossily. Sensitive
/// header values are masked so the result is safe to ship to the log store.
pub fn to_curl(method: &Method, url: &str, headers: &HeaderMap, body: Option<&[u8]>) -> String {
    let mut parts = vec![
        "curl".to_string(),
        "-X".to_string(),
        method.as_str().to_string(),
        shell_quote(url),
    ];

    for (name, value) in headers {
        let value = if SENSITIVE_HEADERS.contains(&name.as_str()) {
            MASK.into()
        } else {
            String::from_utf8_lossy(value.as_bytes())
        };
        parts.push("-H".to_string());
        parts.push(shell_quote(&format!("{}: {}", name.as_str(), value)));
    }

    if let Some(body) = body.filter(|b| !b.is_empty()) {
        parts.push("--data-raw".to_string());
        parts.push(shell_quote(&String::from_utf8_lossy(body)));
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_get_without_headers() {
        let curl = to_curl(&Method::GET, "http://localhost/health", &HeaderMap::new(), None);
        assert_eq!(curl, "curl -X GET 'http://localhost/health'");
    }

    #[test]
    fn test_headers_and_body() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        let curl = to_curl(
            &Method::POST,
            "http://api/orders",
            &headers,
            Some(br#"{"qty":1}"#),
        );
        assert_eq!(
            curl,
            r#"curl -X POST 'http://api/orders' -H 'content-type: application/json' --data-raw '{"qty":1}'"#
        );
    }

    #[test]
    fn test_single_quotes_are_escaped() {
        let curl = to_curl(
            &Method::POST,
            "http://api/notes",
            &HeaderMap::new(),
            Some(b"it's"),
        );
        assert!(curl.ends_with(r"--data-raw 'it'\''s'"));
    }

    #[test]
    fn test_sensitive_headers_are_masked() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer secret"));
        headers.insert("cookie", HeaderValue::from_static("sid=abc"));
        let curl = to_curl(&Method::GET, "http://api/me", &headers, None);
        assert!(!curl.contains("secret"));
        assert!(!curl.contains("sid=abc"));
        assert!(curl.contains("'authorization: [REDACTED]'"));
    }

    #[test]
    fn test_empty_body_is_omitted() {
        let curl = to_curl(&Method::PUT, "http://api/x", &HeaderMap::new(), Some(b""));
        assert!(!curl.contains("--data-raw"));
    }
}
