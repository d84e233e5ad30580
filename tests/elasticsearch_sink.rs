//! Integration tests for Elasticsearch log shipping against a local bulk endpoint.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use chrono::{FixedOffset, TimeZone};

use monorepo_api::config::ElasticsearchConfig;
use monorepo_api::logging::{
    ElasticsearchSink, Failure, LogClock, LogLevel, LogSinks, LoggerFactory, SinkError,
};

#[derive(Clone, Default)]
struct Captured {
    bodies: Arc<Mutex<Vec<String>>>,
    content_types: Arc<Mutex<Vec<String>>>,
}

async fn bulk(
    State(captured): State<Captured>,
    headers: HeaderMap,
    body: String,
) -> Json<serde_json::Value> {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    captured.content_types.lock().unwrap().push(content_type);
    captured.bodies.lock().unwrap().push(body);
    Json(serde_json::json!({ "errors": false, "items": [] }))
}

/// Start a fake cluster and return its base URL.
async fn fake_cluster() -> (String, Captured) {
    let captured = Captured::default();
    let app = Router::new()
        .route("/_bulk", post(bulk))
        .with_state(captured.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), captured)
}

fn utc_clock() -> LogClock {
    LogClock::Fixed(FixedOffset::east_opt(0).unwrap())
}

#[tokio::test]
async fn test_records_are_shipped_as_bulk_ndjson() {
    let (url, captured) = fake_cluster().await;
    let mut config = ElasticsearchConfig::with_url(url);
    config.flush_bytes = 1;

    let (sink, handle) = ElasticsearchSink::spawn(&config).unwrap();
    let loggers = LoggerFactory::new(LogSinks::new().with(Arc::new(sink)), utc_clock())
        .with_application("orders");

    let mut logger = loggers.connect(LogLevel::Info);
    logger.set_trace_id("req-42");
    logger.info("order created", Some("OrdersService"), None);
    logger.error(&Failure::error("payment declined"), None, None);

    drop(logger);
    drop(loggers);
    handle.await.unwrap();

    let bodies = captured.bodies.lock().unwrap().clone();
    let lines: Vec<serde_json::Value> = bodies
        .iter()
        .flat_map(|b| b.lines())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 4);

    let index = lines[0]["index"]["_index"].as_str().unwrap();
    assert!(index.starts_with("monorepo-logs-"));
    assert_eq!(index.len(), "monorepo-logs-YYYY-MM".len());

    assert_eq!(lines[1]["message"], "order created");
    assert_eq!(lines[1]["application"], "orders");
    assert_eq!(lines[1]["traceId"], "req-42");
    assert_eq!(lines[1]["context"], "OrdersService");

    assert_eq!(lines[3]["level"], "error");
    assert_eq!(lines[3]["error"]["statusCode"], 500);
    assert_eq!(lines[3]["error"]["type"], "generic");

    assert!(captured
        .content_types
        .lock()
        .unwrap()
        .iter()
        .all(|ct| ct == "application/x-ndjson"));
}

#[tokio::test]
async fn test_small_records_are_batched_until_close() {
    let (url, captured) = fake_cluster().await;
    let config = ElasticsearchConfig::with_url(url);

    let (sink, handle) = ElasticsearchSink::spawn(&config).unwrap();
    let loggers = LoggerFactory::new(LogSinks::new().with(Arc::new(sink)), utc_clock());
    let logger = loggers.connect(LogLevel::Trace);
    for i in 0..5 {
        logger.trace(format!("tick {}", i), None, None);
    }

    drop(logger);
    drop(loggers);
    handle.await.unwrap();

    let bodies = captured.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0].lines().count(), 10);
}

#[tokio::test]
async fn test_quiet_service_is_flushed_on_interval() {
    let (url, captured) = fake_cluster().await;
    let mut config = ElasticsearchConfig::with_url(url);
    config.flush_interval_secs = 1;

    let (sink, handle) = ElasticsearchSink::spawn(&config).unwrap();
    let loggers = LoggerFactory::new(LogSinks::new().with(Arc::new(sink)), utc_clock());
    loggers.connect(LogLevel::Info).info("lonely record", None, None);

    // Senders stay alive; only the interval can trigger this flush
    let mut shipped = Vec::new();
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        shipped = captured.bodies.lock().unwrap().clone();
        if !shipped.is_empty() {
            break;
        }
    }
    assert_eq!(shipped.len(), 1);
    assert!(shipped[0].contains("lonely record"));

    drop(loggers);
    handle.await.unwrap();
    assert_eq!(captured.bodies.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unreachable_cluster_does_not_fail_callers() {
    let mut config = ElasticsearchConfig::with_url("http://127.0.0.1:9");
    config.flush_bytes = 1;

    let (sink, handle) = ElasticsearchSink::spawn(&config).unwrap();
    let loggers = LoggerFactory::new(LogSinks::new().with(Arc::new(sink)), utc_clock());
    loggers.connect(LogLevel::Info).info("nobody listening", None, None);

    drop(loggers);
    handle.await.unwrap();
}

#[test]
fn test_invalid_url_is_rejected() {
    // Rejected before anything is spawned, so no runtime is needed
    let result = ElasticsearchSink::spawn(&ElasticsearchConfig::with_url("::not-a-url")).map(|_| ());
    assert!(matches!(result, Err(SinkError::InvalidUrl { .. })));
}

#[test]
fn test_index_name_for_fixed_date() {
    let date = FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2024, 5, 15, 0, 0, 0)
        .unwrap()
        .date_naive();
    assert_eq!(
        monorepo_api::logging::index_name("monorepo-logs", date),
        "monorepo-logs-2024-05"
    );
}
