//! Batched shipping of log records to Elasticsearch.
//!
//! Records are rendered to bulk NDJSON on the caller's side and queued on a
//! bounded channel. A background task appends them to a buffer and POSTs the
//! buffer to `{url}/_bulk` once it reaches the configured byte threshold, or
//! when the flush interval elapses with records still buffered. When every
//! sender is dropped the task flushes what is left and exits.
//!
//! Delivery is best-effort: a full queue drops the record, and a failed bulk
//! request is reported on the console and discarded.

use std::time::Duration;

use async_channel::{Receiver, Sender, TrySendError};
use reqwest::Url;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::clock::index_name;
use super::record::LogRecord;
use super::sink::LogSink;
use crate::config::ElasticsearchConfig;

/// Content type required by the bulk API
const NDJSON: &str = "application/x-ndjson";

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Invalid Elasticsearch URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Render one record as a bulk `index` action followed by its document.
///
/// The index is derived from the record's own local date, so records written
/// across a month boundary land in the right index.
pub fn bulk_entry(index_prefix: &str, record: &LogRecord) -> Result<String, serde_json::Error> {
    let index = index_name(index_prefix, record.recorded_at.date_naive());
    let action = json!({ "index": { "_index": index } });
    let document = serde_json::to_string(record)?;
    Ok(format!("{}\n{}\n", action, document))
}

/// Sink half: queues records for the shipping task.
#[derive(Debug, Clone)]
pub struct ElasticsearchSink {
    sender: Sender<String>,
    index_prefix: String,
}

impl ElasticsearchSink {
    /// Create the sink and spawn its shipping task on the current runtime.
    ///
    /// The returned handle completes once every clone of the sink has been
    /// dropped and the final batch has been sent.
    pub fn spawn(config: &ElasticsearchConfig) -> Result<(Self, JoinHandle<()>), SinkError> {
        let bulk_url = bulk_url(&config.url)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        let (sender, receiver) = async_channel::bounded(config.queue_capacity);
        let shipper = BulkShipper {
            receiver,
            client,
            bulk_url,
            credentials: config
                .username
                .clone()
                .zip(config.password.clone()),
            flush_bytes: config.flush_bytes,
            // tokio intervals panic on a zero period
            flush_interval: Duration::from_secs(config.flush_interval_secs.max(1)),
            buffer: String::new(),
            pending: 0,
        };

        tracing::info!(
            url = %config.url,
            index_prefix = %config.index_prefix,
            flush_bytes = config.flush_bytes,
            flush_interval_secs = config.flush_interval_secs,
            queue_capacity = config.queue_capacity,
            has_auth = config.has_credentials(),
            "Elasticsearch log shipping enabled"
        );

        let handle = tokio::spawn(shipper.run());
        let sink = Self {
            sender,
            index_prefix: config.index_prefix.clone(),
        };
        Ok((sink, handle))
    }

    /// Records waiting in the queue
    pub fn queued(&self) -> usize {
        self.sender.len()
    }
}

impl LogSink for ElasticsearchSink {
    fn write(&self, record: &LogRecord) {
        let entry = match bulk_entry(&self.index_prefix, record) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, trace_id = %record.trace_id, "Failed to serialize log record");
                return;
            }
        };

        match self.sender.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    trace_id = %record.trace_id,
                    "Elasticsearch log queue full, dropping record"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Elasticsearch log queue closed, dropping record");
            }
        }
    }
}

fn bulk_url(base: &str) -> Result<Url, SinkError> {
    let raw = format!("{}/_bulk", base.trim_end_matches('/'));
    Url::parse(&raw).map_err(|e| SinkError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })
}

/// Shipping task half: owns the receiver and the bulk buffer.
struct BulkShipper {
    receiver: Receiver<String>,
    client: reqwest::Client,
    bulk_url: Url,
    credentials: Option<(String, String)>,
    flush_bytes: usize,
    flush_interval: Duration,
    buffer: String,
    pending: usize,
}

impl BulkShipper {
    #[tracing::instrument(name = "elasticsearch.shipper", skip(self), fields(url = %self.bulk_url))]
    async fn run(mut self) {
        tracing::debug!("Shipper starting");

        let receiver = self.receiver.clone();
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                entry = receiver.recv() => {
                    let Ok(entry) = entry else { break };
                    self.buffer.push_str(&entry);
                    self.pending += 1;

                    if self.buffer.len() >= self.flush_bytes {
                        self.flush().await;
                    }
                }
                _ = ticker.tick() => {
                    if !self.buffer.is_empty() {
                        tracing::trace!(records = self.pending, "Flush interval elapsed");
                        self.flush().await;
                    }
                }
            }
        }

        // All senders dropped
        self.flush().await;
        tracing::debug!("Shipper stopped");
    }

    async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let body = std::mem::take(&mut self.buffer);
        let records = std::mem::take(&mut self.pending);
        let bytes = body.len();

        let mut request = self
            .client
            .post(self.bulk_url.clone())
            .header(reqwest::header::CONTENT_TYPE, NDJSON)
            .body(body);
        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                let has_item_errors = response
                    .json::<serde_json::Value>()
                    .await
                    .ok()
                    .and_then(|v| v.get("errors").and_then(serde_json::Value::as_bool))
                    .unwrap_or(false);
                if has_item_errors {
                    tracing::warn!(records, bytes, "Elasticsearch rejected some bulk items");
                } else {
                    tracing::trace!(records, bytes, "Shipped log batch");
                }
            }
            Ok(response) => {
                tracing::warn!(
                    status = response.status().as_u16(),
                    records,
                    bytes,
                    "Elasticsearch bulk request failed"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, records, bytes, "Elasticsearch unreachable, dropping log batch");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::clock::format_timestamp;
    use crate::logging::level::LogLevel;
    use chrono::{FixedOffset, TimeZone};

    fn record_at(year: i32, month: u32, day: u32) -> LogRecord {
        let at = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(year, month, day, 12, 0, 0)
            .unwrap();
        LogRecord {
            level: LogLevel::Info,
            message: "shipped".to_string(),
            context: Some("OrdersController".to_string()),
            fields: Default::default(),
            timestamp: format_timestamp(&at),
            recorded_at: at,
            trace_id: "trace-1".to_string(),
            application: Some("orders".to_string()),
            url: None,
            error: None,
        }
    }

    #[test]
    fn test_bulk_entry_targets_monthly_index() {
        let entry = bulk_entry("monorepo-logs", &record_at(2024, 5, 15)).unwrap();
        let mut lines = entry.lines();

        let action: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(action["index"]["_index"], "monorepo-logs-2024-05");

        let doc: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(doc["message"], "shipped");
        assert_eq!(doc["traceId"], "trace-1");
        assert_eq!(doc["level"], "info");
        assert!(doc.get("@timestamp").is_some());

        assert!(lines.next().is_none());
        assert!(entry.ends_with('\n'));
    }

    #[test]
    fn test_bulk_url_handles_trailing_slash() {
        assert_eq!(
            bulk_url("http://es:9200/").unwrap().as_str(),
            "http://es:9200/_bulk"
        );
        assert_eq!(
            bulk_url("http://es:9200/cluster").unwrap().as_str(),
            "http://es:9200/cluster/_bulk"
        );
    }

    #[test]
    fn test_bulk_url_rejects_garbage() {
        assert!(matches!(
            bulk_url("not a url"),
            Err(SinkError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_drops_when_queue_full() {
        let mut config = ElasticsearchConfig::with_url("http://127.0.0.1:9");
        config.queue_capacity = 1;
        config.flush_bytes = usize::MAX;

        let (sink, handle) = ElasticsearchSink::spawn(&config).unwrap();
        // The shipper has not been polled yet on this single-threaded runtime
        sink.write(&record_at(2024, 5, 15));
        sink.write(&record_at(2024, 5, 16));
        assert_eq!(sink.queued(), 1);

        drop(sink);
        handle.await.unwrap();
    }
}
