//! Request logging facade.
//!
//! Wraps `tracing` for console output and ships the same records to
//! Elasticsearch. Handlers log through a per-request [`RequestLogger`];
//! failures are normalized into [`ErrorRecord`]s before they are logged.

pub mod clock;
pub mod curl;
pub mod elasticsearch;
pub mod level;
pub mod record;
pub mod request_logger;
pub mod sink;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use clock::{index_name, LogClock};
pub use elasticsearch::{ElasticsearchSink, SinkError};
pub use level::LogLevel;
pub use record::{
    normalize, ApiException, ApiResponse, ErrorKind, ErrorRecord, Failure, Fields, LogRecord,
    RuntimeKind,
};
pub use request_logger::{classify, LoggerFactory, RequestLogger};
pub use sink::{ConsoleSink, LogSink, LogSinks};

/// Install the global subscriber.
///
/// Text output is colorized when `json` is false; JSON output is one object per line.
pub fn init_tracing(filter: &str, json: bool) {
    let registry = tracing_subscriber::registry().with(EnvFilter::new(filter));

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_ansi(true))
            .init();
    }
}
