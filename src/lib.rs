//! monorepo-api: health endpoint and request logging.
//!
//! Serves `GET /health` and logs every exchange through a request-scoped
//! logger that writes to the console and, optionally, to Elasticsearch.

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use routes::create_router;
pub use state::AppState;
