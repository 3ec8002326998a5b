//! studentdb-server: HTTP backend for the student database
//!
//! Serves three row endpoints (list, insert, raw SQL) on top of a single
//! MySQL handle owned by the [`ConnectionManager`], which connects in the
//! background, retries with a fixed delay and reconnects on link loss.

pub mod config;
pub mod db;
pub mod http;
pub mod models;

pub use config::DatabaseConfig;
pub use db::{ConnectionError, ConnectionManager, ConnectionState, ConnectionStatus, RetryPolicy};
pub use http::{build_router, run_server, AppState, ServerConfig, ServerError};
