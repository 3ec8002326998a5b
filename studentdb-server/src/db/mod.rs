//! Database layer - connection manager, handle traits and the MySQL driver
//!
//! # Design Principles
//!
//! - One handle, owned by the connection supervisor; handlers read snapshots
//! - Fixed-delay bounded retry, no backoff growth
//! - Link errors flow back to the supervisor over a channel
//! - Query errors go back to the caller untouched

pub mod error;
pub mod link;
pub mod manager;
pub mod mysql;

#[cfg(test)]
pub(crate) mod fake;

pub use error::{DbError, DriverError};
pub use link::{Connector, ExecSummary, JsonRow, Link, QueryOutput};
pub use manager::{
    ConnectionError, ConnectionManager, ConnectionState, ConnectionStatus, ConnectionSupervisor,
    Handle, RetryPolicy,
};
pub use mysql::{MySqlConnector, MySqlLink};
