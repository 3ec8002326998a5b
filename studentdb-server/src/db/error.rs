//! Database error taxonomy
//!
//! Every driver error is sorted into one of four classes when it crosses
//! into this crate:
//!
//! - [`DbError::Connect`]: opening the handle failed (retried by the manager)
//! - [`DbError::LinkLost`]: the transport dropped (triggers reconnect)
//! - [`DbError::Query`]: the statement failed (returned to the caller)
//! - [`DbError::Unknown`]: anything else (fatal for the supervisor)

use std::io;

use serde::Serialize;
use sqlx::mysql::MySqlDatabaseError;

/// Database error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum DbError {
    #[error("connection attempt failed: {message}")]
    Connect { message: String },

    #[error("connection lost: {message}")]
    LinkLost { message: String },

    #[error("query failed: {}", .0.sql_message)]
    Query(DriverError),

    #[error("unexpected driver error: {message}")]
    Unknown { message: String },
}

impl DbError {
    /// Wrap any driver error raised while opening a handle.
    pub fn connect(err: impl std::fmt::Display) -> Self {
        Self::Connect {
            message: err.to_string(),
        }
    }

    /// True for errors the connection supervisor must hear about.
    pub fn is_link_error(&self) -> bool {
        matches!(self, Self::LinkLost { .. } | Self::Unknown { .. })
    }

    /// Error payload in driver shape, as returned to HTTP callers.
    pub fn to_driver_error(&self) -> DriverError {
        match self {
            Self::Query(err) => err.clone(),
            Self::Connect { message } => DriverError::message("CONNECT_FAILED", message.clone()),
            Self::LinkLost { message } => DriverError::message("CONNECTION_LOST", message.clone()),
            Self::Unknown { message } => DriverError::message("DRIVER_ERROR", message.clone()),
        }
    }
}

/// I/O error kinds that mean the socket is gone
fn is_link_loss(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::NotConnected
    )
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => Self::Query(DriverError::from_database(db.as_ref())),
            sqlx::Error::Io(io) if is_link_loss(io.kind()) => Self::LinkLost {
                message: err.to_string(),
            },
            sqlx::Error::PoolClosed => Self::LinkLost {
                message: err.to_string(),
            },
            sqlx::Error::PoolTimedOut => {
                Self::Query(DriverError::message("POOL_TIMEOUT", err.to_string()))
            }
            sqlx::Error::RowNotFound
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => {
                Self::Query(DriverError::message("DECODE_ERROR", err.to_string()))
            }
            _ => Self::Unknown {
                message: err.to_string(),
            },
        }
    }
}

/// Driver-shaped error body.
///
/// Carries whatever the server reported (error number, SQLSTATE, message)
/// plus the statement text when the handler attaches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverError {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errno: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_state: Option<String>,
    pub sql_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

impl DriverError {
    /// Error without server-side codes.
    pub fn message(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            errno: None,
            sql_state: None,
            sql_message: message.into(),
            sql: None,
        }
    }

    fn from_database(err: &dyn sqlx::error::DatabaseError) -> Self {
        match err.try_downcast_ref::<MySqlDatabaseError>() {
            Some(mysql) => Self {
                code: format!("ER_{}", mysql.number()),
                errno: Some(mysql.number()),
                sql_state: mysql.code().map(str::to_string),
                sql_message: mysql.message().to_string(),
                sql: None,
            },
            None => Self {
                code: err
                    .code()
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|| "DATABASE_ERROR".to_string()),
                errno: None,
                sql_state: None,
                sql_message: err.message().to_string(),
                sql: None,
            },
        }
    }

    /// Attach the statement that failed.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }
}
