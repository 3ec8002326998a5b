//! MySQL link over a single sqlx connection
//!
//! One `MySqlConnection` behind an async mutex. Statements run one at a
//! time, and a dropped socket surfaces as a link-loss error for the
//! connection manager instead of being replaced behind its back.
//!
//! Raw text may hold several statements. Their rows are concatenated into
//! one array; when any statement returns rows, the write counts of the
//! others are not reported.

mod row;

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{Connection, Either, Executor};
use tokio::sync::Mutex;

use super::{Connector, DbError, ExecSummary, JsonRow, Link, QueryOutput};
use crate::config::DatabaseConfig;

pub use row::row_to_json;

/// Opens [`MySqlLink`]s to one configured endpoint
pub struct MySqlConnector {
    options: MySqlConnectOptions,
    endpoint: String,
}

impl MySqlConnector {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            options: config.connect_options(),
            endpoint: config.endpoint(),
        }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn connect(&self) -> Result<Arc<dyn Link>, DbError> {
        let conn = MySqlConnection::connect_with(&self.options)
            .await
            .map_err(DbError::connect)?;

        Ok(Arc::new(MySqlLink {
            conn: Mutex::new(Some(conn)),
        }))
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

/// A live MySQL session
pub struct MySqlLink {
    conn: Mutex<Option<MySqlConnection>>,
}

/// Borrow the live connection out of a locked `MySqlLink::conn`; a closed
/// link reads as link loss.
macro_rules! conn {
    ($guard:expr) => {
        $guard.as_mut().ok_or_else(|| DbError::LinkLost {
            message: "connection closed".to_string(),
        })?
    };
}

#[async_trait]
impl Link for MySqlLink {
    async fn fetch(&self, sql: &str, params: &[&str]) -> Result<Vec<JsonRow>, DbError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(*param);
        }

        let mut guard = self.conn.lock().await;
        let rows = query.fetch_all(conn!(guard)).await?;
        rows.iter()
            .map(|row| row_to_json(row).map_err(DbError::from))
            .collect()
    }

    async fn execute(&self, sql: &str, params: &[&str]) -> Result<ExecSummary, DbError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(*param);
        }

        let mut guard = self.conn.lock().await;
        let done = query.execute(conn!(guard)).await?;
        Ok(ExecSummary {
            affected_rows: done.rows_affected(),
            insert_id: done.last_insert_id(),
        })
    }

    async fn run_raw(&self, sql: &str) -> Result<QueryOutput, DbError> {
        let mut guard = self.conn.lock().await;
        let conn = conn!(guard);
        let mut rows = Vec::new();
        let mut summary = ExecSummary::default();

        {
            let mut stream = sqlx::raw_sql(sql).fetch_many(&mut *conn);
            while let Some(item) = stream.try_next().await? {
                match item {
                    Either::Left(done) => {
                        summary.affected_rows += done.rows_affected();
                        if done.last_insert_id() != 0 {
                            summary.insert_id = done.last_insert_id();
                        }
                    }
                    Either::Right(row) => rows.push(row_to_json(&row)?),
                }
            }
        }

        if !rows.is_empty() {
            return Ok(QueryOutput::Rows(rows));
        }

        // An empty result set only shows up as a zero count on the stream.
        if summary == ExecSummary::default() && returns_columns(conn, sql).await {
            Ok(QueryOutput::Rows(rows))
        } else {
            Ok(QueryOutput::Exec(summary))
        }
    }

    async fn ping(&self) -> Result<(), DbError> {
        let mut guard = self.conn.lock().await;
        conn!(guard).ping().await?;
        Ok(())
    }

    async fn close(&self) {
        if let Some(conn) = self.conn.lock().await.take() {
            if let Err(err) = conn.close().await {
                tracing::debug!(error = %err, "Error closing MySQL connection");
            }
        }
    }
}

/// Whether `sql` is a single statement with a result set. Text the server
/// won't prepare (several statements, some admin commands) reads as no.
async fn returns_columns(conn: &mut MySqlConnection, sql: &str) -> bool {
    match (&mut *conn).describe(sql).await {
        Ok(described) => !described.columns().is_empty(),
        Err(err) => {
            tracing::debug!(error = %err, "Could not describe raw statement");
            false
        }
    }
}
