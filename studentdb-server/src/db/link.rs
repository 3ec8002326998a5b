//! Handle traits
//!
//! [`Connector`] opens a handle, [`Link`] is the handle. The connection
//! supervisor only ever talks to these traits; the MySQL implementation
//! lives in [`super::mysql`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::DbError;

/// One result row as a JSON object keyed by column name
pub type JsonRow = serde_json::Map<String, serde_json::Value>;

/// Summary of a statement that returned no rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecSummary {
    pub affected_rows: u64,
    pub insert_id: u64,
}

/// Result of running a statement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Rows(Vec<JsonRow>),
    Exec(ExecSummary),
}

/// An open database session
#[async_trait]
pub trait Link: Send + Sync + 'static {
    /// Run a row-returning statement with `?` placeholders bound to `params`.
    async fn fetch(&self, sql: &str, params: &[&str]) -> Result<Vec<JsonRow>, DbError>;

    /// Run a statement with `?` placeholders bound to `params`, returning counts.
    async fn execute(&self, sql: &str, params: &[&str]) -> Result<ExecSummary, DbError>;

    /// Run caller text verbatim through the unprepared path.
    async fn run_raw(&self, sql: &str) -> Result<QueryOutput, DbError>;

    /// Round-trip to the server without running a statement.
    async fn ping(&self) -> Result<(), DbError>;

    /// Release the session.
    async fn close(&self);
}

/// Opens new [`Link`]s to the configured endpoint
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Arc<dyn Link>, DbError>;

    /// Endpoint description for logs (no credentials)
    fn endpoint(&self) -> String;
}
