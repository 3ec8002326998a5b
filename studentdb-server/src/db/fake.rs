//! In-memory link and connector for tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use super::{
    ConnectionManager, ConnectionState, ConnectionStatus, Connector, DbError, ExecSummary,
    JsonRow, Link, QueryOutput, RetryPolicy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Fetch,
    Execute,
    Raw,
}

/// One statement the fake saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: CallKind,
    pub sql: String,
    pub params: Vec<String>,
}

/// Student table kept in memory. Understands just enough SQL for the
/// fixed statements: `ORDER BY id DESC` sorts, `INSERT` appends.
#[derive(Default)]
pub struct FakeLink {
    calls: Mutex<Vec<Call>>,
    rows: Mutex<Vec<JsonRow>>,
    fail_next: Mutex<Option<DbError>>,
    ping_error: Mutex<Option<DbError>>,
    pings: AtomicUsize,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl FakeLink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed rows, in the order the "table" stores them
    pub fn with_rows(rows: Vec<serde_json::Value>) -> Arc<Self> {
        let link = Self::default();
        let max_id = rows
            .iter()
            .filter_map(|r| r.get("id").and_then(|id| id.as_u64()))
            .max()
            .unwrap_or(0);
        link.next_id.store(max_id, Ordering::SeqCst);
        *link.rows.lock().unwrap() = rows
            .into_iter()
            .filter_map(|r| r.as_object().cloned())
            .collect();
        Arc::new(link)
    }

    /// Fail the next statement with `err`
    pub fn fail_next(&self, err: DbError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }

    /// Fail the next ping with `err`
    pub fn fail_ping(&self, err: DbError) {
        *self.ping_error.lock().unwrap() = Some(err);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, kind: CallKind, sql: &str, params: &[&str]) -> Result<(), DbError> {
        self.calls.lock().unwrap().push(Call {
            kind,
            sql: sql.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
        });
        match self.fail_next.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn select(&self, sql: &str) -> Vec<JsonRow> {
        let mut rows = self.rows.lock().unwrap().clone();
        if sql.to_ascii_uppercase().contains("ORDER BY ID DESC") {
            rows.sort_by_key(|r| std::cmp::Reverse(r.get("id").and_then(|id| id.as_u64())));
        }
        rows
    }
}

#[async_trait]
impl Link for FakeLink {
    async fn fetch(&self, sql: &str, params: &[&str]) -> Result<Vec<JsonRow>, DbError> {
        self.record(CallKind::Fetch, sql, params)?;
        Ok(self.select(sql))
    }

    async fn execute(&self, sql: &str, params: &[&str]) -> Result<ExecSummary, DbError> {
        self.record(CallKind::Execute, sql, params)?;
        if !sql.trim_start().to_ascii_uppercase().starts_with("INSERT") {
            return Ok(ExecSummary::default());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let row = json!({
            "id": id,
            "name": params.first().copied(),
            "email": params.get(1).copied(),
        });
        if let Some(row) = row.as_object() {
            self.rows.lock().unwrap().push(row.clone());
        }
        Ok(ExecSummary {
            affected_rows: 1,
            insert_id: id,
        })
    }

    async fn run_raw(&self, sql: &str) -> Result<QueryOutput, DbError> {
        self.record(CallKind::Raw, sql, &[])?;
        // Same shape rules as MySqlLink: a statement with a result set
        // answers rows, even none; anything else answers counts.
        if returns_columns(sql) {
            Ok(QueryOutput::Rows(self.select(sql)))
        } else {
            Ok(QueryOutput::Exec(ExecSummary::default()))
        }
    }

    async fn ping(&self) -> Result<(), DbError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        match self.ping_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn returns_columns(sql: &str) -> bool {
    let verb = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(verb.as_str(), "SELECT" | "SHOW" | "DESCRIBE" | "EXPLAIN")
}

/// One call to [`FakeConnector::connect`]
#[derive(Debug, Clone, Copy)]
pub struct Attempt {
    pub at: Instant,
    /// Manager status at the time of the call, when observing
    pub status: Option<ConnectionStatus>,
}

/// Hands out scripted results; refuses once the script runs out.
pub struct FakeConnector {
    script: Mutex<VecDeque<Result<Arc<FakeLink>, DbError>>>,
    attempts: Mutex<Vec<Attempt>>,
    observed: Mutex<Option<ConnectionManager>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeConnector {
    pub fn new(script: Vec<Result<Arc<FakeLink>, DbError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            attempts: Mutex::new(Vec::new()),
            observed: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    /// Record the manager's status on every attempt. Keeps a manager
    /// clone alive, so the supervisor never sees the manager dropped.
    pub fn observe(&self, manager: ConnectionManager) {
        *self.observed.lock().unwrap() = Some(manager);
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> Result<Arc<dyn Link>, DbError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let status = self.observed.lock().unwrap().as_ref().map(|m| m.status());
        self.attempts.lock().unwrap().push(Attempt {
            at: Instant::now(),
            status,
        });

        // Let other tasks interleave, the way a real handshake would.
        tokio::task::yield_now().await;

        let next = self.script.lock().unwrap().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match next {
            Some(Ok(link)) => Ok(link as Arc<dyn Link>),
            Some(Err(err)) => Err(err),
            None => Err(DbError::connect("connection refused")),
        }
    }

    fn endpoint(&self) -> String {
        "fake:3306/students".to_string()
    }
}

/// Manager already Connected to `link`, supervisor running in the background.
pub async fn connected(link: Arc<FakeLink>) -> ConnectionManager {
    let connector = FakeConnector::new(vec![Ok(link)]);
    let policy = RetryPolicy {
        max_retries: 1,
        delay: Duration::from_millis(10),
        heartbeat: None,
    };
    let (manager, supervisor) = ConnectionManager::new(connector, policy);
    tokio::spawn(supervisor.run());
    manager
        .wait_for(|s| s.state == ConnectionState::Connected)
        .await
        .expect("fake connector should connect");
    manager
}

/// Manager that never connects (supervisor not started).
pub fn disconnected() -> ConnectionManager {
    let (manager, _supervisor) =
        ConnectionManager::new(FakeConnector::new(vec![]), RetryPolicy::default());
    manager
}
