//! Connection manager - single handle, fixed-delay retry, reconnect on link loss
//!
//! [`ConnectionManager::new`] hands back two halves:
//!
//! - [`ConnectionManager`]: cheap to clone, injected into handlers. Reads the
//!   current handle and reports link errors.
//! - [`ConnectionSupervisor`]: the only writer. Run it as one task; it opens
//!   the handle, retries failed attempts after a fixed delay up to the retry
//!   bound, and reconnects when a link-loss error is reported.
//!
//! State machine:
//!
//! ```text
//! Disconnected -> Connecting -> Connected
//! Connecting   -> Disconnected (waiting out the retry delay)
//! Connecting   -> Failed       (retry bound reached, terminal)
//! Connected    -> Disconnected (link lost) -> Connecting
//! ```
//!
//! # Example
//!
//! ```ignore
//! let connector = Arc::new(MySqlConnector::new(&db_config));
//! let (manager, supervisor) = ConnectionManager::new(connector, RetryPolicy::default());
//! tokio::spawn(supervisor.run());
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::{Connector, DbError, ExecSummary, JsonRow, Link, QueryOutput};

/// Connection attempts per failure episode before giving up
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Pause between failed attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Ping interval while connected
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);

/// Retry and liveness settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per failure episode. Reaching it moves to `Failed`.
    pub max_retries: u32,
    /// Fixed delay between attempts (no growth, no jitter)
    pub delay: Duration,
    /// Ping the live handle on this interval; `None` disables
    pub heartbeat: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
            heartbeat: Some(DEFAULT_HEARTBEAT),
        }
    }
}

/// Where the handle is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Published snapshot of the manager's state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Failed attempts in the current episode, reset on success
    pub retry_count: u32,
    pub max_retries: u32,
    /// Sequence number of the most recently installed handle (0 = never)
    pub generation: u64,
}

/// Errors that end the supervisor
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("unrecoverable database error on link {generation}: {message}")]
    Fatal { generation: u64, message: String },
}

#[derive(Clone)]
struct Snapshot {
    status: ConnectionStatus,
    link: Option<Arc<dyn Link>>,
}

enum LinkFault {
    Lost(String),
    Fatal(String),
}

struct LinkEvent {
    generation: u64,
    fault: LinkFault,
}

enum LinkOutcome {
    Lost(String),
    Fatal(String),
    /// Every manager clone is gone
    Closed,
}

impl From<LinkFault> for LinkOutcome {
    fn from(fault: LinkFault) -> Self {
        match fault {
            LinkFault::Lost(message) => Self::Lost(message),
            LinkFault::Fatal(message) => Self::Fatal(message),
        }
    }
}

/// Read side of the connection manager, shared with request handlers
#[derive(Clone)]
pub struct ConnectionManager {
    snapshot: watch::Receiver<Snapshot>,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl ConnectionManager {
    /// Create the manager and its supervisor. Nothing connects until
    /// [`ConnectionSupervisor::run`] is polled.
    pub fn new(
        connector: Arc<dyn Connector>,
        policy: RetryPolicy,
    ) -> (Self, ConnectionSupervisor) {
        let initial = Snapshot {
            status: ConnectionStatus {
                state: ConnectionState::Disconnected,
                retry_count: 0,
                max_retries: policy.max_retries,
                generation: 0,
            },
            link: None,
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let manager = Self {
            snapshot: snapshot_rx,
            events: events_tx,
        };
        let supervisor = ConnectionSupervisor {
            connector,
            policy,
            snapshot: snapshot_tx,
            events: events_rx,
        };
        (manager, supervisor)
    }

    /// Current status
    pub fn status(&self) -> ConnectionStatus {
        self.snapshot.borrow().status
    }

    /// The live handle, or `None` unless Connected.
    pub fn handle(&self) -> Option<Handle> {
        let (link, generation) = {
            let snapshot = self.snapshot.borrow();
            (snapshot.link.clone()?, snapshot.status.generation)
        };
        Some(Handle {
            link,
            generation,
            manager: self.clone(),
        })
    }

    /// Wait until the status satisfies `pred`.
    ///
    /// Returns `None` if the supervisor stopped without ever reaching it.
    pub async fn wait_for(
        &self,
        mut pred: impl FnMut(&ConnectionStatus) -> bool,
    ) -> Option<ConnectionStatus> {
        let mut rx = self.snapshot.clone();
        let status = rx.wait_for(|snapshot| pred(&snapshot.status)).await.ok()?.status;
        Some(status)
    }

    /// Report an error raised by the handle of `generation`.
    ///
    /// Link loss asks the supervisor to reconnect; unknown driver errors end
    /// it with [`ConnectionError::Fatal`]. Query-level errors are ignored.
    pub fn on_link_error(&self, generation: u64, err: &DbError) {
        let fault = match err {
            DbError::LinkLost { message } => LinkFault::Lost(message.clone()),
            DbError::Unknown { message } => LinkFault::Fatal(message.clone()),
            _ => return,
        };

        if self.events.send(LinkEvent { generation, fault }).is_err() {
            tracing::debug!(generation, "Connection supervisor stopped, dropping link error");
        }
    }
}

/// A borrowed view of the live link.
///
/// Errors coming back through it are reported to the manager before they
/// are returned.
#[derive(Clone)]
pub struct Handle {
    link: Arc<dyn Link>,
    generation: u64,
    manager: ConnectionManager,
}

impl Handle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn fetch(&self, sql: &str, params: &[&str]) -> Result<Vec<JsonRow>, DbError> {
        let result = self.link.fetch(sql, params).await;
        self.observe(result)
    }

    pub async fn execute(&self, sql: &str, params: &[&str]) -> Result<ExecSummary, DbError> {
        let result = self.link.execute(sql, params).await;
        self.observe(result)
    }

    pub async fn run_raw(&self, sql: &str) -> Result<QueryOutput, DbError> {
        let result = self.link.run_raw(sql).await;
        self.observe(result)
    }

    fn observe<T>(&self, result: Result<T, DbError>) -> Result<T, DbError> {
        match &result {
            Err(err) if err.is_link_error() => self.manager.on_link_error(self.generation, err),
            _ => {}
        }
        result
    }
}

/// Write side of the connection manager. Owns every state transition.
pub struct ConnectionSupervisor {
    connector: Arc<dyn Connector>,
    policy: RetryPolicy,
    snapshot: watch::Sender<Snapshot>,
    events: mpsc::UnboundedReceiver<LinkEvent>,
}

impl ConnectionSupervisor {
    /// Drive the connection until it fails permanently, hits a fatal driver
    /// error, or every [`ConnectionManager`] clone is dropped.
    ///
    /// Giving up after the retry bound is not an error: the state stays
    /// `Failed` and requests keep answering "not connected".
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        let endpoint = self.connector.endpoint();

        loop {
            let Some(link) = self.connect(&endpoint).await else {
                return Ok(());
            };

            let generation = self.install(link.clone());
            tracing::info!(%endpoint, generation, "Database connected");

            match self.watch_link(&link, generation).await {
                LinkOutcome::Lost(message) => {
                    tracing::warn!(%endpoint, generation, error = %message, "Database link lost, reconnecting");
                    self.uninstall();
                    retire(link);
                }
                LinkOutcome::Fatal(message) => {
                    tracing::error!(%endpoint, generation, error = %message, "Unrecoverable database error");
                    self.uninstall();
                    retire(link);
                    return Err(ConnectionError::Fatal {
                        generation,
                        message,
                    });
                }
                LinkOutcome::Closed => {
                    tracing::debug!(generation, "Connection manager dropped, closing link");
                    self.uninstall();
                    link.close().await;
                    return Ok(());
                }
            }
        }
    }

    /// One failure episode: attempt, wait, attempt again, until a link
    /// opens or the retry bound is reached.
    async fn connect(&mut self, endpoint: &str) -> Option<Arc<dyn Link>> {
        loop {
            let retry_count = self.status().retry_count;
            self.snapshot
                .send_modify(|s| s.status.state = ConnectionState::Connecting);
            tracing::debug!(%endpoint, retry_count, "Connecting to database");

            let err = match self.connector.connect().await {
                Ok(link) => return Some(link),
                Err(err) => err,
            };

            let retry_count = retry_count + 1;
            if retry_count < self.policy.max_retries {
                tracing::warn!(
                    %endpoint,
                    retry_count,
                    max_retries = self.policy.max_retries,
                    delay_secs = self.policy.delay.as_secs_f64(),
                    error = %err,
                    "Database connection failed, retrying"
                );
                self.snapshot.send_modify(|s| {
                    s.status.state = ConnectionState::Disconnected;
                    s.status.retry_count = retry_count;
                });
                tokio::time::sleep(self.policy.delay).await;
            } else {
                tracing::error!(
                    %endpoint,
                    retry_count,
                    error = %err,
                    "Database connection failed, giving up"
                );
                self.snapshot.send_modify(|s| {
                    s.status.state = ConnectionState::Failed;
                    s.status.retry_count = retry_count;
                });
                return None;
            }
        }
    }

    fn status(&self) -> ConnectionStatus {
        self.snapshot.borrow().status
    }

    fn install(&mut self, link: Arc<dyn Link>) -> u64 {
        let generation = self.status().generation + 1;
        self.snapshot.send_modify(|s| {
            s.link = Some(link);
            s.status.state = ConnectionState::Connected;
            s.status.retry_count = 0;
            s.status.generation = generation;
        });
        generation
    }

    fn uninstall(&mut self) {
        self.snapshot.send_modify(|s| {
            s.link = None;
            s.status.state = ConnectionState::Disconnected;
        });
    }

    /// Wait for the live link to fail, either through a reported error or a
    /// failed heartbeat. Reports for retired generations are dropped.
    async fn watch_link(&mut self, link: &Arc<dyn Link>, generation: u64) -> LinkOutcome {
        let mut heartbeat = self.policy.heartbeat.map(|period| {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    None => return LinkOutcome::Closed,
                    Some(event) if event.generation != generation => {
                        tracing::debug!(
                            stale = event.generation,
                            current = generation,
                            "Ignoring error from retired link"
                        );
                    }
                    Some(event) => return event.fault.into(),
                },
                () = next_beat(&mut heartbeat) => match link.ping().await {
                    Ok(()) => tracing::trace!(generation, "Heartbeat ok"),
                    Err(DbError::LinkLost { message }) => return LinkOutcome::Lost(message),
                    Err(DbError::Unknown { message }) => return LinkOutcome::Fatal(message),
                    Err(err) => tracing::warn!(generation, error = %err, "Heartbeat ping failed"),
                },
            }
        }
    }
}

async fn next_beat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Close a replaced link without holding up the reconnect.
fn retire(link: Arc<dyn Link>) {
    tokio::spawn(async move { link.close().await });
}
