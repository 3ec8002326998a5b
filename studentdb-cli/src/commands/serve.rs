//! HTTP server command
//!
//! Starts the connection supervisor and the HTTP server side by side. The
//! server answers "Database not connected" until the first connect lands.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use tokio::task::JoinHandle;

use studentdb_server::db::manager::{DEFAULT_HEARTBEAT, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
use studentdb_server::db::MySqlConnector;
use studentdb_server::{run_server, ConnectionError, ConnectionManager, RetryPolicy, ServerConfig};

use super::{DatabaseArgs, LogArgs};

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(long, short = 'b', env = "STUDENTDB_BIND", default_value = "0.0.0.0:8081")]
    pub bind: SocketAddr,

    #[command(flatten)]
    pub db: DatabaseArgs,

    /// Connection attempts before giving up
    #[arg(long, env = "STUDENTDB_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Seconds between connection attempts
    #[arg(long, env = "STUDENTDB_RETRY_DELAY_SECS", default_value_t = DEFAULT_RETRY_DELAY.as_secs())]
    pub retry_delay_secs: u64,

    /// Seconds between liveness pings (0 disables)
    #[arg(long, env = "STUDENTDB_HEARTBEAT_SECS", default_value_t = DEFAULT_HEARTBEAT.as_secs())]
    pub heartbeat_secs: u64,

    /// Only allow localhost origins instead of any origin
    #[arg(long)]
    pub cors_localhost: bool,

    /// Turn off POST /runsqlquery
    #[arg(long, env = "STUDENTDB_DISABLE_RAW_SQL")]
    pub disable_raw_sql: bool,

    #[command(flatten)]
    pub log: LogArgs,
}

impl ServeArgs {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            delay: Duration::from_secs(self.retry_delay_secs),
            heartbeat: (self.heartbeat_secs > 0).then(|| Duration::from_secs(self.heartbeat_secs)),
        }
    }
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let db_config = args.db.to_config()?;
    let policy = args.retry_policy();

    tracing::info!(
        endpoint = %db_config.endpoint(),
        max_retries = policy.max_retries,
        "Starting studentdb server on {}",
        args.bind
    );

    let connector = Arc::new(MySqlConnector::new(&db_config));
    let (manager, supervisor) = ConnectionManager::new(connector, policy);
    let supervisor = tokio::spawn(supervisor.run());

    let config = ServerConfig {
        bind_addr: args.bind,
        cors_permissive: !args.cors_localhost,
        allow_raw_sql: !args.disable_raw_sql,
        table: db_config.table.clone(),
    };

    // Run until shutdown, or until the supervisor hits an unrecoverable error
    tokio::select! {
        result = run_server(manager, config) => result.context("Server error")?,
        err = fatal_supervisor_error(supervisor) => {
            return Err(err.context("Database connection supervisor failed"));
        }
    }

    Ok(())
}

/// Resolves only if the supervisor ends with an error. Giving up after the
/// retry bound is not an error; the server keeps answering without a handle.
async fn fatal_supervisor_error(task: JoinHandle<Result<(), ConnectionError>>) -> anyhow::Error {
    match task.await {
        Ok(Ok(())) => std::future::pending().await,
        Ok(Err(err)) => err.into(),
        Err(err) => anyhow!(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        serve: ServeArgs,
    }

    #[test]
    fn heartbeat_zero_disables_pings() {
        let args = Harness::parse_from(["test", "--heartbeat-secs", "0", "--retry-delay-secs", "2"]).serve;
        let policy = args.retry_policy();
        assert_eq!(policy.heartbeat, None);
        assert_eq!(policy.delay, Duration::from_secs(2));
    }

    #[test]
    fn no_log_file_flag_disables_file() {
        let args = Harness::parse_from(["test", "--no-log-file"]).serve;
        assert_eq!(args.log.path(), None);
    }

    #[test]
    fn bad_table_is_rejected() {
        let args = Harness::parse_from(["test", "--table", "student; DROP TABLE x"]).serve;
        assert!(args.db.to_config().is_err());
    }

    #[tokio::test]
    async fn supervisor_error_surfaces() {
        let task = tokio::spawn(async {
            Err(ConnectionError::Fatal {
                generation: 1,
                message: "tls failure".into(),
            })
        });
        let err = fatal_supervisor_error(task).await;
        assert!(err.to_string().contains("tls failure"));
    }
}
