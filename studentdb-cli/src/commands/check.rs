//! One-shot connectivity check
//!
//! Opens a single link, pings it and counts the rows in the student table.
//! No retries; exits non-zero on the first failure.

use anyhow::{Context, Result};
use clap::Args;

use studentdb_server::db::{Connector, MySqlConnector};

use super::DatabaseArgs;

/// Arguments for the check command
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub db: DatabaseArgs,
}

/// Run the connectivity check
pub async fn run_check(args: CheckArgs) -> Result<()> {
    let config = args.db.to_config()?;
    let endpoint = config.endpoint();

    let link = MySqlConnector::new(&config)
        .connect()
        .await
        .with_context(|| format!("Cannot connect to {}", endpoint))?;
    link.ping().await.context("Ping failed")?;

    let sql = format!("SELECT COUNT(*) AS count FROM {}", config.table);
    let rows = link
        .fetch(&sql, &[])
        .await
        .with_context(|| format!("Cannot read table {}", config.table));
    link.close().await;

    let count = rows?
        .first()
        .and_then(|row| row.get("count"))
        .and_then(|count| count.as_i64())
        .unwrap_or(0);
    println!("ok: {} reachable, {} has {} rows", endpoint, config.table, count);
    Ok(())
}
