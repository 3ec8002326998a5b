//! Subcommands and the argument groups they share

pub mod check;
pub mod serve;

pub use check::run_check;
pub use serve::run_serve;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use studentdb_server::config::{
    DEFAULT_DB_HOST, DEFAULT_DB_NAME, DEFAULT_DB_PASSWORD, DEFAULT_DB_PORT, DEFAULT_DB_USER,
    DEFAULT_TABLE,
};
use studentdb_server::DatabaseConfig;

/// Database endpoint flags
#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Database host
    #[arg(long, env = "DB_HOST", default_value = DEFAULT_DB_HOST)]
    pub db_host: String,

    /// Database port
    #[arg(long, env = "DB_PORT", default_value_t = DEFAULT_DB_PORT)]
    pub db_port: u16,

    /// Database user
    #[arg(long, env = "DB_USER", default_value = DEFAULT_DB_USER)]
    pub db_user: String,

    /// Database password
    #[arg(long, env = "DB_PASSWORD", default_value = DEFAULT_DB_PASSWORD, hide_env_values = true)]
    pub db_password: String,

    /// Database (schema) name
    #[arg(long, env = "DB_NAME", default_value = DEFAULT_DB_NAME)]
    pub db_name: String,

    /// Table behind the list and insert endpoints
    #[arg(long, env = "STUDENTDB_TABLE", default_value = DEFAULT_TABLE)]
    pub table: String,
}

impl DatabaseArgs {
    pub fn to_config(&self) -> Result<DatabaseConfig> {
        DatabaseConfig::new(
            &self.db_host,
            self.db_port,
            &self.db_user,
            &self.db_password,
            &self.db_name,
            &self.table,
        )
        .context("Invalid --table")
    }
}

/// Log file flags
#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Append-only log file
    #[arg(long, env = "STUDENTDB_LOG_FILE", default_value = "studentdb.log")]
    pub log_file: PathBuf,

    /// Log to the console only
    #[arg(long)]
    pub no_log_file: bool,
}

impl LogArgs {
    pub fn path(&self) -> Option<PathBuf> {
        (!self.no_log_file).then(|| self.log_file.clone())
    }
}
