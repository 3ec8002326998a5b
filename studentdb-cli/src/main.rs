//! studentdb CLI - student database HTTP backend
//!
//! - `serve`: run the HTTP server (list, insert, raw SQL) with background
//!   connect/retry/reconnect
//! - `check`: one connection attempt against the configured database
//!
//! Settings come from flags, environment variables, or a `.env` file in
//! the working directory.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod tracing_setup;

use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "studentdb",
    author,
    version,
    about = "HTTP backend for the student database"
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve(commands::serve::ServeArgs),
    /// Check that the database is reachable
    Check(commands::check::CheckArgs),
}

// One cooperative scheduler: requests, the connection supervisor and its
// timers all share this thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env before parsing so env-backed flags see it
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_file = match &cli.command {
        Commands::Serve(args) => args.log.path(),
        Commands::Check(_) => None,
    };
    let _log_guard = tracing_setup::init(&TracingConfig {
        debug: cli.debug,
        log_file,
    })?;

    match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await?,
        Commands::Check(args) => commands::run_check(args).await?,
    }

    Ok(())
}
