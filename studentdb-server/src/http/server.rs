//! Axum server setup
//!
//! Server skeleton with:
//! - Permissive or localhost-only CORS
//! - Tracing middleware
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::routes;
use crate::db::ConnectionManager;
use crate::models::TableName;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:8081)
    pub bind_addr: SocketAddr,

    /// Allow any origin (default: true)
    ///
    /// When false, only localhost origins on common dev ports are allowed.
    pub cors_permissive: bool,

    /// Serve POST /runsqlquery (default: true)
    ///
    /// WARNING: the endpoint runs caller SQL verbatim with no auth.
    /// Only leave it on for trusted internal networks.
    pub allow_raw_sql: bool,

    /// Table behind the list and insert endpoints
    pub table: TableName,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            cors_permissive: true,
            allow_raw_sql: true,
            table: TableName::default(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: ConnectionManager,
    pub table: TableName,
    pub allow_raw_sql: bool,
}

impl AppState {
    pub fn new(db: ConnectionManager, config: &ServerConfig) -> Self {
        Self {
            db,
            table: config.table.clone(),
            allow_raw_sql: config.allow_raw_sql,
        }
    }
}

fn cors_layer(permissive: bool) -> CorsLayer {
    if permissive {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
        ])
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the application router with all routes and middleware
pub fn build_router(state: AppState, cors_permissive: bool) -> Router {
    Router::new()
        .merge(routes::students::router())
        .merge(routes::query::router())
        .merge(routes::health::router())
        .layer(cors_layer(cors_permissive))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Run the HTTP server.
///
/// The connection manager may still be connecting; requests answer
/// "Database not connected" until it is.
///
/// # Example
///
/// ```ignore
/// let (manager, supervisor) = ConnectionManager::new(connector, RetryPolicy::default());
/// tokio::spawn(supervisor.run());
/// run_server(manager, ServerConfig::default()).await?;
/// ```
pub async fn run_server(db: ConnectionManager, config: ServerConfig) -> Result<(), ServerError> {
    if !config.cors_permissive {
        tracing::info!("CORS: localhost origins only");
    }
    if config.allow_raw_sql {
        tracing::warn!("Raw SQL endpoint enabled - callers can run arbitrary statements");
    }

    let state = AppState::new(db, &config);
    let app = build_router(state, config.cors_permissive);

    // Bind listener
    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    // Run with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
