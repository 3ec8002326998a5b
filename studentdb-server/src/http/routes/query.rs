//! Raw SQL endpoint
//!
//! Runs the caller's text verbatim. There is no auth and no sanitizing;
//! it exists for trusted internal use and can be switched off with
//! `ServerConfig::allow_raw_sql`.

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::db::QueryOutput;
use crate::http::error::ApiError;
use crate::http::extractors::ValidJson;
use crate::http::server::AppState;
use crate::models::QueryText;

/// Run query request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    pub query_string: String,
}

/// POST /runsqlquery - execute caller SQL
async fn run_sql_query(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<RunQueryRequest>,
) -> Result<Json<QueryOutput>, ApiError> {
    if !state.allow_raw_sql {
        return Err(ApiError::Forbidden {
            reason: "raw SQL endpoint is disabled".into(),
        });
    }

    let query = QueryText::new(&req.query_string)?;
    let handle = state.db.handle().ok_or(ApiError::NotConnected)?;

    tracing::debug!(sql = %query.as_str(), "Running caller SQL");
    let output = handle
        .run_raw(query.as_str())
        .await
        .map_err(|e| ApiError::from_db(e, query.as_str()))?;
    Ok(Json(output))
}

/// Raw SQL routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/runsqlquery", post(run_sql_query))
}
