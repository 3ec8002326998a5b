//! Student endpoints
//!
//! Both statements are fixed; only the table name is spliced in, and it
//! was validated as an identifier at startup. Values are always bound.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::db::{ExecSummary, JsonRow};
use crate::http::error::ApiError;
use crate::http::extractors::ValidJson;
use crate::http::server::AppState;
use crate::models::{NewStudent, TableName};

/// Create student request
#[derive(Deserialize)]
pub struct CreateStudentRequest {
    pub name: String,
    pub email: String,
}

fn list_sql(table: &TableName) -> String {
    format!("SELECT * FROM {} ORDER BY id DESC", table)
}

fn insert_sql(table: &TableName) -> String {
    format!("INSERT INTO {} (name, email) VALUES (?, ?)", table)
}

/// GET / - every student, newest id first
async fn list_students(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<JsonRow>>, ApiError> {
    let handle = state.db.handle().ok_or(ApiError::NotConnected)?;
    let sql = list_sql(&state.table);

    let rows = handle
        .fetch(&sql, &[])
        .await
        .map_err(|e| ApiError::from_db(e, &sql))?;
    Ok(Json(rows))
}

/// POST /createNewStudent - insert one row
async fn create_student(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<CreateStudentRequest>,
) -> Result<Json<ExecSummary>, ApiError> {
    let student = NewStudent::new(&req.name, &req.email)?;
    let handle = state.db.handle().ok_or(ApiError::NotConnected)?;
    let sql = insert_sql(&state.table);

    let done = handle
        .execute(&sql, &[student.name.as_str(), student.email.as_str()])
        .await
        .map_err(|e| ApiError::from_db(e, &sql))?;

    tracing::info!(insert_id = done.insert_id, "Student created");
    Ok(Json(done))
}

/// Student routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_students))
        .route("/createNewStudent", post(create_student))
}
