//! Student record management endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::data::students::{MarksUpdate, NewMarks, NewStudent, StudentUpdate};
use crate::data::StoreError;

use super::routes::{error_response, AppState};

fn store_error(e: StoreError) -> Response {
    let status = match &e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StatusCode::CONFLICT
        }
        StoreError::Sqlite(_) | StoreError::Worker(_) => {
            tracing::error!(error = %e, "Student store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, e.to_string())
}

pub(super) async fn create_student(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewStudent>,
) -> Response {
    match state.student_store.create_student(req).await {
        Ok(student) => (StatusCode::CREATED, Json(student)).into_response(),
        Err(e) => store_error(e),
    }
}

pub(super) async fn get_student(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Response {
    match state.student_store.get_student(id).await {
        Ok(Some(student)) => Json(student).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("student {} not found", id)),
        Err(e) => store_error(e),
    }
}

pub(super) async fn update_student(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<StudentUpdate>,
) -> Response {
    match state.student_store.update_student(id, req).await {
        Ok(student) => Json(student).into_response(),
        Err(e) => store_error(e),
    }
}

pub(super) async fn delete_student(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Response {
    match state.student_store.delete_student(id).await {
        Ok(student) => Json(student).into_response(),
        Err(e) => store_error(e),
    }
}

pub(super) async fn add_marks(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<i64>,
    Json(req): Json<NewMarks>,
) -> Response {
    match state.student_store.add_marks(student_id, req).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => store_error(e),
    }
}

pub(super) async fn update_marks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<MarksUpdate>,
) -> Response {
    match state.student_store.update_marks(id, req).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => store_error(e),
    }
}

pub(super) async fn delete_marks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Response {
    match state.student_store.delete_marks(id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => store_error(e),
    }
}
