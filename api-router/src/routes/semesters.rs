use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use common::storage::{
    hierarchy,
    types::semester::{CreateSemester, Semester, UpdateSemester},
};
use serde::Deserialize;
use serde_json::json;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct SemesterListParams {
    pub year_id: Option<String>,
}

pub async fn create_semester(
    State(state): State<ApiState>,
    Json(payload): Json<CreateSemester>,
) -> Result<impl IntoResponse, ApiError> {
    let semester = Semester::create(&state.db, payload).await?;
    Ok((StatusCode::CREATED, Json(semester)))
}

pub async fn list_semesters(
    State(state): State<ApiState>,
    Query(params): Query<SemesterListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let semesters = Semester::list(&state.db, params.year_id).await?;
    Ok(Json(semesters))
}

pub async fn get_semester(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let semester = Semester::get(&state.db, &id).await?;
    Ok(Json(semester))
}

pub async fn update_semester(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(patch): Json<UpdateSemester>,
) -> Result<impl IntoResponse, ApiError> {
    let semester = Semester::update(&state.db, &id, patch).await?;
    Ok(Json(semester))
}

/// Deleting a semester is refused while it still has subjects.
pub async fn delete_semester(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    hierarchy::delete_semester(&state.db, &id).await?;
    Ok(Json(json!({ "status": "success" })))
}
