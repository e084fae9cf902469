use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use common::storage::{
    hierarchy,
    types::subject::{CreateSubject, Subject, UpdateSubject},
};
use serde::Deserialize;
use serde_json::json;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct SubjectListParams {
    pub semester_id: Option<String>,
}

pub async fn create_subject(
    State(state): State<ApiState>,
    Json(payload): Json<CreateSubject>,
) -> Result<impl IntoResponse, ApiError> {
    let subject = Subject::create(&state.db, payload).await?;
    Ok((StatusCode::CREATED, Json(subject)))
}

pub async fn list_subjects(
    State(state): State<ApiState>,
    Query(params): Query<SubjectListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let subjects = Subject::list(&state.db, params.semester_id).await?;
    Ok(Json(subjects))
}

pub async fn get_subject(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let subject = Subject::get(&state.db, &id).await?;
    Ok(Json(subject))
}

pub async fn update_subject(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(patch): Json<UpdateSubject>,
) -> Result<impl IntoResponse, ApiError> {
    let subject = Subject::update(&state.db, &id, patch).await?;
    Ok(Json(subject))
}

/// Deleting a subject removes its files as well.
pub async fn delete_subject(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    hierarchy::delete_subject(&state.db, &id).await?;
    Ok(Json(json!({ "status": "success" })))
}
