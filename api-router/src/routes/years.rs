use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use common::storage::{
    hierarchy,
    types::year::{CreateYear, UpdateYear, Year},
};
use serde_json::json;

use crate::{api_state::ApiState, error::ApiError};

pub async fn create_year(
    State(state): State<ApiState>,
    Json(payload): Json<CreateYear>,
) -> Result<impl IntoResponse, ApiError> {
    let year = Year::create(&state.db, payload).await?;
    Ok((StatusCode::CREATED, Json(year)))
}

pub async fn list_years(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let years = Year::list(&state.db).await?;
    Ok(Json(years))
}

pub async fn get_year(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let year = Year::get(&state.db, &id).await?;
    Ok(Json(year))
}

pub async fn update_year(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(patch): Json<UpdateYear>,
) -> Result<impl IntoResponse, ApiError> {
    let year = Year::update(&state.db, &id, patch).await?;
    Ok(Json(year))
}

/// Deleting a year is refused while it still has semesters.
pub async fn delete_year(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    hierarchy::delete_year(&state.db, &id).await?;
    Ok(Json(json!({ "status": "success" })))
}
