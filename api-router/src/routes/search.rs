use axum::{extract::State, response::IntoResponse, Json};
use common::storage::types::tex_file::{FileFilters, TexFile};
use serde::Deserialize;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    pub semester_id: Option<String>,
    pub subject_id: Option<String>,
    pub tags: Option<Vec<String>>,
}

pub async fn search_files(
    State(state): State<ApiState>,
    Json(request): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let filters = FileFilters {
        semester_id: request.semester_id,
        subject_id: request.subject_id,
        tags: request.tags,
    };
    let files = TexFile::search(&state.db, &request.query, filters).await?;
    Ok(Json(files))
}
