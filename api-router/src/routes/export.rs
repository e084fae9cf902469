use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use common::storage::types::tex_file::TexFile;

use crate::{api_state::ApiState, error::ApiError};

/// Download a single document as its source text.
pub async fn export_file(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let file = TexFile::get(&state.db, &id).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/x-tex"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file.name))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    Ok((StatusCode::OK, headers, file.content))
}

/// Download a set of documents as one zip archive. The body is a bare JSON
/// array of file ids.
pub async fn export_bulk(
    State(state): State<ApiState>,
    Json(file_ids): Json<Vec<String>>,
) -> Result<impl IntoResponse, ApiError> {
    let archive = TexFile::export_bulk(&state.db, &file_ids).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/zip"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"tex-export.zip\""),
    );

    Ok((StatusCode::OK, headers, archive))
}
