use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use common::storage::types::tex_file::{
    CreateTexFile, FileFilters, MultiUploadRequest, SourceType, TexFile, UpdateTexFile,
};
use serde::Deserialize;
use serde_json::json;
use tempfile::NamedTempFile;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct FileListParams {
    pub semester_id: Option<String>,
    pub subject_id: Option<String>,
    /// Comma-separated tag list; any match qualifies.
    pub tags: Option<String>,
}

impl FileListParams {
    pub fn into_filters(self) -> FileFilters {
        FileFilters {
            semester_id: self.semester_id,
            subject_id: self.subject_id,
            tags: self.tags.map(split_tags),
        }
    }
}

fn split_tags(raw: String) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn create_file(
    State(state): State<ApiState>,
    Json(payload): Json<CreateTexFile>,
) -> Result<impl IntoResponse, ApiError> {
    let file = TexFile::create(&state.db, &state.compiler, payload).await?;
    Ok((StatusCode::CREATED, Json(file)))
}

pub async fn list_files(
    State(state): State<ApiState>,
    Query(params): Query<FileListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let files = TexFile::list(&state.db, params.into_filters()).await?;
    Ok(Json(files))
}

pub async fn get_file(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let file = TexFile::get(&state.db, &id).await?;
    Ok(Json(file))
}

pub async fn update_file(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(patch): Json<UpdateTexFile>,
) -> Result<impl IntoResponse, ApiError> {
    let file = TexFile::update(&state.db, &id, patch).await?;
    Ok(Json(file))
}

pub async fn delete_file(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    TexFile::delete(&state.db, &id).await?;
    Ok(Json(json!({ "status": "success" })))
}

pub async fn recompile_file(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (file, _outcome) = TexFile::recompile(&state.db, &state.compiler, &id).await?;
    Ok(Json(file))
}

pub async fn get_file_pdf(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (file, pdf) = TexFile::get_pdf(&state.db, &state.compiler, &id).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pdf"),
    );
    let pdf_name = format!("{}.pdf", file.name.trim_end_matches(".tex"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{pdf_name}\""))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    Ok((StatusCode::OK, headers, pdf))
}

#[derive(Debug, TryFromMultipart)]
pub struct UploadParams {
    pub subject_id: String,
    pub semester_id: String,
    pub name: Option<String>,
    pub tags: Option<String>,
    pub notes: Option<String>,
    // Request size is capped by the route's DefaultBodyLimit layer, driven
    // by upload_max_body_bytes; no second per-field cap that could diverge.
    #[form_data(limit = "unlimited")]
    pub file: FieldData<NamedTempFile>,
}

/// Single-file upload. The part must carry a `.tex` file name and decode as
/// UTF-8; anything else is rejected before touching the store.
pub async fn upload_file(
    State(state): State<ApiState>,
    TypedMultipart(input): TypedMultipart<UploadParams>,
) -> Result<impl IntoResponse, ApiError> {
    let original_name = input
        .file
        .metadata
        .file_name
        .clone()
        .ok_or_else(|| ApiError::ValidationError("Uploaded part has no file name".to_string()))?;
    if !original_name.to_lowercase().ends_with(".tex") {
        return Err(ApiError::ValidationError(format!(
            "Only .tex files are accepted, got {original_name}"
        )));
    }

    let bytes = std::fs::read(input.file.contents.path())
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    let content = String::from_utf8(bytes).map_err(|_| {
        ApiError::ValidationError(format!("{original_name} is not valid UTF-8 text"))
    })?;

    info!(
        file_name = %original_name,
        bytes = content.len(),
        "Received file upload"
    );

    let payload = CreateTexFile {
        name: input.name.unwrap_or(original_name),
        subject_id: input.subject_id,
        semester_id: input.semester_id,
        content,
        tags: input.tags.map(split_tags).unwrap_or_default(),
        notes: input.notes,
        source_type: SourceType::Upload,
    };
    let file = TexFile::create(&state.db, &state.compiler, payload).await?;
    Ok((StatusCode::CREATED, Json(file)))
}

/// Batch ingestion of pre-read documents. Entries missing a name or content
/// are skipped; the response reports what was actually created.
pub async fn multi_upload(
    State(state): State<ApiState>,
    Json(request): Json<MultiUploadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let requested = request.files.len();
    let created = TexFile::multi_create(&state.db, &state.compiler, request).await?;

    info!(requested, created = created.len(), "Batch upload complete");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "requested": requested,
            "created": created.len(),
            "files": created,
        })),
    ))
}
