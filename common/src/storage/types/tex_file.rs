use std::collections::HashMap;
use std::io::{Cursor, Write};

use bytes::Bytes;
use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;
use zip::{write::SimpleFileOptions, ZipWriter};

use crate::{
    compile::{CompileOutcome, TexCompiler},
    error::AppError,
    latex::metrics::metrics,
    storage::{db::SurrealDbClient, hierarchy},
    stored_object,
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CompilationStatus {
    #[default]
    Unknown,
    Success,
    Error,
    Timeout,
}

impl CompilationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilationStatus::Unknown => "unknown",
            CompilationStatus::Success => "success",
            CompilationStatus::Error => "error",
            CompilationStatus::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[default]
    Manual,
    Upload,
    MultiUpload,
}

/// Immutable snapshot of document content plus its derived metrics, appended
/// on every content change and never rewritten afterwards.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FileVersion {
    pub id: String,
    pub content: String,
    pub word_count: u64,
    pub file_size: u64,
    pub compilation_status: CompilationStatus,
    pub compilation_output: Option<String>,
    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime",
        default
    )]
    pub created_at: DateTime<Utc>,
}

impl FileVersion {
    pub fn new(content: &str) -> Self {
        let m = metrics(content);
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            word_count: m.word_count,
            file_size: m.byte_size,
            compilation_status: CompilationStatus::Unknown,
            compilation_output: None,
            created_at: Utc::now(),
        }
    }
}

stored_object!(TexFile, "tex_file", {
    name: String,
    subject_id: String,
    semester_id: String,
    content: String,
    word_count: u64,
    file_size: u64,
    compilation_status: CompilationStatus,
    compilation_output: Option<String>,
    tags: Vec<String>,
    notes: Option<String>,
    source_type: SourceType,
    versions: Vec<FileVersion>
});

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateTexFile {
    pub name: String,
    pub subject_id: String,
    pub semester_id: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub source_type: SourceType,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct UpdateTexFile {
    pub name: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
    pub compilation_status: Option<CompilationStatus>,
    pub compilation_output: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MultiUploadEntry {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MultiUploadRequest {
    pub files: Vec<MultiUploadEntry>,
    pub subject_id: String,
    pub semester_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct FileFilters {
    pub semester_id: Option<String>,
    pub subject_id: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, serde::Deserialize)]
pub struct StatusCount {
    pub status: CompilationStatus,
    pub count: u64,
}

impl TexFile {
    fn from_parts(payload: CreateTexFile, version: FileVersion) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            name: payload.name,
            subject_id: payload.subject_id,
            semester_id: payload.semester_id,
            content: version.content.clone(),
            word_count: version.word_count,
            file_size: version.file_size,
            compilation_status: CompilationStatus::Unknown,
            compilation_output: None,
            tags: payload.tags,
            notes: payload.notes,
            source_type: payload.source_type,
            versions: vec![version],
        }
    }

    /// Record the engine's verdict on the record and on the version it ran
    /// against (the last one).
    fn apply_outcome(&mut self, outcome: &CompileOutcome) {
        self.compilation_status = outcome.status;
        self.compilation_output = Some(outcome.log.clone());
        if let Some(last) = self.versions.last_mut() {
            last.compilation_status = outcome.status;
            last.compilation_output = Some(outcome.log.clone());
        }
    }

    /// Create with auto-compilation. A failed or timed-out compile is
    /// recorded on the persisted record; it never aborts creation.
    pub async fn create(
        db: &SurrealDbClient,
        compiler: &TexCompiler,
        payload: CreateTexFile,
    ) -> Result<TexFile, AppError> {
        hierarchy::ensure_file_parentage(db, &payload.subject_id, &payload.semester_id).await?;
        Self::create_unchecked(db, compiler, payload).await
    }

    /// Create pipeline without parentage validation, for callers that have
    /// already validated (batch ingestion validates once per request).
    async fn create_unchecked(
        db: &SurrealDbClient,
        compiler: &TexCompiler,
        payload: CreateTexFile,
    ) -> Result<TexFile, AppError> {
        let version = FileVersion::new(&payload.content);
        let mut file = Self::from_parts(payload, version);

        let outcome = compiler.compile(&file.content, &file.name).await;
        file.apply_outcome(&outcome);
        info!(
            file_name = %file.name,
            status = outcome.status.as_str(),
            "Created file with initial compilation"
        );

        db.store_item(file.clone()).await?;
        Ok(file)
    }

    pub async fn get(db: &SurrealDbClient, id: &str) -> Result<TexFile, AppError> {
        db.get_item::<TexFile>(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {id} not found")))
    }

    /// Content changes append a version and refresh the derived fields;
    /// compilation is not re-run here (see `recompile`). Other provided
    /// fields are applied verbatim.
    pub async fn update(
        db: &SurrealDbClient,
        id: &str,
        patch: UpdateTexFile,
    ) -> Result<TexFile, AppError> {
        let mut file = Self::get(db, id).await?;

        if let Some(content) = patch.content {
            if content != file.content {
                let version = FileVersion::new(&content);
                file.content = version.content.clone();
                file.word_count = version.word_count;
                file.file_size = version.file_size;
                file.versions.push(version);
            }
        }
        if let Some(name) = patch.name {
            file.name = name;
        }
        if let Some(tags) = patch.tags {
            file.tags = tags;
        }
        if let Some(notes) = patch.notes {
            file.notes = Some(notes);
        }
        if let Some(status) = patch.compilation_status {
            file.compilation_status = status;
        }
        if let Some(output) = patch.compilation_output {
            file.compilation_output = Some(output);
        }
        file.updated_at = Utc::now();

        db.replace_item(file.clone()).await?;
        Ok(file)
    }

    pub async fn delete(db: &SurrealDbClient, id: &str) -> Result<(), AppError> {
        db.delete_item::<TexFile>(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {id} not found")))?;
        Ok(())
    }

    /// Re-run the engine against the current content and persist the verdict.
    pub async fn recompile(
        db: &SurrealDbClient,
        compiler: &TexCompiler,
        id: &str,
    ) -> Result<(TexFile, CompileOutcome), AppError> {
        let mut file = Self::get(db, id).await?;

        let outcome = compiler.compile(&file.content, &file.name).await;
        file.apply_outcome(&outcome);
        file.updated_at = Utc::now();

        db.replace_item(file.clone()).await?;
        Ok((file, outcome))
    }

    /// PDF for the current content. Served from the artifact cache when the
    /// record already compiled successfully; otherwise recompiles, and a
    /// still-failing compile surfaces as a request-level error because no
    /// artifact can be returned.
    pub async fn get_pdf(
        db: &SurrealDbClient,
        compiler: &TexCompiler,
        id: &str,
    ) -> Result<(TexFile, Bytes), AppError> {
        let file = Self::get(db, id).await?;

        if file.compilation_status == CompilationStatus::Success {
            if let Some(artifact) = compiler.cached_artifact(&file.content).await? {
                return Ok((file, artifact));
            }
        }

        let (file, outcome) = Self::recompile(db, compiler, id).await?;
        match outcome.artifact {
            Some(artifact) => Ok((file, artifact)),
            None => Err(AppError::Compilation(outcome.log)),
        }
    }

    /// Batch ingestion: parentage validated once, entries missing a name or
    /// content skipped, each remaining entry compiled independently. Partial
    /// success is expected; per-entry failures are logged, not propagated.
    pub async fn multi_create(
        db: &SurrealDbClient,
        compiler: &TexCompiler,
        request: MultiUploadRequest,
    ) -> Result<Vec<TexFile>, AppError> {
        hierarchy::ensure_file_parentage(db, &request.subject_id, &request.semester_id).await?;

        let entries: Vec<MultiUploadEntry> = request
            .files
            .into_iter()
            .filter(|entry| !entry.name.trim().is_empty() && !entry.content.trim().is_empty())
            .collect();

        let futures: Vec<_> = entries
            .into_iter()
            .map(|entry| {
                let payload = CreateTexFile {
                    name: entry.name,
                    subject_id: request.subject_id.clone(),
                    semester_id: request.semester_id.clone(),
                    content: entry.content,
                    tags: request.tags.clone(),
                    notes: request.notes.clone(),
                    source_type: SourceType::MultiUpload,
                };
                Self::create_unchecked(db, compiler, payload)
            })
            .collect();

        let mut created = Vec::new();
        for result in join_all(futures).await {
            match result {
                Ok(file) => created.push(file),
                Err(e) => warn!(error = %e, "Skipping batch entry that failed to persist"),
            }
        }
        Ok(created)
    }

    /// Structural filters only; ordering is most recently updated first.
    pub async fn list(db: &SurrealDbClient, filters: FileFilters) -> Result<Vec<TexFile>, AppError> {
        let mut conditions: Vec<&str> = Vec::new();
        if filters.semester_id.is_some() {
            conditions.push("semester_id = $semester_id");
        }
        if filters.subject_id.is_some() {
            conditions.push("subject_id = $subject_id");
        }
        if filters.tags.as_ref().is_some_and(|t| !t.is_empty()) {
            conditions.push("tags CONTAINSANY $tags");
        }

        let mut statement = String::from("SELECT * FROM type::table($table)");
        if !conditions.is_empty() {
            statement.push_str(" WHERE ");
            statement.push_str(&conditions.join(" AND "));
        }
        statement.push_str(" ORDER BY updated_at DESC");

        let mut query = db.query(statement).bind(("table", Self::table_name()));
        if let Some(semester_id) = filters.semester_id {
            query = query.bind(("semester_id", semester_id));
        }
        if let Some(subject_id) = filters.subject_id {
            query = query.bind(("subject_id", subject_id));
        }
        if let Some(tags) = filters.tags {
            if !tags.is_empty() {
                query = query.bind(("tags", tags));
            }
        }

        let files: Vec<TexFile> = query.await?.take(0)?;
        Ok(files)
    }

    /// Structural filters plus case-insensitive substring match over name,
    /// content, notes and tags. An empty query degrades to `list`; no match
    /// is an empty result, never an error.
    pub async fn search(
        db: &SurrealDbClient,
        query_text: &str,
        filters: FileFilters,
    ) -> Result<Vec<TexFile>, AppError> {
        let files = Self::list(db, filters).await?;
        let needle = query_text.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(files);
        }

        Ok(files
            .into_iter()
            .filter(|file| file.matches_query(&needle))
            .collect())
    }

    fn matches_query(&self, needle_lowercase: &str) -> bool {
        let hit = |haystack: &str| haystack.to_lowercase().contains(needle_lowercase);

        hit(&self.name)
            || hit(&self.content)
            || self.notes.as_deref().is_some_and(hit)
            || self.tags.iter().any(|tag| hit(tag))
    }

    /// Package the current content of each resolved file into an in-memory
    /// deflate archive. Duplicate names get a numeric suffix so no entry is
    /// silently dropped.
    pub async fn export_bulk(db: &SurrealDbClient, ids: &[String]) -> Result<Vec<u8>, AppError> {
        if ids.is_empty() {
            return Err(AppError::Validation("No files selected".to_string()));
        }

        let mut files = Vec::new();
        for id in ids {
            if let Some(file) = db.get_item::<TexFile>(id).await? {
                files.push(file);
            }
        }
        if files.is_empty() {
            return Err(AppError::NotFound("No files found".to_string()));
        }

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let mut seen: HashMap<String, u32> = HashMap::new();
        for file in &files {
            let entry_name = dedup_entry_name(&mut seen, &file.name);
            writer.start_file(entry_name, options)?;
            writer.write_all(file.content.as_bytes())?;
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }

    /// The five most recently updated files, for the dashboard.
    pub async fn recent(db: &SurrealDbClient, limit: usize) -> Result<Vec<TexFile>, AppError> {
        let files: Vec<TexFile> = db
            .query("SELECT * FROM type::table($table) ORDER BY updated_at DESC LIMIT $limit")
            .bind(("table", Self::table_name()))
            .bind(("limit", limit as i64))
            .await?
            .take(0)?;
        Ok(files)
    }

    /// Histogram of records per compilation status.
    pub async fn status_counts(db: &SurrealDbClient) -> Result<Vec<StatusCount>, AppError> {
        let counts: Vec<StatusCount> = db
            .query(
                "SELECT compilation_status AS status, count() AS count \
                 FROM type::table($table) GROUP BY status",
            )
            .bind(("table", Self::table_name()))
            .await?
            .take(0)?;
        Ok(counts)
    }
}

fn dedup_entry_name(seen: &mut HashMap<String, u32>, name: &str) -> String {
    let n = seen.entry(name.to_string()).or_insert(0);
    *n += 1;
    if *n == 1 {
        return name.to_string();
    }

    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem} ({}).{ext}", *n - 1),
        None => format!("{name} ({})", *n - 1),
    }
}
