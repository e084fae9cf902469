use serde::Serialize;

use crate::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            semester::Semester,
            subject::Subject,
            tex_file::{CompilationStatus, TexFile},
            year::Year,
        },
    },
};

const RECENT_FILE_LIMIT: usize = 5;

#[derive(Debug, Default, Serialize)]
pub struct CompilationBreakdown {
    pub unknown: u64,
    pub success: u64,
    pub error: u64,
    pub timeout: u64,
}

#[derive(Debug, Serialize)]
pub struct RecentFile {
    pub id: String,
    pub name: String,
    pub subject_id: String,
    pub compilation_status: CompilationStatus,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<TexFile> for RecentFile {
    fn from(file: TexFile) -> Self {
        Self {
            id: file.id,
            name: file.name,
            subject_id: file.subject_id,
            compilation_status: file.compilation_status,
            updated_at: file.updated_at,
        }
    }
}

/// Dashboard snapshot over the whole store.
#[derive(Debug, Serialize)]
pub struct Stats {
    pub total_years: u64,
    pub total_semesters: u64,
    pub total_subjects: u64,
    pub total_files: u64,
    pub compilation: CompilationBreakdown,
    pub recent_files: Vec<RecentFile>,
}

impl Stats {
    pub async fn collect(db: &SurrealDbClient) -> Result<Stats, AppError> {
        let total_years = db.count_items::<Year>().await?;
        let total_semesters = db.count_items::<Semester>().await?;
        let total_subjects = db.count_items::<Subject>().await?;
        let total_files = db.count_items::<TexFile>().await?;

        let mut compilation = CompilationBreakdown::default();
        for entry in TexFile::status_counts(db).await? {
            match entry.status {
                CompilationStatus::Unknown => compilation.unknown = entry.count,
                CompilationStatus::Success => compilation.success = entry.count,
                CompilationStatus::Error => compilation.error = entry.count,
                CompilationStatus::Timeout => compilation.timeout = entry.count,
            }
        }

        let recent_files = TexFile::recent(db, RECENT_FILE_LIMIT)
            .await?
            .into_iter()
            .map(RecentFile::from)
            .collect();

        Ok(Stats {
            total_years,
            total_semesters,
            total_subjects,
            total_files,
            compilation,
            recent_files,
        })
    }
}
