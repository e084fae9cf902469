//! Containment tree: Year → Semester → Subject → TexFile.
//!
//! Creation validates parent existence; deletion consults a single explicit
//! policy table instead of per-entity ad hoc rules.

use serde::Deserialize;
use tracing::info;

use crate::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{semester::Semester, subject::Subject, tex_file::TexFile, year::Year, StoredObject},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Refuse deletion while children exist.
    Block,
    /// Delete all children, then the parent.
    Cascade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKind {
    Year,
    Semester,
    Subject,
}

/// One place to change if the product decision on cascade semantics shifts.
pub const DELETE_POLICIES: [(ParentKind, DeletePolicy); 3] = [
    (ParentKind::Year, DeletePolicy::Block),
    (ParentKind::Semester, DeletePolicy::Block),
    (ParentKind::Subject, DeletePolicy::Cascade),
];

pub const fn delete_policy(parent: ParentKind) -> DeletePolicy {
    let mut i = 0;
    while i < DELETE_POLICIES.len() {
        if DELETE_POLICIES[i].0 as usize == parent as usize {
            return DELETE_POLICIES[i].1;
        }
        i += 1;
    }
    DeletePolicy::Block
}

/// Child table and the field referencing the parent, per parent kind.
const fn child_ref(parent: ParentKind) -> (&'static str, &'static str) {
    match parent {
        ParentKind::Year => ("semester", "year_id"),
        ParentKind::Semester => ("subject", "semester_id"),
        ParentKind::Subject => ("tex_file", "subject_id"),
    }
}

pub async fn ensure_year_exists(db: &SurrealDbClient, id: &str) -> Result<(), AppError> {
    db.get_item::<Year>(id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("Year {id} not found")))
}

pub async fn ensure_semester_exists(db: &SurrealDbClient, id: &str) -> Result<(), AppError> {
    db.get_item::<Semester>(id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("Semester {id} not found")))
}

/// File parentage: both referenced nodes must exist, and the subject must
/// actually belong to the stated semester.
pub async fn ensure_file_parentage(
    db: &SurrealDbClient,
    subject_id: &str,
    semester_id: &str,
) -> Result<(), AppError> {
    let subject = db
        .get_item::<Subject>(subject_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Subject {subject_id} not found")))?;
    ensure_semester_exists(db, semester_id).await?;

    if subject.semester_id != semester_id {
        return Err(AppError::Validation(format!(
            "Subject {subject_id} belongs to semester {}, not {semester_id}",
            subject.semester_id
        )));
    }
    Ok(())
}

pub async fn delete_year(db: &SurrealDbClient, id: &str) -> Result<(), AppError> {
    ensure_year_exists(db, id).await?;
    apply_delete_policy(db, ParentKind::Year, id).await?;
    db.delete_item::<Year>(id).await?;
    Ok(())
}

pub async fn delete_semester(db: &SurrealDbClient, id: &str) -> Result<(), AppError> {
    ensure_semester_exists(db, id).await?;
    apply_delete_policy(db, ParentKind::Semester, id).await?;
    db.delete_item::<Semester>(id).await?;
    Ok(())
}

pub async fn delete_subject(db: &SurrealDbClient, id: &str) -> Result<(), AppError> {
    db.get_item::<Subject>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Subject {id} not found")))?;
    apply_delete_policy(db, ParentKind::Subject, id).await?;
    db.delete_item::<Subject>(id).await?;
    Ok(())
}

async fn apply_delete_policy(
    db: &SurrealDbClient,
    parent: ParentKind,
    parent_id: &str,
) -> Result<(), AppError> {
    let (child_table, ref_field) = child_ref(parent);

    match delete_policy(parent) {
        DeletePolicy::Block => {
            let children = count_children(db, child_table, ref_field, parent_id).await?;
            if children > 0 {
                return Err(AppError::Conflict(format!(
                    "Cannot delete: {children} {child_table} record(s) still reference {parent_id}"
                )));
            }
            Ok(())
        }
        DeletePolicy::Cascade => {
            db.query(format!(
                "DELETE FROM {child_table} WHERE {ref_field} = $parent_id"
            ))
            .bind(("parent_id", parent_id.to_string()))
            .await?;
            info!(parent_id, child_table, "Cascaded delete to children");
            Ok(())
        }
    }
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: u64,
}

async fn count_children(
    db: &SurrealDbClient,
    child_table: &'static str,
    ref_field: &'static str,
    parent_id: &str,
) -> Result<u64, AppError> {
    let mut response = db
        .query(format!(
            "SELECT count() AS count FROM {child_table} WHERE {ref_field} = $parent_id GROUP ALL"
        ))
        .bind(("parent_id", parent_id.to_string()))
        .await?;
    let rows: Vec<CountRow> = response.take(0)?;
    Ok(rows.first().map(|r| r.count).unwrap_or(0))
}

/// Count of files still referencing a subject.
pub async fn files_in_subject(db: &SurrealDbClient, subject_id: &str) -> Result<u64, AppError> {
    count_children(db, TexFile::table_name(), "subject_id", subject_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compile::TexCompiler,
        storage::types::{
            semester::CreateSemester,
            subject::CreateSubject,
            tex_file::CreateTexFile,
            year::CreateYear,
        },
    };
    use uuid::Uuid;

    async fn memory_db() -> SurrealDbClient {
        let namespace = "test_ns";
        let database = Uuid::new_v4().to_string();
        SurrealDbClient::memory(namespace, &database)
            .await
            .expect("in-memory surrealdb")
    }

    async fn seed_tree(db: &SurrealDbClient) -> (Year, Semester, Subject) {
        let year = Year::create(
            db,
            CreateYear {
                year: 2024,
                description: None,
            },
        )
        .await
        .expect("year");
        let semester = Semester::create(
            db,
            CreateSemester {
                year_id: year.id.clone(),
                name: "Fall".to_string(),
                description: None,
                start_date: None,
                end_date: None,
            },
        )
        .await
        .expect("semester");
        let subject = Subject::create(
            db,
            CreateSubject {
                name: "Calc".to_string(),
                description: None,
                semester_id: semester.id.clone(),
                color: None,
            },
        )
        .await
        .expect("subject");
        (year, semester, subject)
    }

    #[test]
    fn test_policy_table() {
        assert_eq!(delete_policy(ParentKind::Year), DeletePolicy::Block);
        assert_eq!(delete_policy(ParentKind::Semester), DeletePolicy::Block);
        assert_eq!(delete_policy(ParentKind::Subject), DeletePolicy::Cascade);
    }

    #[tokio::test]
    async fn test_year_delete_blocked_by_semester() {
        let db = memory_db().await;
        let (year, semester, _subject) = seed_tree(&db).await;

        let blocked = delete_year(&db, &year.id).await;
        assert!(matches!(blocked, Err(AppError::Conflict(_))));

        // Tree unchanged after the refused delete
        assert!(Year::get(&db, &year.id).await.is_ok());
        assert!(Semester::get(&db, &semester.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_semester_delete_blocked_by_subject() {
        let db = memory_db().await;
        let (_year, semester, subject) = seed_tree(&db).await;

        let blocked = delete_semester(&db, &semester.id).await;
        assert!(matches!(blocked, Err(AppError::Conflict(_))));
        assert!(Subject::get(&db, &subject.id).await.is_ok());

        // Removing the subject unblocks the semester
        delete_subject(&db, &subject.id).await.expect("delete subject");
        delete_semester(&db, &semester.id)
            .await
            .expect("delete semester");
        assert!(matches!(
            Semester::get(&db, &semester.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_subject_delete_cascades_to_files() {
        let db = memory_db().await;
        let (_year, semester, subject) = seed_tree(&db).await;

        let (compiler, _guard) = TexCompiler::fake(TexCompiler::FAKE_SUCCESS_SCRIPT, 5);
        for i in 0..3 {
            TexFile::create(
                &db,
                &compiler,
                CreateTexFile {
                    name: format!("hw{i}.tex"),
                    subject_id: subject.id.clone(),
                    semester_id: semester.id.clone(),
                    content: "\\documentclass{article}\\begin{document}x\\end{document}"
                        .to_string(),
                    tags: vec![],
                    notes: None,
                    source_type: Default::default(),
                },
            )
            .await
            .expect("create file");
        }
        assert_eq!(files_in_subject(&db, &subject.id).await.expect("count"), 3);

        delete_subject(&db, &subject.id).await.expect("delete subject");

        assert_eq!(files_in_subject(&db, &subject.id).await.expect("count"), 0);
        assert!(matches!(
            Subject::get(&db, &subject.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_file_parentage_cross_check() {
        let db = memory_db().await;
        let (year, _semester, subject) = seed_tree(&db).await;

        // A second semester the subject does not belong to
        let other = Semester::create(
            &db,
            CreateSemester {
                year_id: year.id.clone(),
                name: "Spring".to_string(),
                description: None,
                start_date: None,
                end_date: None,
            },
        )
        .await
        .expect("second semester");

        let mismatch = ensure_file_parentage(&db, &subject.id, &other.id).await;
        assert!(matches!(mismatch, Err(AppError::Validation(_))));

        let missing = ensure_file_parentage(&db, "missing", &other.id).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
