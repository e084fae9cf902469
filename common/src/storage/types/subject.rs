use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, hierarchy},
    stored_object,
};

stored_object!(Subject, "subject", {
    name: String,
    description: Option<String>,
    semester_id: String,
    color: Option<String>
});

fn default_color() -> Option<String> {
    Some("#3B82F6".to_string())
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateSubject {
    pub name: String,
    pub description: Option<String>,
    pub semester_id: String,
    #[serde(default = "default_color")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct UpdateSubject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub semester_id: Option<String>,
    pub color: Option<String>,
}

impl Subject {
    pub fn new(payload: CreateSubject) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            name: payload.name,
            description: payload.description,
            semester_id: payload.semester_id,
            color: payload.color,
        }
    }

    pub async fn create(db: &SurrealDbClient, payload: CreateSubject) -> Result<Subject, AppError> {
        hierarchy::ensure_semester_exists(db, &payload.semester_id).await?;

        let subject = Subject::new(payload);
        db.store_item(subject.clone()).await?;
        Ok(subject)
    }

    pub async fn get(db: &SurrealDbClient, id: &str) -> Result<Subject, AppError> {
        db.get_item::<Subject>(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Subject {id} not found")))
    }

    pub async fn list(
        db: &SurrealDbClient,
        semester_id: Option<String>,
    ) -> Result<Vec<Subject>, AppError> {
        let subjects: Vec<Subject> = match semester_id {
            Some(semester_id) => db
                .query(
                    "SELECT * FROM type::table($table) WHERE semester_id = $semester_id \
                     ORDER BY name ASC",
                )
                .bind(("table", Self::table_name()))
                .bind(("semester_id", semester_id))
                .await?
                .take(0)?,
            None => db
                .query("SELECT * FROM type::table($table) ORDER BY name ASC")
                .bind(("table", Self::table_name()))
                .await?
                .take(0)?,
        };
        Ok(subjects)
    }

    /// A changed semester reference is re-validated before committing.
    pub async fn update(
        db: &SurrealDbClient,
        id: &str,
        patch: UpdateSubject,
    ) -> Result<Subject, AppError> {
        let mut subject = Self::get(db, id).await?;

        if let Some(semester_id) = patch.semester_id {
            if semester_id != subject.semester_id {
                hierarchy::ensure_semester_exists(db, &semester_id).await?;
                subject.semester_id = semester_id;
            }
        }
        if let Some(name) = patch.name {
            subject.name = name;
        }
        if let Some(description) = patch.description {
            subject.description = Some(description);
        }
        if let Some(color) = patch.color {
            subject.color = Some(color);
        }
        subject.updated_at = Utc::now();

        db.replace_item(subject.clone()).await?;
        Ok(subject)
    }
}
