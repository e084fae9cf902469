use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, hierarchy},
    stored_object,
};

stored_object!(Semester, "semester", {
    year_id: String,
    name: String,
    description: Option<String>,
    #[serde(
        serialize_with = "serialize_option_datetime",
        deserialize_with = "deserialize_option_datetime",
        default
    )]
    start_date: Option<DateTime<Utc>>,
    #[serde(
        serialize_with = "serialize_option_datetime",
        deserialize_with = "deserialize_option_datetime",
        default
    )]
    end_date: Option<DateTime<Utc>>
});

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateSemester {
    pub year_id: String,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct UpdateSemester {
    pub year_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Semester {
    pub fn new(payload: CreateSemester) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            year_id: payload.year_id,
            name: payload.name,
            description: payload.description,
            start_date: payload.start_date,
            end_date: payload.end_date,
        }
    }

    pub async fn create(
        db: &SurrealDbClient,
        payload: CreateSemester,
    ) -> Result<Semester, AppError> {
        hierarchy::ensure_year_exists(db, &payload.year_id).await?;

        let semester = Semester::new(payload);
        db.store_item(semester.clone()).await?;
        Ok(semester)
    }

    pub async fn get(db: &SurrealDbClient, id: &str) -> Result<Semester, AppError> {
        db.get_item::<Semester>(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Semester {id} not found")))
    }

    pub async fn list(
        db: &SurrealDbClient,
        year_id: Option<String>,
    ) -> Result<Vec<Semester>, AppError> {
        let semesters: Vec<Semester> = match year_id {
            Some(year_id) => db
                .query(
                    "SELECT * FROM type::table($table) WHERE year_id = $year_id \
                     ORDER BY created_at ASC",
                )
                .bind(("table", Self::table_name()))
                .bind(("year_id", year_id))
                .await?
                .take(0)?,
            None => db
                .query("SELECT * FROM type::table($table) ORDER BY created_at ASC")
                .bind(("table", Self::table_name()))
                .await?
                .take(0)?,
        };
        Ok(semesters)
    }

    /// A changed year reference is re-validated before committing.
    pub async fn update(
        db: &SurrealDbClient,
        id: &str,
        patch: UpdateSemester,
    ) -> Result<Semester, AppError> {
        let mut semester = Self::get(db, id).await?;

        if let Some(year_id) = patch.year_id {
            if year_id != semester.year_id {
                hierarchy::ensure_year_exists(db, &year_id).await?;
                semester.year_id = year_id;
            }
        }
        if let Some(name) = patch.name {
            semester.name = name;
        }
        if let Some(description) = patch.description {
            semester.description = Some(description);
        }
        if let Some(start_date) = patch.start_date {
            semester.start_date = Some(start_date);
        }
        if let Some(end_date) = patch.end_date {
            semester.end_date = Some(end_date);
        }
        semester.updated_at = Utc::now();

        db.replace_item(semester.clone()).await?;
        Ok(semester)
    }
}
