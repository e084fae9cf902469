use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(Year, "year", {
    year: i32,
    description: Option<String>
});

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateYear {
    pub year: i32,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct UpdateYear {
    pub year: Option<i32>,
    pub description: Option<String>,
}

impl Year {
    pub fn new(year: i32, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            year,
            description,
        }
    }

    /// Year numbers are unique across the collection; a duplicate is a
    /// conflict, checked here in addition to the store-level unique index.
    pub async fn create(db: &SurrealDbClient, payload: CreateYear) -> Result<Year, AppError> {
        if Self::by_number(db, payload.year).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Year {} already exists",
                payload.year
            )));
        }

        let year = Year::new(payload.year, payload.description);
        db.store_item(year.clone()).await?;
        Ok(year)
    }

    pub async fn get(db: &SurrealDbClient, id: &str) -> Result<Year, AppError> {
        db.get_item::<Year>(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Year {id} not found")))
    }

    pub async fn list(db: &SurrealDbClient) -> Result<Vec<Year>, AppError> {
        let years: Vec<Year> = db
            .query("SELECT * FROM type::table($table) ORDER BY year DESC")
            .bind(("table", Self::table_name()))
            .await?
            .take(0)?;
        Ok(years)
    }

    pub async fn update(
        db: &SurrealDbClient,
        id: &str,
        patch: UpdateYear,
    ) -> Result<Year, AppError> {
        let mut year = Self::get(db, id).await?;

        if let Some(number) = patch.year {
            if number != year.year {
                if Self::by_number(db, number).await?.is_some() {
                    return Err(AppError::Conflict(format!("Year {number} already exists")));
                }
                year.year = number;
            }
        }
        if let Some(description) = patch.description {
            year.description = Some(description);
        }
        year.updated_at = Utc::now();

        db.replace_item(year.clone()).await?;
        Ok(year)
    }

    async fn by_number(db: &SurrealDbClient, number: i32) -> Result<Option<Year>, AppError> {
        let mut response = db
            .query("SELECT * FROM type::table($table) WHERE year = $year")
            .bind(("table", Self::table_name()))
            .bind(("year", number))
            .await?;
        let years: Vec<Year> = response.take(0)?;
        Ok(years.into_iter().next())
    }
}
