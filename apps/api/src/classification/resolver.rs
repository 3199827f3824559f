//! Category resolver. Maps classifier category names to stored category ids, and
//! keeps the category store in step with the keyword table.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::classification::keywords::CategoryKeywordTable;
use crate::models::category::{ClassificationLogRow, JobCategoryRow, NewClassificationLog};

/// Prefix of the placeholder description given to categories created without one.
const PLACEHOLDER_DESCRIPTION: &str = "CVs classified as";

#[derive(Debug, Error)]
pub enum CategoryStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Category '{0}' could not be stored")]
    NotStored(String),
}

/// What `ensure_category` had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureAction {
    Created,
    DescriptionUpdated,
    Unchanged,
}

/// Lookup store for job categories and sink for classification logs.
#[async_trait]
pub trait CategoryStore: Send + Sync {
    /// Exact-name lookup.
    async fn find_category_id(&self, name: &str) -> Result<Option<i32>, CategoryStoreError>;

    /// Creates the category if missing. An existing category keeps its description
    /// unless it is empty or the generated placeholder.
    async fn ensure_category(
        &self,
        name: &str,
        description: &str,
    ) -> Result<(i32, EnsureAction), CategoryStoreError>;

    async fn list_categories(&self) -> Result<Vec<JobCategoryRow>, CategoryStoreError>;

    async fn record_classification(
        &self,
        log: &NewClassificationLog,
    ) -> Result<i32, CategoryStoreError>;
}

fn needs_description(existing: Option<&str>) -> bool {
    match existing.map(str::trim) {
        None | Some("") => true,
        Some(d) => d.starts_with(PLACEHOLDER_DESCRIPTION),
    }
}

fn placeholder_description(name: &str) -> String {
    format!("{PLACEHOLDER_DESCRIPTION} {name} based on keyword matching")
}

/// Store id for `name`, or `None` when it is unknown or the store failed.
/// Neither case is an error for the caller: the classification is kept without
/// a category id.
pub async fn resolve_category_id(name: &str, store: &dyn CategoryStore) -> Option<i32> {
    match store.find_category_id(name).await {
        Ok(Some(id)) => Some(id),
        Ok(None) => {
            warn!("Category '{name}' not found in store, classification left unresolved");
            None
        }
        Err(e) => {
            error!("Error getting category id for '{name}': {e}");
            None
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub updated: usize,
    pub existing: usize,
}

/// Ensures every category of `table` exists in `store`.
pub async fn seed_categories(
    store: &dyn CategoryStore,
    table: &CategoryKeywordTable,
) -> Result<SeedReport, CategoryStoreError> {
    let mut report = SeedReport::default();
    for category in table.categories() {
        let description = category
            .description
            .clone()
            .unwrap_or_else(|| placeholder_description(&category.name));
        let (id, action) = store.ensure_category(&category.name, &description).await?;
        match action {
            EnsureAction::Created => {
                info!("Created category '{}' (id {id})", category.name);
                report.created += 1;
            }
            EnsureAction::DescriptionUpdated => {
                info!("Updated description for category '{}'", category.name);
                report.updated += 1;
                report.existing += 1;
            }
            EnsureAction::Unchanged => report.existing += 1,
        }
    }
    info!(
        "Category seeding done: {} created, {} updated, {} already present",
        report.created, report.updated, report.existing
    );
    Ok(report)
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL store
// ────────────────────────────────────────────────────────────────────────────

pub struct PgCategoryStore {
    pool: PgPool,
}

impl PgCategoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates `job_categories` and `classification_logs` if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), CategoryStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_categories (
                id          SERIAL PRIMARY KEY,
                name        VARCHAR(120) NOT NULL UNIQUE,
                description TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS classification_logs (
                id                    SERIAL PRIMARY KEY,
                cv_id                 INTEGER NOT NULL,
                predicted_category_id INTEGER REFERENCES job_categories (id),
                confidence            DOUBLE PRECISION,
                user_id               INTEGER,
                created_at            TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_row(&self, name: &str) -> Result<Option<JobCategoryRow>, CategoryStoreError> {
        Ok(sqlx::query_as::<_, JobCategoryRow>(
            "SELECT id, name, description FROM job_categories WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?)
    }
}

#[async_trait]
impl CategoryStore for PgCategoryStore {
    async fn find_category_id(&self, name: &str) -> Result<Option<i32>, CategoryStoreError> {
        Ok(
            sqlx::query_scalar("SELECT id FROM job_categories WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn ensure_category(
        &self,
        name: &str,
        description: &str,
    ) -> Result<(i32, EnsureAction), CategoryStoreError> {
        if let Some(row) = self.find_row(name).await? {
            if !needs_description(row.description.as_deref()) {
                return Ok((row.id, EnsureAction::Unchanged));
            }
            sqlx::query("UPDATE job_categories SET description = $1 WHERE id = $2")
                .bind(description)
                .bind(row.id)
                .execute(&self.pool)
                .await?;
            return Ok((row.id, EnsureAction::DescriptionUpdated));
        }

        let inserted: Option<i32> = sqlx::query_scalar(
            r#"
            INSERT INTO job_categories (name, description)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(description)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(id) => Ok((id, EnsureAction::Created)),
            // Lost a race with a concurrent insert of the same name.
            None => self
                .find_category_id(name)
                .await?
                .map(|id| (id, EnsureAction::Unchanged))
                .ok_or_else(|| CategoryStoreError::NotStored(name.to_string())),
        }
    }

    async fn list_categories(&self) -> Result<Vec<JobCategoryRow>, CategoryStoreError> {
        Ok(sqlx::query_as::<_, JobCategoryRow>(
            "SELECT id, name, description FROM job_categories ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn record_classification(
        &self,
        log: &NewClassificationLog,
    ) -> Result<i32, CategoryStoreError> {
        Ok(sqlx::query_scalar(
            r#"
            INSERT INTO classification_logs (cv_id, predicted_category_id, confidence, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(log.cv_id)
        .bind(log.predicted_category_id)
        .bind(log.confidence)
        .bind(log.user_id)
        .fetch_one(&self.pool)
        .await?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct InMemoryData {
    categories: Vec<JobCategoryRow>,
    logs: Vec<ClassificationLogRow>,
}

/// Process-local store used when no database is configured.
#[derive(Default)]
pub struct InMemoryCategoryStore {
    data: RwLock<InMemoryData>,
}

impl InMemoryCategoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn logs(&self) -> Vec<ClassificationLogRow> {
        self.data.read().await.logs.clone()
    }
}

#[async_trait]
impl CategoryStore for InMemoryCategoryStore {
    async fn find_category_id(&self, name: &str) -> Result<Option<i32>, CategoryStoreError> {
        let data = self.data.read().await;
        Ok(data
            .categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id))
    }

    async fn ensure_category(
        &self,
        name: &str,
        description: &str,
    ) -> Result<(i32, EnsureAction), CategoryStoreError> {
        let mut data = self.data.write().await;
        if let Some(row) = data.categories.iter_mut().find(|c| c.name == name) {
            if !needs_description(row.description.as_deref()) {
                return Ok((row.id, EnsureAction::Unchanged));
            }
            row.description = Some(description.to_string());
            return Ok((row.id, EnsureAction::DescriptionUpdated));
        }

        let id = data.categories.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        data.categories.push(JobCategoryRow {
            id,
            name: name.to_string(),
            description: Some(description.to_string()),
        });
        Ok((id, EnsureAction::Created))
    }

    async fn list_categories(&self) -> Result<Vec<JobCategoryRow>, CategoryStoreError> {
        Ok(self.data.read().await.categories.clone())
    }

    async fn record_classification(
        &self,
        log: &NewClassificationLog,
    ) -> Result<i32, CategoryStoreError> {
        let mut data = self.data.write().await;
        let id = data.logs.len() as i32 + 1;
        data.logs.push(ClassificationLogRow {
            id,
            cv_id: log.cv_id,
            predicted_category_id: log.predicted_category_id,
            confidence: Some(log.confidence),
            user_id: log.user_id,
            created_at: Utc::now(),
        });
        Ok(id)
    }
}
