use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::classification::{CategoryStore, InMemoryCategoryStore, PgCategoryStore};

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Postgres-backed store when a database is configured, in-memory otherwise.
pub async fn create_category_store(database_url: Option<&str>) -> Result<Arc<dyn CategoryStore>> {
    match database_url {
        Some(url) => {
            let store = PgCategoryStore::new(create_pool(url).await?);
            store.ensure_schema().await?;
            info!("Category store: PostgreSQL");
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory category store");
            Ok(Arc::new(InMemoryCategoryStore::new()))
        }
    }
}
