use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct JobCategoryRow {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ClassificationLogRow {
    pub id: i32,
    pub cv_id: i32,
    pub predicted_category_id: Option<i32>,
    pub confidence: Option<f64>,
    pub user_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// A classification about to be logged against a stored CV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewClassificationLog {
    pub cv_id: i32,
    pub predicted_category_id: Option<i32>,
    pub confidence: f64,
    pub user_id: Option<i32>,
}
