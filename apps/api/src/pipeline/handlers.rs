use std::path::PathBuf;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::classification::{CategoryKeywordTable, CategoryKeywords};
use crate::errors::AppError;
use crate::pipeline::{Classification, CvSubmission, ProcessOutcome};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub cv_text: Option<String>,
    pub auto_translate: Option<bool>,
    /// Replaces the active keyword table for this call only. Order sets tie-breaks.
    pub categories: Option<Vec<CategoryKeywords>>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub category: Option<String>,
    pub confidence: f64,
    pub detected_language: Option<String>,
    pub language_name: Option<String>,
    pub was_translated: bool,
}

impl From<Classification> for ClassifyResponse {
    fn from(c: Classification) -> Self {
        Self {
            category: c.category,
            confidence: c.confidence,
            detected_language: c.detected_language,
            language_name: c.language_name,
            was_translated: c.was_translated,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub file_path: String,
    pub file_type: Option<String>,
    pub cv_id: Option<i32>,
    pub user_id: Option<i32>,
    pub auto_translate: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct CategoryView {
    pub name: String,
    pub category_id: Option<i32>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub threshold: f64,
    pub categories: Vec<CategoryView>,
}

/// POST /api/v1/cv/classify
pub async fn handle_classify(
    State(state): State<AppState>,
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, AppError> {
    let cv_text = req
        .cv_text
        .ok_or_else(|| AppError::Validation("cv_text is required".to_string()))?;
    let table = req
        .categories
        .map(CategoryKeywordTable::new)
        .transpose()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let auto_translate = req.auto_translate.unwrap_or(state.config.auto_translate);

    let classification = state
        .pipeline
        .classify(&cv_text, table.as_ref(), auto_translate)
        .await;
    Ok(Json(classification.into()))
}

/// POST /api/v1/cv/process
pub async fn handle_process(
    State(state): State<AppState>,
    Json(req): Json<ProcessRequest>,
) -> Result<Json<ProcessOutcome>, AppError> {
    if req.file_path.trim().is_empty() {
        return Err(AppError::Validation("file_path is required".to_string()));
    }
    let submission = CvSubmission {
        file_path: PathBuf::from(req.file_path),
        format_tag: req.file_type,
        cv_id: req.cv_id,
        user_id: req.user_id,
        auto_translate: req.auto_translate.unwrap_or(state.config.auto_translate),
    };

    let outcome = state.pipeline.process(&submission).await?;
    Ok(Json(outcome))
}

/// GET /api/v1/categories
pub async fn handle_list_categories(
    State(state): State<AppState>,
) -> Result<Json<CategoriesResponse>, AppError> {
    let stored = state.pipeline.store().list_categories().await?;
    let classifier = state.pipeline.classifier();

    let categories = classifier
        .table()
        .categories()
        .iter()
        .map(|category| {
            let row = stored.iter().find(|row| row.name == category.name);
            CategoryView {
                name: category.name.clone(),
                category_id: row.map(|r| r.id),
                description: row
                    .and_then(|r| r.description.clone())
                    .or_else(|| category.description.clone()),
                keywords: category.keywords.clone(),
            }
        })
        .collect();

    Ok(Json(CategoriesResponse {
        threshold: classifier.threshold(),
        categories,
    }))
}
