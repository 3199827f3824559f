//! CV pipeline: extraction → language preparation → classification → category
//! resolution → classification log.
//!
//! Every stage is best-effort. The only error a caller can see is an unsupported
//! format tag; everything else degrades to "no text" or "no category".

pub mod handlers;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::classification::{
    resolve_category_id, CategoryKeywordTable, CategoryStore, KeywordClassifier,
};
use crate::extraction::{ExtractError, ExtractionDispatcher, SourceFormat};
use crate::language::{language_name, LanguageNormalizer};
use crate::models::category::NewClassificationLog;

/// Classification of one text, with what the language step did to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub category: Option<String>,
    pub confidence: f64,
    pub detected_language: Option<String>,
    pub language_name: Option<String>,
    pub was_translated: bool,
}

/// One uploaded file to run through the pipeline.
#[derive(Debug, Clone)]
pub struct CvSubmission {
    pub file_path: PathBuf,
    /// Declared format; derived from the extension when absent.
    pub format_tag: Option<String>,
    pub cv_id: Option<i32>,
    pub user_id: Option<i32>,
    pub auto_translate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionSummary {
    pub source_format: SourceFormat,
    pub succeeded: bool,
    pub text_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessOutcome {
    pub extraction: ExtractionSummary,
    pub text: Option<String>,
    /// Absent when no text could be extracted.
    pub classification: Option<Classification>,
    pub category_id: Option<i32>,
    pub classification_log_id: Option<i32>,
}

pub struct CvPipeline {
    dispatcher: Arc<ExtractionDispatcher>,
    normalizer: Arc<LanguageNormalizer>,
    classifier: KeywordClassifier,
    store: Arc<dyn CategoryStore>,
}

impl CvPipeline {
    pub fn new(
        dispatcher: Arc<ExtractionDispatcher>,
        normalizer: Arc<LanguageNormalizer>,
        classifier: KeywordClassifier,
        store: Arc<dyn CategoryStore>,
    ) -> Self {
        Self {
            dispatcher,
            normalizer,
            classifier,
            store,
        }
    }

    pub fn classifier(&self) -> &KeywordClassifier {
        &self.classifier
    }

    pub fn store(&self) -> &Arc<dyn CategoryStore> {
        &self.store
    }

    /// File text or `None`. Unsupported formats are logged, not returned.
    pub async fn extract_text(&self, path: &Path, format_tag: Option<&str>) -> Option<String> {
        self.dispatcher.extract_text(path, format_tag).await
    }

    /// Prepares (detects and, if enabled, translates) `text` and classifies it
    /// against `table_override` or the active table.
    pub async fn classify(
        &self,
        text: &str,
        table_override: Option<&CategoryKeywordTable>,
        auto_translate: bool,
    ) -> Classification {
        let (prepared_text, detected_language, was_translated) = if auto_translate {
            let prepared = self.normalizer.prepare(text, true).await;
            if prepared.was_translated {
                info!(
                    "CV text was translated from {} to English for classification",
                    prepared.detected_language.as_deref().unwrap_or("unknown")
                );
            } else if let Some(lang) = prepared
                .detected_language
                .as_deref()
                .filter(|l| *l != crate::language::ENGLISH)
            {
                info!("CV text is in {lang}, but translation not performed");
            }
            (
                prepared.prepared_text,
                prepared.detected_language,
                prepared.was_translated,
            )
        } else {
            (text.to_string(), None, false)
        };

        let outcome = self.classifier.classify(&prepared_text, table_override);
        Classification {
            category: outcome.category_name,
            confidence: outcome.confidence,
            language_name: detected_language.as_deref().map(language_name),
            detected_language,
            was_translated,
        }
    }

    pub async fn resolve_category_id(&self, category_name: &str) -> Option<i32> {
        resolve_category_id(category_name, self.store.as_ref()).await
    }

    /// Runs a stored file through the whole pipeline.
    pub async fn process(&self, submission: &CvSubmission) -> Result<ProcessOutcome, ExtractError> {
        let path = submission.file_path.as_path();
        let extraction = self
            .dispatcher
            .extract_detected(path, submission.format_tag.as_deref())
            .await?;

        let summary = ExtractionSummary {
            source_format: extraction.source_format,
            succeeded: extraction.succeeded,
            text_chars: extraction
                .text
                .as_deref()
                .map_or(0, |t| t.chars().count()),
        };

        let Some(text) = extraction.text else {
            info!(
                "No text extracted from {}, stored without classification",
                path.display()
            );
            return Ok(ProcessOutcome {
                extraction: summary,
                text: None,
                classification: None,
                category_id: None,
                classification_log_id: None,
            });
        };
        info!(
            "Successfully extracted text from {} ({} characters)",
            path.display(),
            summary.text_chars
        );

        let classification = self.classify(&text, None, submission.auto_translate).await;

        let category_id = match classification.category.as_deref() {
            Some(name) => self.resolve_category_id(name).await,
            None => None,
        };
        if let (Some(name), Some(id)) = (classification.category.as_deref(), category_id) {
            info!(
                "Classified CV as '{name}' (ID: {id}) with confidence {:.2}%",
                classification.confidence * 100.0
            );
        }

        let classification_log_id = match (submission.cv_id, category_id) {
            (Some(cv_id), Some(category_id)) => {
                self.record(cv_id, category_id, classification.confidence, submission.user_id)
                    .await
            }
            _ => None,
        };

        Ok(ProcessOutcome {
            extraction: summary,
            text: Some(text),
            classification: Some(classification),
            category_id,
            classification_log_id,
        })
    }

    async fn record(
        &self,
        cv_id: i32,
        category_id: i32,
        confidence: f64,
        user_id: Option<i32>,
    ) -> Option<i32> {
        let log = NewClassificationLog {
            cv_id,
            predicted_category_id: Some(category_id),
            confidence,
            user_id,
        };
        match self.store.record_classification(&log).await {
            Ok(id) => {
                info!("Created classification log {id} for CV {cv_id}");
                Some(id)
            }
            Err(e) => {
                error!("Error creating classification log for CV {cv_id}: {e}");
                None
            }
        }
    }
}

/// Warns when the active table names categories the store does not know.
pub async fn check_store_coverage(pipeline: &CvPipeline) {
    for name in pipeline.classifier().table().names() {
        if pipeline.resolve_category_id(name).await.is_none() {
            warn!("Category '{name}' has no stored id; CVs classified as it stay unresolved");
        }
    }
}
