//! Offline detection with `whatlang`. Detection only; it cannot translate.

use async_trait::async_trait;
use tracing::debug;

use super::names::normalize_code;
use super::{LanguageDetector, LanguageError};

pub struct WhatlangDetector;

#[async_trait]
impl LanguageDetector for WhatlangDetector {
    fn name(&self) -> &'static str {
        "whatlang"
    }

    async fn detect(&self, text: &str) -> Result<String, LanguageError> {
        let info = whatlang::detect(text).ok_or(LanguageError::Undetermined)?;
        debug!(
            "whatlang detected {} (confidence {:.2}, reliable: {})",
            info.lang().code(),
            info.confidence(),
            info.is_reliable()
        );
        Ok(normalize_code(info.lang().code()))
    }
}
