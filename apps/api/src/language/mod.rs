//! Language normalisation: detect the CV's language and, when it is not English,
//! translate it so the English keyword table can score it.
//!
//! Detection and translation are ordered provider chains. Every provider call is
//! time-bounded and every failure degrades to the original text; nothing here
//! returns an error to the caller.

pub mod libretranslate;
pub mod local;
pub mod names;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use libretranslate::LibreTranslateClient;
pub use local::WhatlangDetector;
pub use names::language_name;

pub const ENGLISH: &str = "en";

/// Shorter (trimmed, in chars) texts skip detection and count as English.
pub const MIN_DETECTION_CHARS: usize = 10;

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum LanguageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Language could not be determined")]
    Undetermined,

    #[error("Provider timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait LanguageDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns a lower-case ISO 639-1 code where the provider can.
    async fn detect(&self, text: &str) -> Result<String, LanguageError>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn translate(&self, text: &str, source: &str, target: &str)
        -> Result<String, LanguageError>;
}

/// Text ready for classification, plus what happened to it on the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguagePreparation {
    pub prepared_text: String,
    pub detected_language: Option<String>,
    pub was_translated: bool,
}

impl LanguagePreparation {
    fn unchanged(text: &str, detected_language: Option<String>) -> Self {
        Self {
            prepared_text: text.to_string(),
            detected_language,
            was_translated: false,
        }
    }
}

pub struct LanguageNormalizer {
    detectors: Vec<Arc<dyn LanguageDetector>>,
    translators: Vec<Arc<dyn Translator>>,
    timeout: Duration,
}

impl LanguageNormalizer {
    pub fn new(
        detectors: Vec<Arc<dyn LanguageDetector>>,
        translators: Vec<Arc<dyn Translator>>,
        timeout: Duration,
    ) -> Self {
        Self {
            detectors,
            translators,
            timeout,
        }
    }

    /// No providers at all: every text passes through as English.
    pub fn passthrough() -> Self {
        Self::new(Vec::new(), Vec::new(), DEFAULT_PROVIDER_TIMEOUT)
    }

    pub fn can_translate(&self) -> bool {
        !self.translators.is_empty()
    }

    /// Detects the dominant language.
    ///
    /// `None` when the text is too short or every detector failed. With no
    /// detectors configured at all the text is assumed to be English.
    pub async fn detect_language(&self, text: &str) -> Option<String> {
        if text.trim().chars().count() < MIN_DETECTION_CHARS {
            debug!("Text too short for language detection");
            return None;
        }
        if self.detectors.is_empty() {
            info!("No language detector configured, assuming English");
            return Some(ENGLISH.to_string());
        }

        for detector in &self.detectors {
            let name = detector.name();
            match tokio::time::timeout(self.timeout, detector.detect(text)).await {
                Ok(Ok(code)) => {
                    info!("Detected language: {code} ({name})");
                    return Some(code);
                }
                Ok(Err(e)) => warn!("{name} language detection failed: {e}"),
                Err(_) => warn!(
                    "{name} language detection failed: {}",
                    LanguageError::Timeout(self.timeout)
                ),
            }
        }
        None
    }

    /// Translates `text` from `source` to English with the first translator that
    /// returns non-blank output.
    pub async fn translate_to_english(&self, text: &str, source: &str) -> Option<String> {
        if self.translators.is_empty() {
            info!("No translator configured, skipping translation");
            return None;
        }

        for translator in &self.translators {
            let name = translator.name();
            let call = translator.translate(text, source, ENGLISH);
            match tokio::time::timeout(self.timeout, call).await {
                Ok(Ok(translated)) if !translated.trim().is_empty() => {
                    info!(
                        "Translated text from {source} to English ({} -> {} chars, {name})",
                        text.len(),
                        translated.len()
                    );
                    return Some(translated);
                }
                Ok(Ok(_)) => warn!("{name} translation returned empty text"),
                Ok(Err(e)) => warn!("{name} translation failed: {e}"),
                Err(_) => warn!(
                    "{name} translation failed: {}",
                    LanguageError::Timeout(self.timeout)
                ),
            }
        }
        None
    }

    /// Detect, then translate non-English text when `auto_translate` is set.
    /// Falls back to the original text on any failure.
    pub async fn prepare(&self, text: &str, auto_translate: bool) -> LanguagePreparation {
        if text.trim().is_empty() {
            return LanguagePreparation::unchanged(text, None);
        }

        let detected = self
            .detect_language(text)
            .await
            .unwrap_or_else(|| ENGLISH.to_string());
        if detected == ENGLISH {
            return LanguagePreparation::unchanged(text, Some(detected));
        }
        if !auto_translate {
            debug!("Auto-translate disabled, classifying {detected} text as is");
            return LanguagePreparation::unchanged(text, Some(detected));
        }

        match self.translate_to_english(text, &detected).await {
            Some(translated) if translated != text => LanguagePreparation {
                prepared_text: translated,
                detected_language: Some(detected),
                was_translated: true,
            },
            _ => {
                warn!("Translation failed or not needed, using original {detected} text");
                LanguagePreparation::unchanged(text, Some(detected))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Detector returning a fixed code, or failing when `code` is `None`.
    pub struct FakeDetector {
        pub code: Option<&'static str>,
        pub delay: Option<Duration>,
        pub calls: AtomicUsize,
    }

    impl FakeDetector {
        pub fn returning(code: &'static str) -> Self {
            Self {
                code: Some(code),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing() -> Self {
            Self {
                code: None,
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LanguageDetector for FakeDetector {
        fn name(&self) -> &'static str {
            "fake-detector"
        }

        async fn detect(&self, _text: &str) -> Result<String, LanguageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.code
                .map(str::to_string)
                .ok_or(LanguageError::Undetermined)
        }
    }

    /// Translator returning fixed output, or failing when `output` is `None`.
    pub struct FakeTranslator {
        pub output: Option<&'static str>,
        pub calls: AtomicUsize,
    }

    impl FakeTranslator {
        pub fn returning(output: &'static str) -> Self {
            Self {
                output: Some(output),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing() -> Self {
            Self {
                output: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Translator for FakeTranslator {
        fn name(&self) -> &'static str {
            "fake-translator"
        }

        async fn translate(
            &self,
            _text: &str,
            _source: &str,
            _target: &str,
        ) -> Result<String, LanguageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.output.map(str::to_string).ok_or(LanguageError::Api {
                status: 503,
                message: "translation backend down".to_string(),
            })
        }
    }
}
