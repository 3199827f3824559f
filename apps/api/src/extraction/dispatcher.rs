use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use super::docx::DocxExtractor;
use super::image::{ImageExtractor, OcrLimits};
use super::pdf::PdfExtractor;
use super::txt::TxtExtractor;
use super::{ExtractError, ExtractionResult, SourceFormat, TextExtractor};
use crate::ocr::SharedOcrEngine;

/// Routes a file to the extractor for its format family.
pub struct ExtractionDispatcher {
    extractors: HashMap<SourceFormat, Arc<dyn TextExtractor>>,
}

impl ExtractionDispatcher {
    /// The standard set: PDF, DOCX, TXT and image OCR.
    pub fn new(ocr: Arc<SharedOcrEngine>, limits: OcrLimits) -> Self {
        let extractors: Vec<Arc<dyn TextExtractor>> = vec![
            Arc::new(PdfExtractor::new()),
            Arc::new(DocxExtractor),
            Arc::new(TxtExtractor),
            Arc::new(ImageExtractor::new(ocr, limits)),
        ];
        Self::with_extractors(extractors)
    }

    /// Later extractors replace earlier ones for the same format.
    pub fn with_extractors(extractors: Vec<Arc<dyn TextExtractor>>) -> Self {
        let extractors = extractors
            .into_iter()
            .map(|extractor| (extractor.format(), extractor))
            .collect();
        Self { extractors }
    }

    /// Extracts text from `path` declared as `format_tag`.
    ///
    /// Only an unrecognised tag is an error. Everything the extractor itself runs into
    /// is downgraded to a failed result without text.
    pub async fn extract(
        &self,
        path: &Path,
        format_tag: &str,
    ) -> Result<ExtractionResult, ExtractError> {
        let format = SourceFormat::from_tag(format_tag)?;
        Ok(self.extract_as(path, format).await)
    }

    /// Like [`extract`](Self::extract), deriving the format from the file extension
    /// when no tag is given.
    pub async fn extract_detected(
        &self,
        path: &Path,
        format_tag: Option<&str>,
    ) -> Result<ExtractionResult, ExtractError> {
        let format = match format_tag.map(str::trim).filter(|t| !t.is_empty()) {
            Some(tag) => SourceFormat::from_tag(tag)?,
            None => SourceFormat::from_path(path)?,
        };
        Ok(self.extract_as(path, format).await)
    }

    /// Text or nothing. Unsupported formats are logged, never returned as errors.
    pub async fn extract_text(&self, path: &Path, format_tag: Option<&str>) -> Option<String> {
        match self.extract_detected(path, format_tag).await {
            Ok(result) => result.text,
            Err(e) => {
                error!("{e} ({})", path.display());
                None
            }
        }
    }

    async fn extract_as(&self, path: &Path, format: SourceFormat) -> ExtractionResult {
        let Some(extractor) = self.extractors.get(&format) else {
            warn!("No {format} extractor configured, skipping {}", path.display());
            return ExtractionResult::failed(format);
        };

        match extractor.extract(path).await {
            Ok(text) => {
                let result = ExtractionResult::completed(format, text);
                if !result.has_text() {
                    info!("No text found in {format} file {}", path.display());
                }
                result
            }
            Err(ExtractError::Unavailable(reason)) => {
                warn!(
                    "{format} extraction unavailable for {}: {reason}",
                    path.display()
                );
                ExtractionResult::failed(format)
            }
            Err(e) => {
                warn!("{format} extraction failed for {}: {e}", path.display());
                ExtractionResult::failed(format)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct StubExtractor {
        format: SourceFormat,
        output: fn() -> Result<Option<String>, ExtractError>,
        calls: AtomicUsize,
    }

    impl StubExtractor {
        fn new(
            format: SourceFormat,
            output: fn() -> Result<Option<String>, ExtractError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                format,
                output,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextExtractor for StubExtractor {
        fn format(&self) -> SourceFormat {
            self.format
        }

        async fn extract(&self, _path: &Path) -> Result<Option<String>, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.output)()
        }
    }

    #[tokio::test]
    async fn test_doc_routes_to_docx_extractor() {
        let docx = StubExtractor::new(SourceFormat::Docx, || Ok(Some("from docx".to_string())));
        let dispatcher =
            ExtractionDispatcher::with_extractors(vec![docx.clone() as Arc<dyn TextExtractor>]);

        let result = dispatcher.extract(Path::new("cv.doc"), "doc").await.unwrap();
        assert_eq!(result.text.as_deref(), Some("from docx"));
        assert_eq!(result.source_format, SourceFormat::Docx);
        assert!(result.succeeded);
        assert_eq!(docx.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_tag_is_rejected() {
        let dispatcher = ExtractionDispatcher::with_extractors(vec![]);
        let result = dispatcher.extract(Path::new("cv.exe"), "exe").await;
        assert!(matches!(result, Err(ExtractError::UnsupportedFormat(_))));
    }

    #[tokio::test]
    async fn test_extractor_failure_is_downgraded() {
        let pdf = StubExtractor::new(SourceFormat::Pdf, || {
            Err(ExtractError::Failed("broken xref".to_string()))
        });
        let dispatcher =
            ExtractionDispatcher::with_extractors(vec![pdf as Arc<dyn TextExtractor>]);

        let result = dispatcher.extract(Path::new("cv.pdf"), "pdf").await.unwrap();
        assert_eq!(result, ExtractionResult::failed(SourceFormat::Pdf));
    }

    #[tokio::test]
    async fn test_unavailable_extractor_is_downgraded() {
        let image = StubExtractor::new(SourceFormat::Image, || {
            Err(ExtractError::Unavailable("tesseract missing".to_string()))
        });
        let dispatcher =
            ExtractionDispatcher::with_extractors(vec![image as Arc<dyn TextExtractor>]);

        let result = dispatcher.extract(Path::new("scan.png"), "png").await.unwrap();
        assert!(!result.succeeded);
        assert_eq!(result.text, None);
    }

    #[tokio::test]
    async fn test_missing_extractor_is_failed_result() {
        let dispatcher = ExtractionDispatcher::with_extractors(vec![]);
        let result = dispatcher.extract(Path::new("cv.txt"), "txt").await.unwrap();
        assert_eq!(result, ExtractionResult::failed(SourceFormat::Txt));
    }

    #[tokio::test]
    async fn test_extract_text_detects_format_from_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cv.TXT");
        std::fs::write(&path, "  Marketing specialist, SEO and content  \n").unwrap();

        let dispatcher = ExtractionDispatcher::new(
            Arc::new(SharedOcrEngine::disabled()),
            OcrLimits::default(),
        );
        assert_eq!(
            dispatcher.extract_text(&path, None).await.as_deref(),
            Some("Marketing specialist, SEO and content")
        );
    }

    #[tokio::test]
    async fn test_extract_text_unsupported_is_none() {
        let dispatcher = ExtractionDispatcher::with_extractors(vec![]);
        assert_eq!(
            dispatcher.extract_text(Path::new("cv.odt"), Some("odt")).await,
            None
        );
        assert_eq!(dispatcher.extract_text(Path::new("README"), None).await, None);
    }

    #[tokio::test]
    async fn test_missing_file_degrades_to_no_text() {
        let dispatcher = ExtractionDispatcher::new(
            Arc::new(SharedOcrEngine::disabled()),
            OcrLimits::default(),
        );
        let result = dispatcher
            .extract(Path::new("/nonexistent/cv.pdf"), "pdf")
            .await
            .unwrap();
        assert!(!result.succeeded);
        assert_eq!(result.text, None);
    }

    #[tokio::test]
    async fn test_blank_tag_falls_back_to_extension() {
        let txt = StubExtractor::new(SourceFormat::Txt, || Ok(Some("plain".to_string())));
        let dispatcher =
            ExtractionDispatcher::with_extractors(vec![txt as Arc<dyn TextExtractor>]);
        let result = dispatcher
            .extract_detected(Path::new("notes.txt"), Some("  "))
            .await
            .unwrap();
        assert_eq!(result.text.as_deref(), Some("plain"));
    }
}
