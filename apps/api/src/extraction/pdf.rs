//! PDF extractor.
//!
//! Backends are tried in order until one yields text: `lopdf` reads text objects
//! page by page, then `pdf-extract` reads the whole document as a lower-fidelity
//! fallback. Each backend runs on a blocking thread of its own, so a panic inside
//! a parser costs that backend only.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use lopdf::Document;
use tracing::{debug, info, warn};

use crate::extraction::{ensure_file, non_blank, ExtractError, SourceFormat, TextExtractor};

/// One way of turning PDF bytes into text.
pub trait PdfTextBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, bytes: &[u8]) -> Result<Option<String>, ExtractError>;
}

/// Page-by-page text objects via `lopdf`. Page texts are joined with newlines.
pub struct LopdfBackend;

impl PdfTextBackend for LopdfBackend {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract(&self, bytes: &[u8]) -> Result<Option<String>, ExtractError> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| ExtractError::Failed(format!("lopdf could not load PDF: {e}")))?;

        let mut pages_text = Vec::new();
        for page_num in doc.get_pages().keys() {
            match doc.extract_text(&[*page_num]) {
                Ok(text) if !text.trim().is_empty() => {
                    pages_text.push(text.trim_end().to_string())
                }
                Ok(_) => debug!("Page {page_num} has no text objects"),
                Err(e) => debug!("lopdf failed on page {page_num}: {e}"),
            }
        }

        Ok(non_blank(Some(pages_text.join("\n"))))
    }
}

/// Whole-document extraction via `pdf-extract`.
pub struct PdfExtractBackend;

impl PdfTextBackend for PdfExtractBackend {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract(&self, bytes: &[u8]) -> Result<Option<String>, ExtractError> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractError::Failed(format!("pdf-extract failed: {e}")))?;
        Ok(non_blank(Some(text)))
    }
}

/// Extractor for `.pdf` uploads.
pub struct PdfExtractor {
    backends: Vec<Arc<dyn PdfTextBackend>>,
}

impl PdfExtractor {
    pub fn new() -> Self {
        Self::with_backends(vec![Arc::new(LopdfBackend), Arc::new(PdfExtractBackend)])
    }

    pub fn with_backends(backends: Vec<Arc<dyn PdfTextBackend>>) -> Self {
        Self { backends }
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for PdfExtractor {
    fn format(&self) -> SourceFormat {
        SourceFormat::Pdf
    }

    async fn extract(&self, path: &Path) -> Result<Option<String>, ExtractError> {
        ensure_file(path).await?;
        let bytes: Arc<[u8]> = tokio::fs::read(path).await?.into();

        let mut last_error = None;
        let mut completed = false;
        for backend in &self.backends {
            let name = backend.name();
            let task = {
                let backend = Arc::clone(backend);
                let bytes = Arc::clone(&bytes);
                tokio::task::spawn_blocking(move || backend.extract(&bytes))
            };

            match task.await {
                Ok(Ok(Some(text))) => {
                    info!(
                        "Extracted {} chars from PDF using {name}: {}",
                        text.len(),
                        path.display()
                    );
                    return Ok(Some(text));
                }
                Ok(Ok(None)) => {
                    debug!("{name} found no text in {}", path.display());
                    completed = true;
                }
                Ok(Err(e)) => {
                    warn!("{name} extraction failed for {}: {e}", path.display());
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!("{name} aborted on {}: {e}", path.display());
                    last_error = Some(ExtractError::Failed(format!("{name} aborted: {e}")));
                }
            }
        }

        match last_error {
            // Every backend errored: surface the last failure so the dispatcher logs it.
            Some(e) if !completed => Err(e),
            _ => {
                warn!("No text extracted from PDF: {}", path.display());
                Ok(None)
            }
        }
    }
}
