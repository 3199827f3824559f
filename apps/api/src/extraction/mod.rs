//! Extraction: converts an uploaded CV file on disk into plain text.
//!
//! One extractor per format family sits behind the `TextExtractor` trait; the
//! `ExtractionDispatcher` routes by format tag and downgrades every failure to an
//! `ExtractionResult` without text. Nothing in here may fail the upload.

pub mod dispatcher;
pub mod docx;
pub mod image;
pub mod pdf;
pub mod txt;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use dispatcher::ExtractionDispatcher;

/// Format tags accepted by the dispatcher.
pub const SUPPORTED_FORMAT_TAGS: &[&str] = &["pdf", "docx", "doc", "txt", "jpg", "jpeg", "png"];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Extraction unavailable: {0}")]
    Unavailable(String),

    #[error("Extraction failed: {0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Format family of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Docx,
    Txt,
    Image,
}

impl SourceFormat {
    /// Maps a declared format tag (`pdf`, `docx`, `doc`, `txt`, `jpg`, `jpeg`, `png`)
    /// to its format family. `doc` is read as `docx`. A leading dot and letter case
    /// are ignored.
    pub fn from_tag(tag: &str) -> Result<Self, ExtractError> {
        let normalized = tag.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "pdf" => Ok(SourceFormat::Pdf),
            "docx" | "doc" => Ok(SourceFormat::Docx),
            "txt" => Ok(SourceFormat::Txt),
            "jpg" | "jpeg" | "png" => Ok(SourceFormat::Image),
            _ => Err(ExtractError::UnsupportedFormat(tag.trim().to_string())),
        }
    }

    /// Derives the format family from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ExtractError::UnsupportedFormat(path.display().to_string()))?;
        Self::from_tag(ext)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Pdf => "pdf",
            SourceFormat::Docx => "docx",
            SourceFormat::Txt => "txt",
            SourceFormat::Image => "image",
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of extracting one file. Transient: only the downstream classification
/// is ever persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub text: Option<String>,
    pub source_format: SourceFormat,
    /// True when the extractor ran to completion. `text` can still be `None`
    /// for a document without any text in it.
    pub succeeded: bool,
}

impl ExtractionResult {
    pub fn completed(source_format: SourceFormat, text: Option<String>) -> Self {
        Self {
            text: non_blank(text),
            source_format,
            succeeded: true,
        }
    }

    pub fn failed(source_format: SourceFormat) -> Self {
        Self {
            text: None,
            source_format,
            succeeded: false,
        }
    }

    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }
}

/// A format-specific extractor. `Ok(None)` means the file was read but held no text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    fn format(&self) -> SourceFormat;

    async fn extract(&self, path: &Path) -> Result<Option<String>, ExtractError>;
}

/// Trims extracted text and turns blank output into `None`, so callers never see
/// an empty string.
pub(crate) fn non_blank(text: Option<String>) -> Option<String> {
    text.and_then(|t| {
        let trimmed = t.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == t.len() {
            Some(t)
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Fails with `NotFound` when `path` does not point at a regular file.
pub(crate) async fn ensure_file(path: &Path) -> Result<std::fs::Metadata, ExtractError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(meta),
        Ok(_) => Err(ExtractError::NotFound(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ExtractError::NotFound(path.to_path_buf()))
        }
        Err(e) => Err(ExtractError::Io(e)),
    }
}
