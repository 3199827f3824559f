//! Plain-text extractor with an ordered encoding fallback chain.

use std::path::Path;

use async_trait::async_trait;
use encoding_rs::{UTF_8, WINDOWS_1252};
use tracing::{debug, info, warn};

use crate::extraction::{ensure_file, non_blank, ExtractError, SourceFormat, TextExtractor};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Bytes CP1252 leaves unassigned.
const CP1252_UNDEFINED: &[u8] = &[0x81, 0x8D, 0x8F, 0x90, 0x9D];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf8Sig,
    Cp1252,
    Latin1,
    Iso8859_1,
}

/// Encodings tried in order; the first that decodes cleanly wins.
pub const ENCODING_ORDER: [TextEncoding; 5] = [
    TextEncoding::Utf8,
    TextEncoding::Utf8Sig,
    TextEncoding::Cp1252,
    TextEncoding::Latin1,
    TextEncoding::Iso8859_1,
];

impl TextEncoding {
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf8Sig => "utf-8-sig",
            TextEncoding::Cp1252 => "cp1252",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Iso8859_1 => "iso-8859-1",
        }
    }

    /// Strict decode. `None` when the bytes are not valid in this encoding.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => {
                if bytes.starts_with(UTF8_BOM) {
                    return None;
                }
                UTF_8
                    .decode_without_bom_handling_and_without_replacement(bytes)
                    .map(|s| s.into_owned())
            }
            TextEncoding::Utf8Sig => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                UTF_8
                    .decode_without_bom_handling_and_without_replacement(body)
                    .map(|s| s.into_owned())
            }
            TextEncoding::Cp1252 => {
                if bytes.iter().any(|b| CP1252_UNDEFINED.contains(b)) {
                    return None;
                }
                WINDOWS_1252
                    .decode_without_bom_handling_and_without_replacement(bytes)
                    .map(|s| s.into_owned())
            }
            // ISO-8859-1 is the same table as Latin-1: every byte is its own code point.
            TextEncoding::Latin1 | TextEncoding::Iso8859_1 => {
                Some(bytes.iter().map(|&b| char::from(b)).collect())
            }
        }
    }
}

/// Decodes `bytes` with the first encoding in `ENCODING_ORDER` that accepts them.
/// Falls back to lossy UTF-8 with replacement characters.
pub fn decode_text(bytes: &[u8]) -> (String, &'static str) {
    for encoding in ENCODING_ORDER {
        if let Some(text) = encoding.decode(bytes) {
            return (text, encoding.label());
        }
        debug!("TXT bytes are not valid {}", encoding.label());
    }
    (String::from_utf8_lossy(bytes).into_owned(), "utf-8-lossy")
}

/// Extractor for `.txt` uploads.
pub struct TxtExtractor;

#[async_trait]
impl TextExtractor for TxtExtractor {
    fn format(&self) -> SourceFormat {
        SourceFormat::Txt
    }

    async fn extract(&self, path: &Path) -> Result<Option<String>, ExtractError> {
        ensure_file(path).await?;
        let bytes = tokio::fs::read(path).await?;

        let (text, label) = decode_text(&bytes);
        let text = non_blank(Some(text));
        match &text {
            Some(t) => info!(
                "Extracted {} chars from TXT ({label}): {}",
                t.len(),
                path.display()
            ),
            None => warn!("TXT file holds no text: {}", path.display()),
        }
        Ok(text)
    }
}
