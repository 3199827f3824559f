//! DOCX extractor: body paragraphs in document order, then table rows as
//! `cell | cell | cell` lines.

use std::io::{Cursor, Read};
use std::path::Path;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{info, warn};

use crate::extraction::{ensure_file, non_blank, ExtractError, SourceFormat, TextExtractor};

const DOCUMENT_XML: &str = "word/document.xml";
const CELL_SEPARATOR: &str = " | ";

/// Text pulled out of `word/document.xml`, before rendering.
#[derive(Debug, Default, PartialEq)]
pub struct DocxContent {
    /// Non-blank body paragraphs, in order.
    pub paragraphs: Vec<String>,
    /// One entry per non-empty table row, cells already joined.
    pub table_rows: Vec<String>,
}

impl DocxContent {
    /// Paragraph lines followed by table row lines.
    pub fn render(&self) -> Option<String> {
        let lines: Vec<&str> = self
            .paragraphs
            .iter()
            .chain(self.table_rows.iter())
            .map(String::as_str)
            .collect();
        non_blank(Some(lines.join("\n")))
    }
}

/// Extractor for `.docx` (and `.doc`) uploads.
pub struct DocxExtractor;

#[async_trait]
impl TextExtractor for DocxExtractor {
    fn format(&self) -> SourceFormat {
        SourceFormat::Docx
    }

    async fn extract(&self, path: &Path) -> Result<Option<String>, ExtractError> {
        ensure_file(path).await?;
        let bytes = tokio::fs::read(path).await?;

        let content = tokio::task::spawn_blocking(move || read_docx(&bytes))
            .await
            .map_err(|e| ExtractError::Failed(format!("DOCX task aborted: {e}")))??;

        let text = content.render();
        match &text {
            Some(t) => info!(
                "Extracted {} chars from DOCX ({} paragraphs, {} table rows): {}",
                t.len(),
                content.paragraphs.len(),
                content.table_rows.len(),
                path.display()
            ),
            None => warn!("No text extracted from DOCX: {}", path.display()),
        }
        Ok(text)
    }
}

/// Opens the zip container and parses its main document part.
pub fn read_docx(bytes: &[u8]) -> Result<DocxContent, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractError::Failed(format!("Not a DOCX container: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_XML)
        .map_err(|e| ExtractError::Failed(format!("{DOCUMENT_XML} missing: {e}")))?
        .read_to_string(&mut xml)?;

    parse_document_xml(&xml)
}

/// Walks WordprocessingML. Paragraphs nested inside other paragraphs (text boxes)
/// are skipped; nested tables are flattened into their outer cell.
pub fn parse_document_xml(xml: &str) -> Result<DocxContent, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut content = DocxContent::default();

    let mut table_depth = 0usize;
    let mut paragraph_depth = 0usize;
    let mut in_run = false;
    let mut in_text = false;
    let mut paragraph = String::new();
    let mut cell_paragraphs: Vec<String> = Vec::new();
    let mut row_cells: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:tbl" => table_depth += 1,
                b"w:tr" if table_depth == 1 => row_cells.clear(),
                b"w:tc" if table_depth == 1 => cell_paragraphs.clear(),
                b"w:p" => {
                    paragraph_depth += 1;
                    if paragraph_depth == 1 {
                        paragraph.clear();
                    }
                }
                b"w:r" if paragraph_depth == 1 => in_run = true,
                b"w:t" if paragraph_depth == 1 => in_text = true,
                _ => {}
            },
            // Only run content counts; `w:tab` also defines tab stops under `w:pPr`.
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" if paragraph_depth == 1 && in_run => paragraph.push('\t'),
                b"w:br" | b"w:cr" if paragraph_depth == 1 && in_run => paragraph.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| ExtractError::Failed(format!("Bad DOCX text node: {e}")))?;
                paragraph.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:r" if paragraph_depth == 1 => in_run = false,
                b"w:p" => {
                    if paragraph_depth == 1 {
                        let text = std::mem::take(&mut paragraph);
                        if table_depth > 0 {
                            cell_paragraphs.push(text);
                        } else if !text.trim().is_empty() {
                            content.paragraphs.push(text);
                        }
                    }
                    paragraph_depth = paragraph_depth.saturating_sub(1);
                }
                b"w:tc" if table_depth == 1 => {
                    let cell = cell_paragraphs.join("\n");
                    let cell = cell.trim();
                    if !cell.is_empty() {
                        row_cells.push(cell.to_string());
                    }
                    cell_paragraphs.clear();
                }
                b"w:tr" if table_depth == 1 => {
                    if !row_cells.is_empty() {
                        content.table_rows.push(row_cells.join(CELL_SEPARATOR));
                    }
                    row_cells.clear();
                }
                b"w:tbl" => table_depth = table_depth.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::Failed(format!(
                    "Malformed {DOCUMENT_XML} at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    Ok(content)
}
