//! Tesseract OCR engine.
//!
//! Runs the `tesseract` binary in TSV mode and folds word rows into lines with a
//! mean confidence. The child process is killed if the caller's future is dropped,
//! which is how the image extractor's timeout cancels a run.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{OcrEngine, OcrError, OcrLine};

pub const DEFAULT_LANGUAGES: &str = "eng+vie";

/// TSV row level for a single word.
const WORD_LEVEL: &str = "5";

pub struct TesseractEngine {
    binary: PathBuf,
    languages: String,
}

impl TesseractEngine {
    /// Finds `tesseract` on `PATH`.
    pub fn locate(languages: &str) -> Result<Self, OcrError> {
        let binary = which::which("tesseract").map_err(|_| {
            OcrError::Unavailable("tesseract not found (install tesseract-ocr)".to_string())
        })?;
        Ok(Self::with_binary(binary, languages))
    }

    pub fn with_binary(binary: PathBuf, languages: &str) -> Self {
        let languages = if languages.trim().is_empty() {
            DEFAULT_LANGUAGES.to_string()
        } else {
            languages.trim().to_string()
        };
        Self { binary, languages }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn recognize(&self, image_path: &Path) -> Result<Vec<OcrLine>, OcrError> {
        debug!("Running tesseract ({}) on {}", self.languages, image_path.display());

        let output = Command::new(&self.binary)
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.languages])
            .arg("tsv")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    OcrError::Unavailable(format!("{} not found", self.binary.display()))
                }
                _ => OcrError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Failed(format!("tesseract failed: {}", stderr.trim())));
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Folds tesseract TSV output into lines.
///
/// Columns: level, page_num, block_num, par_num, line_num, word_num, left, top,
/// width, height, conf, text. Words with a negative confidence or blank text are
/// dropped; a line's confidence is the mean of its words' confidences scaled to 0–1.
pub fn parse_tsv(tsv: &str) -> Vec<OcrLine> {
    struct Pending {
        key: (u32, u32, u32, u32),
        words: Vec<String>,
        conf_sum: f32,
    }

    fn finish(pending: Pending) -> OcrLine {
        let count = pending.words.len() as f32;
        OcrLine {
            text: pending.words.join(" "),
            confidence: (pending.conf_sum / count / 100.0).clamp(0.0, 1.0),
        }
    }

    let mut lines = Vec::new();
    let mut current: Option<Pending> = None;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != WORD_LEVEL {
            continue;
        }
        let text = cols[11].trim();
        let conf: f32 = match cols[10].trim().parse() {
            Ok(c) => c,
            Err(_) => continue,
        };
        if text.is_empty() || conf < 0.0 {
            continue;
        }
        let key = match (
            cols[1].parse::<u32>(),
            cols[2].parse::<u32>(),
            cols[3].parse::<u32>(),
            cols[4].parse::<u32>(),
        ) {
            (Ok(page), Ok(block), Ok(par), Ok(line)) => (page, block, par, line),
            _ => continue,
        };

        match current.as_mut() {
            Some(pending) if pending.key == key => {
                pending.words.push(text.to_string());
                pending.conf_sum += conf;
            }
            _ => {
                if let Some(done) = current.take() {
                    lines.push(finish(done));
                }
                current = Some(Pending {
                    key,
                    words: vec![text.to_string()],
                    conf_sum: conf,
                });
            }
        }
    }
    if let Some(done) = current {
        lines.push(finish(done));
    }

    lines
}
