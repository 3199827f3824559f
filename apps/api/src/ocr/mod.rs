//! OCR engines used by the image extractor.
//!
//! `SharedOcrEngine` owns the process-wide engine instance: constructed lazily on
//! first use, exactly once even under concurrent first use, and read-only after.

pub mod tesseract;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

pub use tesseract::TesseractEngine;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    #[error("OCR failed: {0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One recognised line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrLine {
    pub text: String,
    /// 0.0 – 1.0
    pub confidence: f32,
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn recognize(&self, image_path: &Path) -> Result<Vec<OcrLine>, OcrError>;
}

type EngineFactory = Box<dyn Fn() -> Result<Arc<dyn OcrEngine>, OcrError> + Send + Sync>;

/// Lazily constructed, shared OCR engine.
///
/// A failed construction is not cached; the next caller tries again.
pub struct SharedOcrEngine {
    cell: OnceCell<Arc<dyn OcrEngine>>,
    factory: Option<EngineFactory>,
}

impl SharedOcrEngine {
    pub fn lazy<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn OcrEngine>, OcrError> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Some(Box::new(factory)),
        }
    }

    /// Already-constructed engine.
    pub fn ready(engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            cell: OnceCell::new_with(Some(engine)),
            factory: None,
        }
    }

    /// No OCR capability at all; every `get` returns `None`.
    pub fn disabled() -> Self {
        Self {
            cell: OnceCell::new(),
            factory: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// Returns the engine, constructing it on first use.
    pub async fn get(&self) -> Option<Arc<dyn OcrEngine>> {
        if let Some(engine) = self.cell.get() {
            return Some(Arc::clone(engine));
        }
        let factory = self.factory.as_ref()?;

        let result = self
            .cell
            .get_or_try_init(|| async {
                let engine = factory()?;
                info!("OCR engine initialized: {}", engine.name());
                Ok::<_, OcrError>(engine)
            })
            .await;

        match result {
            Ok(engine) => Some(Arc::clone(engine)),
            Err(e) => {
                warn!("Failed to initialize OCR engine: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Returns canned lines after an optional delay, counting calls.
    pub struct FakeOcrEngine {
        pub lines: Vec<OcrLine>,
        pub delay: Option<Duration>,
        pub calls: AtomicUsize,
    }

    impl FakeOcrEngine {
        pub fn new(lines: Vec<(&str, f32)>) -> Self {
            Self {
                lines: lines
                    .into_iter()
                    .map(|(text, confidence)| OcrLine {
                        text: text.to_string(),
                        confidence,
                    })
                    .collect(),
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
    impl OcrEngine for FakeOcrEngine {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn recognize(&self, _image_path: &Path) -> Result<Vec<OcrLine>, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.lines.clone())
        }
    }
}
