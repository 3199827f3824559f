//! Image (OCR) extractor for scanned CVs.
//!
//! Oversized files are skipped before the OCR engine is touched. Everything else is
//! flattened to RGB, downscaled to fit `max_dimension`, and recognised, all under a
//! single timeout. Only lines at or above `min_confidence` are kept.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{imageops::FilterType, DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use tempfile::NamedTempFile;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::extraction::{ensure_file, non_blank, ExtractError, SourceFormat, TextExtractor};
use crate::ocr::{OcrError, SharedOcrEngine};

pub const DEFAULT_MAX_OCR_FILE_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_OCR_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_DIMENSION: u32 = 3000;
pub const DEFAULT_MIN_LINE_CONFIDENCE: f32 = 0.5;

/// Bounds on OCR work per image.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrLimits {
    pub max_file_bytes: u64,
    pub timeout: Duration,
    pub max_dimension: u32,
    pub min_confidence: f32,
}

impl Default for OcrLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_OCR_FILE_BYTES,
            timeout: DEFAULT_OCR_TIMEOUT,
            max_dimension: DEFAULT_MAX_DIMENSION,
            min_confidence: DEFAULT_MIN_LINE_CONFIDENCE,
        }
    }
}

/// Extractor for `.jpg`, `.jpeg` and `.png` uploads.
pub struct ImageExtractor {
    engine: Arc<SharedOcrEngine>,
    limits: OcrLimits,
}

impl ImageExtractor {
    pub fn new(engine: Arc<SharedOcrEngine>, limits: OcrLimits) -> Self {
        Self { engine, limits }
    }

    fn warn_timed_out(&self, path: &Path) {
        warn!(
            "OCR timed out after {}s, image stored without text: {}",
            self.limits.timeout.as_secs_f64(),
            path.display()
        );
    }
}

#[async_trait]
impl TextExtractor for ImageExtractor {
    fn format(&self) -> SourceFormat {
        SourceFormat::Image
    }

    async fn extract(&self, path: &Path) -> Result<Option<String>, ExtractError> {
        let meta = ensure_file(path).await?;
        if meta.len() > self.limits.max_file_bytes {
            warn!(
                "Image too large for OCR ({:.1}MB > {:.1}MB), skipping text extraction: {}",
                meta.len() as f64 / 1024.0 / 1024.0,
                self.limits.max_file_bytes as f64 / 1024.0 / 1024.0,
                path.display()
            );
            return Ok(None);
        }

        let Some(engine) = self.engine.get().await else {
            warn!(
                "OCR engine unavailable, image stored without text: {}",
                path.display()
            );
            return Ok(None);
        };

        // One deadline covers preprocessing and recognition.
        let deadline = Instant::now() + self.limits.timeout;

        let task = {
            let source = path.to_path_buf();
            let max_dimension = self.limits.max_dimension;
            tokio::task::spawn_blocking(move || prepare_image(&source, max_dimension))
        };
        // Keep the temp file alive until OCR has finished with it.
        let prepared = match tokio::time::timeout_at(deadline, task).await {
            Ok(Ok(Ok(file))) => Some(file),
            Ok(Ok(Err(e))) => {
                warn!("Image preprocessing failed, using original image: {e}");
                None
            }
            Ok(Err(e)) => {
                warn!("Image preprocessing aborted, using original image: {e}");
                None
            }
            Err(_) => {
                self.warn_timed_out(path);
                return Ok(None);
            }
        };
        let ocr_input = prepared.as_ref().map_or(path, |f| f.path());

        info!("Running OCR with {} on {}", engine.name(), path.display());
        let lines = match tokio::time::timeout_at(deadline, engine.recognize(ocr_input)).await {
            Ok(Ok(lines)) => lines,
            Ok(Err(OcrError::Unavailable(msg))) => return Err(ExtractError::Unavailable(msg)),
            Ok(Err(e)) => return Err(ExtractError::Failed(e.to_string())),
            Err(_) => {
                self.warn_timed_out(path);
                return Ok(None);
            }
        };

        let total = lines.len();
        let kept: Vec<String> = lines
            .into_iter()
            .filter(|line| line.confidence >= self.limits.min_confidence)
            .map(|line| line.text)
            .collect();

        let text = non_blank(Some(kept.join("\n")));
        match &text {
            Some(t) => info!(
                "Extracted {} chars from image ({} of {total} lines kept)",
                t.len(),
                kept.len()
            ),
            None => warn!(
                "No text extracted from image (all {total} lines below confidence {})",
                self.limits.min_confidence
            ),
        }
        Ok(text)
    }
}

/// Decodes, flattens and downscales an image, writing the result to a temp PNG.
pub fn prepare_image(path: &Path, max_dimension: u32) -> Result<NamedTempFile, ExtractError> {
    let decoded = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| ExtractError::Failed(format!("Could not decode image: {e}")))?;

    let rgb = flatten_to_rgb(decoded);
    let (width, height) = rgb.dimensions();
    let rgb = match scaled_dimensions(width, height, max_dimension) {
        Some((new_width, new_height)) => {
            info!("Resized image from {width}x{height} to {new_width}x{new_height}");
            image::imageops::resize(&rgb, new_width, new_height, FilterType::Lanczos3)
        }
        None => rgb,
    };

    let file = tempfile::Builder::new()
        .prefix("cv-ocr-")
        .suffix(".png")
        .tempfile()?;
    rgb.save_with_format(file.path(), ImageFormat::Png)
        .map_err(|e| ExtractError::Failed(format!("Could not write prepared image: {e}")))?;
    Ok(file)
}

/// Converts to RGB, compositing any alpha channel over white.
pub fn flatten_to_rgb(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u32::from(pixel[3]);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    out
}

/// Target size when either side exceeds `max_dimension`; the long side becomes
/// `max_dimension` and the aspect ratio is kept.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    if width <= max_dimension && height <= max_dimension {
        return None;
    }
    let (new_width, new_height) = if width > height {
        let scaled = (f64::from(height) * f64::from(max_dimension) / f64::from(width)) as u32;
        (max_dimension, scaled)
    } else {
        let scaled = (f64::from(width) * f64::from(max_dimension) / f64::from(height)) as u32;
        (scaled, max_dimension)
    };
    Some((new_width.max(1), new_height.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::testing::FakeOcrEngine;
    use crate::ocr::OcrEngine;
    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;

    fn write_png(dir: &tempfile::TempDir, name: &str, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.path().join(name);
        RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    fn extractor_with(engine: Arc<FakeOcrEngine>, limits: OcrLimits) -> ImageExtractor {
        let shared = SharedOcrEngine::ready(engine as Arc<dyn OcrEngine>);
        ImageExtractor::new(Arc::new(shared), limits)
    }

    #[test]
    fn test_scaled_dimensions_landscape() {
        assert_eq!(scaled_dimensions(6000, 3000, 3000), Some((3000, 1500)));
    }

    #[test]
    fn test_scaled_dimensions_portrait() {
        assert_eq!(scaled_dimensions(2480, 7016, 3000), Some((1060, 3000)));
    }

    #[test]
    fn test_scaled_dimensions_within_bounds() {
        assert_eq!(scaled_dimensions(3000, 3000, 3000), None);
        assert_eq!(scaled_dimensions(800, 600, 3000), None);
    }

    #[test]
    fn test_flatten_transparent_pixel_becomes_white() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([10, 20, 30, 255]));

        let rgb = flatten_to_rgb(DynamicImage::ImageRgba8(rgba));
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_prepare_image_downscales_large_scan() {
        let dir = tempdir().unwrap();
        let path = write_png(&dir, "scan.png", 3200, 1600);

        let prepared = prepare_image(&path, 3000).unwrap();
        let reloaded = image::open(prepared.path()).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (3000, 1500));
    }

    #[tokio::test]
    async fn test_oversized_image_skips_ocr() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.png");
        std::fs::write(&path, vec![0u8; 6 * 1024 * 1024]).unwrap();

        let constructions = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&constructions);
        let shared = SharedOcrEngine::lazy(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Arc::new(FakeOcrEngine::new(vec![("text", 1.0)])) as Arc<dyn OcrEngine>)
        });
        let extractor = ImageExtractor::new(Arc::new(shared), OcrLimits::default());

        assert_eq!(extractor.extract(&path).await.unwrap(), None);
        assert_eq!(constructions.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_low_confidence_lines_are_dropped() {
        let dir = tempdir().unwrap();
        let path = write_png(&dir, "cv.png", 40, 20);
        let engine = Arc::new(FakeOcrEngine::new(vec![
            ("Nguyen Van A", 0.92),
            ("~~smudge~~", 0.31),
            ("Kubernetes, Docker", 0.5),
        ]));

        let extractor = extractor_with(Arc::clone(&engine), OcrLimits::default());
        let text = extractor.extract(&path).await.unwrap();

        assert_eq!(text.as_deref(), Some("Nguyen Van A\nKubernetes, Docker"));
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_low_confidence_is_none() {
        let dir = tempdir().unwrap();
        let path = write_png(&dir, "blurry.png", 40, 20);
        let engine = Arc::new(FakeOcrEngine::new(vec![("noise", 0.2)]));

        let extractor = extractor_with(engine, OcrLimits::default());
        assert_eq!(extractor.extract(&path).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ocr_timeout_yields_none() {
        let dir = tempdir().unwrap();
        let path = write_png(&dir, "slow.png", 40, 20);
        let engine = Arc::new(
            FakeOcrEngine::new(vec![("late text", 0.99)]).with_delay(Duration::from_secs(5)),
        );
        let limits = OcrLimits {
            timeout: Duration::from_millis(50),
            ..OcrLimits::default()
        };

        let extractor = extractor_with(engine, limits);
        assert_eq!(extractor.extract(&path).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_timeout_covers_preprocessing() {
        let dir = tempdir().unwrap();
        // Small on disk, but decoding and resampling it takes far longer than the limit.
        let path = write_png(&dir, "poster.png", 4000, 4000);
        assert!(std::fs::metadata(&path).unwrap().len() < DEFAULT_MAX_OCR_FILE_BYTES);
        let engine = Arc::new(FakeOcrEngine::new(vec![("text", 0.99)]));
        let limits = OcrLimits {
            timeout: Duration::from_millis(100),
            ..OcrLimits::default()
        };

        let extractor = extractor_with(Arc::clone(&engine), limits);
        let started = std::time::Instant::now();
        let text = extractor.extract(&path).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(text, None);
        assert_eq!(engine.calls(), 0);
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_unavailable_engine_yields_none() {
        let dir = tempdir().unwrap();
        let path = write_png(&dir, "cv.png", 40, 20);
        let extractor =
            ImageExtractor::new(Arc::new(SharedOcrEngine::disabled()), OcrLimits::default());

        assert_eq!(extractor.extract(&path).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_undecodable_image_falls_back_to_original_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not really a jpeg").unwrap();
        let engine = Arc::new(FakeOcrEngine::new(vec![("Sales executive", 0.8)]));

        let extractor = extractor_with(Arc::clone(&engine), OcrLimits::default());
        assert_eq!(
            extractor.extract(&path).await.unwrap().as_deref(),
            Some("Sales executive")
        );
    }
}
