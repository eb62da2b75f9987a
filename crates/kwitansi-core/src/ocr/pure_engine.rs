//! Local OCR provider using `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use image::GenericImageView;
use tracing::{debug, info};

use super::{RecognitionProvider, Recognized};
use crate::error::ProviderError;
use crate::models::config::{LocalOcrConfig, LOCAL_PROVIDER_ID};
use crate::models::receipt::PreprocessedImage;

/// Typical printed line height in pixels. Regions whose tops are within half
/// of it belong to the same row.
const ROW_HEIGHT: f32 = 20.0;

/// Recognizes text with PaddleOCR models on the local machine.
///
/// The engine is loaded for every call on a blocking thread, so the provider
/// itself holds nothing but paths.
///
/// Dropping the `recognize` future (for example on an orchestrator timeout)
/// stops the blocking run at its next checkpoint: before decoding, before
/// loading the models and before inference. A `run_from_image` call that has
/// already started runs to completion and its result is discarded.
#[derive(Debug, Clone)]
pub struct LocalOcrProvider {
    config: LocalOcrConfig,
}

/// One recognized region in image coordinates.
#[derive(Debug, Clone, PartialEq)]
struct Region {
    text: String,
    confidence: f32,
    /// Axis-aligned (min_x, min_y).
    origin: (f32, f32),
}

impl LocalOcrProvider {
    pub fn new(config: LocalOcrConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RecognitionProvider for LocalOcrProvider {
    fn id(&self) -> &str {
        LOCAL_PROVIDER_ID
    }

    async fn recognize(&self, image: &PreprocessedImage) -> Result<Recognized, ProviderError> {
        if !self.config.is_available() {
            return Err(ProviderError::ModelLoad(format!(
                "model files not found in {}",
                self.config.model_dir.display()
            )));
        }

        let config = self.config.clone();
        let bytes = image.shared_bytes();
        let format = image.mime().image_format();

        let cancel = CancelOnDrop::default();
        let cancelled = cancel.flag();
        let regions = tokio::task::spawn_blocking(move || run_engine(&config, &bytes, format, &cancelled))
            .await
            .map_err(|e| ProviderError::Invocation {
                provider: LOCAL_PROVIDER_ID.to_string(),
                message: format!("OCR worker panicked: {}", e),
            })??;

        Ok(into_recognized(regions))
    }
}

/// Raises its flag when dropped, telling the blocking worker to stop.
#[derive(Default)]
struct CancelOnDrop(Arc<AtomicBool>);

impl CancelOnDrop {
    fn flag(&self) -> Arc<AtomicBool> {
        self.0.clone()
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

fn checkpoint(cancelled: &AtomicBool, stage: &str) -> Result<(), ProviderError> {
    if cancelled.load(Ordering::Relaxed) {
        debug!("Local OCR cancelled before {}", stage);
        return Err(ProviderError::Invocation {
            provider: LOCAL_PROVIDER_ID.to_string(),
            message: format!("cancelled before {}", stage),
        });
    }
    Ok(())
}

fn run_engine(
    config: &LocalOcrConfig,
    bytes: &[u8],
    format: image::ImageFormat,
    cancelled: &AtomicBool,
) -> Result<Vec<Region>, ProviderError> {
    let start = Instant::now();

    checkpoint(cancelled, "decode")?;
    let image = image::load_from_memory_with_format(bytes, format).map_err(|e| {
        ProviderError::Invocation {
            provider: LOCAL_PROVIDER_ID.to_string(),
            message: format!("failed to decode image: {}", e),
        }
    })?;

    checkpoint(cancelled, "model load")?;
    let det_path = config.detection_path();
    let rec_path = config.recognition_path();
    let dict_path = config.dictionary_path();

    let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
        .det_model_path(&det_path)
        .rec_model_path(&rec_path)
        .dictionary_path(&dict_path)
        .build()
        .map_err(|e| ProviderError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

    checkpoint(cancelled, "inference")?;
    let (width, height) = image.dimensions();
    debug!("Running local OCR on {}x{} image", width, height);

    let results = engine.run_from_image(&image).map_err(|e| ProviderError::Invocation {
        provider: LOCAL_PROVIDER_ID.to_string(),
        message: format!("pure-onnx-ocr: {}", e),
    })?;

    let regions: Vec<Region> = results
        .iter()
        .map(|r| Region {
            text: r.text.replace("[UNK]", " ").trim().to_string(),
            confidence: r.confidence,
            origin: polygon_origin(&r.bounding_box),
        })
        .filter(|r| !r.text.is_empty())
        .collect();

    info!(
        "Local OCR complete: {} regions in {}ms",
        regions.len(),
        start.elapsed().as_millis()
    );

    Ok(regions)
}

/// Top-left corner of the polygon's bounding rectangle.
fn polygon_origin(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f32, f32) {
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    for coord in polygon.exterior().coords() {
        min_x = min_x.min(coord.x as f32);
        min_y = min_y.min(coord.y as f32);
    }
    if min_x.is_finite() && min_y.is_finite() {
        (min_x, min_y)
    } else {
        (0.0, 0.0)
    }
}

/// Join regions in reading order and average their confidences.
fn into_recognized(mut regions: Vec<Region>) -> Recognized {
    if regions.is_empty() {
        return Recognized::new(String::new(), 0.0);
    }

    let confidence = regions.iter().map(|r| r.confidence).sum::<f32>() / regions.len() as f32;

    regions.sort_by(|a, b| a.origin.1.total_cmp(&b.origin.1));

    // A row starts at its topmost region; later regions join it while their
    // top stays within half a line of that anchor. Keeps "TOTAL" and its
    // amount together.
    let mut rows: Vec<(f32, Vec<Region>)> = Vec::new();
    for region in regions {
        match rows.last_mut() {
            Some((anchor, row)) if region.origin.1 - *anchor <= ROW_HEIGHT / 2.0 => row.push(region),
            _ => rows.push((region.origin.1, vec![region])),
        }
    }

    let text = rows
        .into_iter()
        .map(|(_, mut row)| {
            row.sort_by(|a, b| a.origin.0.total_cmp(&b.origin.0));
            row.into_iter().map(|r| r.text).collect::<Vec<_>>().join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n");

    Recognized::new(text, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn region(text: &str, confidence: f32, x: f32, y: f32) -> Region {
        Region {
            text: text.to_string(),
            confidence,
            origin: (x, y),
        }
    }

    #[test]
    fn test_reading_order_groups_rows() {
        let recognized = into_recognized(vec![
            region("71.500", 0.8, 300.0, 102.0),
            region("WARUNG MAKAN", 0.9, 10.0, 5.0),
            region("TOTAL", 0.7, 10.0, 100.0),
        ]);

        assert_eq!(recognized.text, "WARUNG MAKAN\nTOTAL 71.500");
        assert!((recognized.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_row_grouping_ignores_grid_boundaries() {
        let recognized = into_recognized(vec![
            region("71.500", 0.9, 300.0, 41.0),
            region("TOTAL", 0.9, 10.0, 39.0),
        ]);
        assert_eq!(recognized.text, "TOTAL 71.500");
    }

    #[test]
    fn test_rows_split_past_half_line() {
        let recognized = into_recognized(vec![
            region("TOKO ABC", 0.9, 10.0, 0.0),
            region("Jl. Mawar", 0.9, 10.0, 11.0),
            region("Jakarta", 0.9, 200.0, 14.0),
        ]);
        assert_eq!(recognized.text, "TOKO ABC\nJl. Mawar Jakarta");
    }

    #[test]
    fn test_cancelled_run_stops_before_decoding() {
        let cancelled = AtomicBool::new(true);
        let err = run_engine(
            &LocalOcrConfig::default(),
            b"not an image",
            image::ImageFormat::Png,
            &cancelled,
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::Invocation { ref message, .. } if message.contains("cancelled")));
    }

    #[test]
    fn test_cancel_guard_raises_flag_on_drop() {
        let guard = CancelOnDrop::default();
        let flag = guard.flag();
        assert!(!flag.load(Ordering::Relaxed));
        drop(guard);
        assert!(flag.load(Ordering::Relaxed));
    }

    #[test]
    fn test_no_regions_is_empty() {
        let recognized = into_recognized(Vec::new());
        assert_eq!(recognized.text, "");
        assert_eq!(recognized.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_missing_models_fail_fast() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalOcrProvider::new(LocalOcrConfig {
            model_dir: dir.path().to_path_buf(),
            ..LocalOcrConfig::default()
        });
        let image = PreprocessedImage::processed(vec![0u8; 4], 1, 1);

        let err = provider.recognize(&image).await.unwrap_err();
        assert!(matches!(err, ProviderError::ModelLoad(_)));
    }
}
