//! Image preprocessing for receipt OCR.
//!
//! Grayscale, contrast stretch, unsharp mask, bounded downscale, then a fixed
//! binarization threshold tuned for thermal paper and colored stock. The output
//! is always a single-channel PNG.

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat};
use tracing::{debug, warn};

use crate::error::PreprocessError;
use crate::models::config::PreprocessConfig;
use crate::models::receipt::{PreprocessedImage, RawImage};

/// Image preprocessor for the recognition providers.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    /// Maximum length of the longer side.
    max_dimension: u32,
    /// Binarization cut-off (0 - 255).
    threshold: u8,
    /// Unsharp mask sigma.
    sharpen_sigma: f32,
    /// Unsharp mask threshold.
    sharpen_threshold: i32,
    /// Histogram tails clipped during contrast stretching, in percent.
    clip_percent: f32,
}

impl ImagePreprocessor {
    /// Create a new preprocessor with default settings.
    pub fn new() -> Self {
        Self::from_config(&PreprocessConfig::default())
    }

    pub fn from_config(config: &PreprocessConfig) -> Self {
        Self {
            max_dimension: config.max_dimension.max(1),
            threshold: config.binarize_threshold,
            sharpen_sigma: config.sharpen_sigma,
            sharpen_threshold: config.sharpen_threshold,
            clip_percent: config.contrast_clip_percent,
        }
    }

    /// Set maximum image dimension.
    pub fn with_max_dimension(mut self, size: u32) -> Self {
        self.max_dimension = size.max(1);
        self
    }

    /// Preprocess an image, falling back to the original bytes on any failure.
    pub fn preprocess(&self, image: &RawImage) -> PreprocessedImage {
        match self.try_preprocess(image) {
            Ok(processed) => processed,
            Err(e) => {
                warn!(error = %e, mime = %image.mime(), "Preprocessing failed, using original image");
                PreprocessedImage::passthrough(image)
            }
        }
    }

    /// Preprocess an image, reporting failures.
    pub fn try_preprocess(&self, image: &RawImage) -> Result<PreprocessedImage, PreprocessError> {
        let decoded = image::load_from_memory_with_format(image.bytes(), image.mime().image_format())
            .map_err(PreprocessError::Decode)?;

        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(PreprocessError::InvalidDimensions { width, height });
        }
        debug!("Original image size: {}x{}", width, height);

        let gray = decoded.to_luma8();
        let normalized = self.normalize_contrast(&gray);
        let sharpened = imageops::unsharpen(&normalized, self.sharpen_sigma, self.sharpen_threshold);

        let (new_width, new_height) = self.calculate_resize_dimensions(width, height);
        let mut resized = if (new_width, new_height) != (width, height) {
            debug!("Downscaling to {}x{}", new_width, new_height);
            imageops::resize(&sharpened, new_width, new_height, FilterType::Lanczos3)
        } else {
            sharpened
        };

        self.binarize(&mut resized);

        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(resized)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(PreprocessError::Encode)?;

        Ok(PreprocessedImage::processed(bytes, new_width, new_height))
    }

    /// Stretch luminance so the clipped histogram spans the full 0 - 255 range.
    fn normalize_contrast(&self, image: &GrayImage) -> GrayImage {
        let mut histogram = [0u64; 256];
        for pixel in image.pixels() {
            histogram[pixel[0] as usize] += 1;
        }

        let total: u64 = histogram.iter().sum();
        let clip = ((total as f64) * (self.clip_percent as f64) / 100.0) as u64;

        let low = lower_bound(&histogram, clip);
        let high = upper_bound(&histogram, clip);

        if high <= low {
            // Flat image; nothing to stretch.
            return image.clone();
        }

        let range = (high - low) as f32;
        let mut lut = [0u8; 256];
        for (value, slot) in lut.iter_mut().enumerate() {
            let stretched = (value as f32 - low as f32) * 255.0 / range;
            *slot = stretched.round().clamp(0.0, 255.0) as u8;
        }

        let mut result = image.clone();
        for pixel in result.pixels_mut() {
            pixel[0] = lut[pixel[0] as usize];
        }
        result
    }

    fn binarize(&self, image: &mut GrayImage) {
        for pixel in image.pixels_mut() {
            pixel[0] = if pixel[0] >= self.threshold { 255 } else { 0 };
        }
    }

    fn calculate_resize_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let max_dim = width.max(height);

        if max_dim <= self.max_dimension {
            return (width, height);
        }

        let scale = self.max_dimension as f64 / max_dim as f64;
        let new_width = (width as f64 * scale).round() as u32;
        let new_height = (height as f64 * scale).round() as u32;

        (new_width.max(1), new_height.max(1))
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// First luminance value whose cumulative count exceeds `clip`.
fn lower_bound(histogram: &[u64; 256], clip: u64) -> u8 {
    let mut seen = 0u64;
    for (value, count) in histogram.iter().enumerate() {
        seen += count;
        if seen > clip {
            return value as u8;
        }
    }
    255
}

/// Last luminance value whose cumulative count from the top exceeds `clip`.
fn upper_bound(histogram: &[u64; 256], clip: u64) -> u8 {
    let mut seen = 0u64;
    for (value, count) in histogram.iter().enumerate().rev() {
        seen += count;
        if seen > clip {
            return value as u8;
        }
    }
    0
}
