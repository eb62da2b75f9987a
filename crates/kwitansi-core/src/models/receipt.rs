//! Receipt data models: pipeline inputs, intermediate images and the final record.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::KwitansiError;

/// Image formats accepted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MimeType {
    Jpeg,
    Png,
}

impl MimeType {
    /// Canonical mime string.
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::Jpeg => "image/jpeg",
            MimeType::Png => "image/png",
        }
    }

    /// Matching `image` crate format.
    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            MimeType::Jpeg => image::ImageFormat::Jpeg,
            MimeType::Png => image::ImageFormat::Png,
        }
    }

    /// Guess the mime type from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(MimeType::Jpeg),
            "png" => Some(MimeType::Png),
            _ => None,
        }
    }
}

impl FromStr for MimeType {
    type Err = KwitansiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Parameters such as "; charset=binary" are ignored.
        let essence = s.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Ok(MimeType::Jpeg),
            "image/png" => Ok(MimeType::Png),
            _ => Err(KwitansiError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw image bytes as handed over by the caller.
#[derive(Debug, Clone)]
pub struct RawImage {
    bytes: Arc<[u8]>,
    mime: MimeType,
}

impl RawImage {
    /// Wrap caller bytes, rejecting unsupported mime types up front.
    pub fn new(bytes: impl Into<Vec<u8>>, mime: &str) -> Result<Self, KwitansiError> {
        let mime = mime.parse()?;
        Ok(Self::with_mime(bytes, mime))
    }

    /// Wrap bytes with an already-validated mime type.
    pub fn with_mime(bytes: impl Into<Vec<u8>>, mime: MimeType) -> Self {
        Self {
            bytes: Arc::from(bytes.into()),
            mime,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> MimeType {
        self.mime
    }
}

/// Image prepared for a recognition engine.
///
/// Either the output of the preprocessor (single-channel PNG with a bounded
/// longer side) or, when preprocessing failed, the caller's original bytes.
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    bytes: Arc<[u8]>,
    mime: MimeType,
    dimensions: Option<(u32, u32)>,
    processed: bool,
}

impl PreprocessedImage {
    /// Image produced by a successful preprocessing run.
    pub fn processed(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            bytes: Arc::from(bytes),
            mime: MimeType::Png,
            dimensions: Some((width, height)),
            processed: true,
        }
    }

    /// The original image reinterpreted as preprocessed.
    pub fn passthrough(raw: &RawImage) -> Self {
        Self {
            bytes: raw.bytes.clone(),
            mime: raw.mime,
            dimensions: None,
            processed: false,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap shared handle to the bytes, for moving onto worker threads.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        self.bytes.clone()
    }

    pub fn mime(&self) -> MimeType {
        self.mime
    }

    /// Width and height, known only for processed images.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    /// False when preprocessing fell back to the original bytes.
    pub fn is_processed(&self) -> bool {
        self.processed
    }
}

/// Which fields the extractor found. Sole input to the confidence scorer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractionFactors {
    pub has_amount: bool,
    pub has_merchant: bool,
    pub has_date: bool,
    /// True only for a matched, non-default category.
    pub has_category: bool,
}

/// Terminal artifact handed to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    /// Total in whole rupiah.
    pub amount: Option<i64>,

    pub merchant_name: Option<String>,

    /// Transaction date, serialized as an ISO-8601 calendar date.
    pub date: Option<NaiveDate>,

    /// Category label from the keyword table, or the default category.
    pub category: String,

    /// Weighted completeness of the extraction (0.0 - 1.0).
    pub confidence_score: f32,

    /// Provider whose text was accepted, or "manual" when none was.
    pub ocr_provider_id: String,
}

impl ReceiptRecord {
    /// Date as a zero-padded `YYYY-MM-DD` string.
    pub fn date_iso(&self) -> Option<String> {
        self.date.map(|d| d.format("%Y-%m-%d").to_string())
    }

    /// Whether downstream policy should route this record to a human.
    pub fn needs_review(&self, threshold: f32) -> bool {
        self.confidence_score < threshold
    }
}
