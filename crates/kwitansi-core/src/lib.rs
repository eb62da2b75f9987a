//! Core library for Indonesian receipt OCR.
//!
//! This crate provides:
//! - Image preprocessing for thermal and scanned receipts
//! - Recognition providers (vision-language model, local OCR, manual entry)
//!   behind a fallback orchestrator
//! - Rule-based extraction of amount, merchant, date and category
//! - Completeness scoring for review routing

pub mod error;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod receipt;

pub use error::{KwitansiError, Result};
pub use models::config::KwitansiConfig;
pub use models::receipt::{ExtractionFactors, MimeType, RawImage, ReceiptRecord};
pub use ocr::{
    Disposition, ImagePreprocessor, Orchestrator, ProviderPolicy, ProviderResult,
    RecognitionProvider, Recognized,
};
pub use pipeline::{ReceiptPipeline, ReceiptReport};
pub use receipt::{ConfidenceScorer, ReceiptParser};
