//! Data models and configuration.

pub mod config;
pub mod receipt;

pub use config::{
    CategoryRule, ExtractionConfig, KwitansiConfig, LocalOcrConfig, PreprocessConfig,
    ProviderConfig, ScoringConfig, VisionConfig,
};
pub use receipt::{ExtractionFactors, MimeType, PreprocessedImage, RawImage, ReceiptRecord};
