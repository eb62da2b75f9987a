//! Error types for the kwitansi-core library.

use thiserror::Error;

/// Main error type for the kwitansi library.
#[derive(Error, Debug)]
pub enum KwitansiError {
    /// The declared mime type is not one the pipeline accepts.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Image preprocessing error.
    #[error("preprocessing error: {0}")]
    Preprocess(#[from] PreprocessError),

    /// Recognition provider error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Image decoding/encoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised inside the preprocessor.
///
/// These never leave the pipeline: the preprocessor falls back to the
/// original image bytes when one occurs.
#[derive(Error, Debug)]
pub enum PreprocessError {
    /// The bytes could not be decoded as the declared format.
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// The processed image could not be encoded.
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    /// The image has a zero dimension.
    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// Errors raised by a recognition provider.
///
/// The orchestrator turns every one of these into a failed attempt and moves on
/// to the next provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider did not answer within the per-attempt timeout.
    #[error("provider {provider} timed out after {after_ms}ms")]
    Timeout { provider: String, after_ms: u64 },

    /// The provider failed in a provider-specific way.
    #[error("provider {provider} failed: {message}")]
    Invocation { provider: String, message: String },

    /// HTTP transport error.
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered but the payload was unusable.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// OCR model files could not be loaded.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The policy names a provider that is not registered.
    #[error("provider not registered: {0}")]
    NotRegistered(String),
}

impl ProviderError {
    /// Whether this error represents a timed-out attempt.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout { .. })
    }
}

/// Errors related to configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A numeric value is outside its permitted range.
    #[error("{field} out of range: {value}")]
    OutOfRange { field: String, value: String },

    /// The provider order names an unknown provider.
    #[error("unknown provider id: {0}")]
    UnknownProvider(String),

    /// A table entry is malformed.
    #[error("invalid {table} entry: {reason}")]
    InvalidEntry { table: String, reason: String },
}

/// Result type for the kwitansi library.
pub type Result<T> = std::result::Result<T, KwitansiError>;
