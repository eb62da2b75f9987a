//! Text recognition: preprocessing, providers and the fallback orchestrator.

mod manual;
mod observe;
mod orchestrator;
mod preprocessing;
#[cfg(feature = "native")]
mod pure_engine;
mod vision;

pub use manual::ManualProvider;
pub use observe::{AttemptOutcome, AttemptSink, RecordingSink, TracingSink};
pub use orchestrator::{Disposition, Orchestrator, ProviderPolicy, Recognition};
pub use preprocessing::ImagePreprocessor;
#[cfg(feature = "native")]
pub use pure_engine::LocalOcrProvider;
pub use vision::VisionProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::models::receipt::PreprocessedImage;

/// Text and self-reported confidence returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognized {
    pub text: String,
    /// Provider confidence (0.0 - 1.0). Clamped by the orchestrator.
    pub confidence: f32,
}

impl Recognized {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// A text recognition backend.
///
/// Implementations report failure through `Err`; the orchestrator records it
/// as a failed attempt and moves on to the next provider in the policy.
#[async_trait]
pub trait RecognitionProvider: Send + Sync {
    /// Stable identifier used in the provider order and on the final record.
    fn id(&self) -> &str;

    /// Recognize the text on a preprocessed image.
    async fn recognize(&self, image: &PreprocessedImage) -> Result<Recognized, ProviderError>;
}

/// Outcome of one provider attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub provider_id: String,

    /// Recognized text, empty when the attempt failed.
    pub raw_text: String,

    /// Provider confidence (0.0 - 1.0), zero when the attempt failed.
    pub confidence: f32,

    /// Wall-clock time spent on the attempt.
    pub elapsed_ms: u64,

    pub succeeded: bool,
}

impl ProviderResult {
    /// A successful attempt.
    pub fn success(provider_id: impl Into<String>, recognized: Recognized, elapsed_ms: u64) -> Self {
        Self {
            provider_id: provider_id.into(),
            raw_text: recognized.text,
            confidence: clamp_confidence(recognized.confidence),
            elapsed_ms,
            succeeded: true,
        }
    }

    /// A failed or timed-out attempt.
    pub fn failure(provider_id: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            provider_id: provider_id.into(),
            raw_text: String::new(),
            confidence: 0.0,
            elapsed_ms,
            succeeded: false,
        }
    }

    /// Sentinel returned when no provider produced usable text.
    pub fn manual() -> Self {
        Self {
            provider_id: crate::models::config::MANUAL_PROVIDER_ID.to_string(),
            raw_text: String::new(),
            confidence: 0.0,
            elapsed_ms: 0,
            succeeded: false,
        }
    }

    /// Whether the attempt produced text worth extracting from.
    pub fn has_text(&self) -> bool {
        self.succeeded && !self.raw_text.trim().is_empty()
    }
}

fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_success_clamps_confidence() {
        let high = ProviderResult::success("vision", Recognized::new("TOTAL 10.000", 1.7), 12);
        assert_eq!(high.confidence, 1.0);
        assert!(high.succeeded);

        let nan = ProviderResult::success("vision", Recognized::new("x", f32::NAN), 1);
        assert_eq!(nan.confidence, 0.0);
    }

    #[test]
    fn test_manual_sentinel() {
        let manual = ProviderResult::manual();
        assert_eq!(manual.provider_id, "manual");
        assert_eq!(manual.raw_text, "");
        assert_eq!(manual.confidence, 0.0);
        assert!(!manual.succeeded);
        assert!(!manual.has_text());
    }

    #[test]
    fn test_has_text_ignores_whitespace() {
        let blank = ProviderResult::success("local", Recognized::new("  \n ", 0.9), 5);
        assert!(!blank.has_text());
    }
}
