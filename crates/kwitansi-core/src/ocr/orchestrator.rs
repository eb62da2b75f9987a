//! Provider fallback chain.
//!
//! Providers are tried in policy order, each bounded by the per-attempt
//! timeout. The first result at or above the acceptance threshold wins. When
//! every provider has been tried the best text-bearing attempt is returned as
//! a best-effort result, or the manual sentinel when nothing produced text.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::observe::{AttemptOutcome, AttemptSink, TracingSink};
use super::{ProviderResult, RecognitionProvider};
use crate::error::ProviderError;
use crate::models::config::{ProviderConfig, MANUAL_PROVIDER_ID};
use crate::models::receipt::PreprocessedImage;

/// Which providers to try, in which order, and when to stop.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPolicy {
    pub order: Vec<String>,
    pub acceptance_threshold: f32,
    pub timeout: Duration,
}

impl ProviderPolicy {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            order: config.order.clone(),
            acceptance_threshold: config.acceptance_threshold,
            timeout: config.timeout(),
        }
    }
}

impl Default for ProviderPolicy {
    fn default() -> Self {
        Self::from_config(&ProviderConfig::default())
    }
}

/// How the final result was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// A provider cleared the acceptance threshold.
    Accepted,
    /// Nothing cleared the threshold; the best text-bearing attempt is returned.
    BestEffort,
    /// No attempt produced any text.
    Manual,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Accepted => "accepted",
            Disposition::BestEffort => "best_effort",
            Disposition::Manual => "manual",
        }
    }

    /// Whether the record built from this result must go to a human.
    pub fn requires_review(&self) -> bool {
        !matches!(self, Disposition::Accepted)
    }
}

/// Final result of one orchestrated recognition.
#[derive(Debug, Clone)]
pub struct Recognition {
    pub result: ProviderResult,
    pub disposition: Disposition,
    /// Every attempt made, in invocation order.
    pub attempts: Vec<ProviderResult>,
}

impl Recognition {
    fn manual(attempts: Vec<ProviderResult>) -> Self {
        Self {
            result: ProviderResult::manual(),
            disposition: Disposition::Manual,
            attempts,
        }
    }

    /// Provider id to put on the record: the accepted provider, else "manual".
    pub fn effective_provider_id(&self) -> &str {
        match self.disposition {
            Disposition::Accepted => &self.result.provider_id,
            Disposition::BestEffort | Disposition::Manual => MANUAL_PROVIDER_ID,
        }
    }
}

/// Runs recognition providers with fallback.
#[derive(Clone)]
pub struct Orchestrator {
    providers: Vec<Arc<dyn RecognitionProvider>>,
    sink: Arc<dyn AttemptSink>,
}

impl Orchestrator {
    /// Create an orchestrator over the given providers, logging attempts through `tracing`.
    pub fn new(providers: Vec<Arc<dyn RecognitionProvider>>) -> Self {
        Self {
            providers,
            sink: Arc::new(TracingSink),
        }
    }

    /// Replace the attempt sink.
    pub fn with_sink(mut self, sink: Arc<dyn AttemptSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Ids of the registered providers.
    pub fn provider_ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    fn provider(&self, id: &str) -> Option<&Arc<dyn RecognitionProvider>> {
        self.providers.iter().find(|p| p.id() == id)
    }

    /// Recognize text on `image` following `policy`. Never fails.
    pub async fn recognize(&self, image: &PreprocessedImage, policy: &ProviderPolicy) -> Recognition {
        if policy.order.is_empty() {
            debug!("Empty provider order, returning manual sentinel");
            return Recognition::manual(Vec::new());
        }

        let mut attempts: Vec<ProviderResult> = Vec::with_capacity(policy.order.len());
        let mut tried: HashSet<&str> = HashSet::new();

        for id in &policy.order {
            if !tried.insert(id.as_str()) {
                warn!(provider = %id, "Provider listed twice in order, skipping");
                continue;
            }

            let (attempt, outcome) = self.attempt(id, image, policy).await;
            self.sink.record(&attempt, &outcome);
            attempts.push(attempt);

            if outcome == AttemptOutcome::Accepted {
                let result = attempts[attempts.len() - 1].clone();
                return Recognition {
                    result,
                    disposition: Disposition::Accepted,
                    attempts,
                };
            }
        }

        // Highest confidence among attempts with text; earliest wins ties.
        let mut best: Option<&ProviderResult> = None;
        for attempt in attempts.iter().filter(|a| a.has_text()) {
            if best.is_none_or(|b| attempt.confidence > b.confidence) {
                best = Some(attempt);
            }
        }

        match best.cloned() {
            Some(result) => {
                info!(
                    provider = %result.provider_id,
                    confidence = result.confidence,
                    "No provider cleared the threshold, using best effort"
                );
                Recognition {
                    result,
                    disposition: Disposition::BestEffort,
                    attempts,
                }
            }
            None => {
                info!(attempts = attempts.len(), "No provider produced text, falling back to manual entry");
                Recognition::manual(attempts)
            }
        }
    }

    async fn attempt(
        &self,
        id: &str,
        image: &PreprocessedImage,
        policy: &ProviderPolicy,
    ) -> (ProviderResult, AttemptOutcome) {
        let Some(provider) = self.provider(id) else {
            let err = ProviderError::NotRegistered(id.to_string());
            return (ProviderResult::failure(id, 0), AttemptOutcome::Failed(err.to_string()));
        };

        let start = Instant::now();
        let outcome = tokio::time::timeout(policy.timeout, provider.recognize(image)).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(recognized)) => {
                let result = ProviderResult::success(id, recognized, elapsed_ms);
                let outcome = if result.confidence >= policy.acceptance_threshold {
                    AttemptOutcome::Accepted
                } else {
                    AttemptOutcome::BelowThreshold
                };
                (result, outcome)
            }
            Ok(Err(e)) if e.is_timeout() => (ProviderResult::failure(id, elapsed_ms), AttemptOutcome::TimedOut),
            Ok(Err(e)) => (
                ProviderResult::failure(id, elapsed_ms),
                AttemptOutcome::Failed(e.to_string()),
            ),
            Err(_) => {
                let err = ProviderError::Timeout {
                    provider: id.to_string(),
                    after_ms: policy.timeout.as_millis() as u64,
                };
                debug!("{}", err);
                (ProviderResult::failure(id, elapsed_ms), AttemptOutcome::TimedOut)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::observe::RecordingSink;
    use crate::ocr::{ManualProvider, Recognized};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Reply(&'static str, f32),
        Fail,
        Sleep(Duration),
    }

    struct StubProvider {
        id: &'static str,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl StubProvider {
        fn new(id: &'static str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                id,
                behavior,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecognitionProvider for StubProvider {
        fn id(&self) -> &str {
            self.id
        }

        async fn recognize(&self, _image: &PreprocessedImage) -> Result<Recognized, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Reply(text, confidence) => Ok(Recognized::new(*text, *confidence)),
                Behavior::Fail => Err(ProviderError::Invocation {
                    provider: self.id.to_string(),
                    message: "engine crashed".to_string(),
                }),
                Behavior::Sleep(duration) => {
                    tokio::time::sleep(*duration).await;
                    Ok(Recognized::new("late text", 0.99))
                }
            }
        }
    }

    fn image() -> PreprocessedImage {
        PreprocessedImage::processed(vec![0u8; 8], 1, 1)
    }

    fn policy(order: &[&str]) -> ProviderPolicy {
        ProviderPolicy {
            order: order.iter().map(|s| s.to_string()).collect(),
            acceptance_threshold: 0.3,
            timeout: Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn test_first_confident_provider_wins() {
        let vision = StubProvider::new("vision", Behavior::Reply("TOTAL Rp 10.000", 0.9));
        let local = StubProvider::new("local", Behavior::Reply("TOTAL", 0.8));
        let orchestrator = Orchestrator::new(vec![vision.clone(), local.clone()]);

        let recognition = orchestrator.recognize(&image(), &policy(&["vision", "local"])).await;

        assert_eq!(recognition.disposition, Disposition::Accepted);
        assert_eq!(recognition.result.provider_id, "vision");
        assert_eq!(recognition.result.raw_text, "TOTAL Rp 10.000");
        assert_eq!(recognition.effective_provider_id(), "vision");
        assert_eq!(vision.calls(), 1);
        assert_eq!(local.calls(), 0);
    }

    #[tokio::test]
    async fn test_falls_through_on_failure() {
        let vision = StubProvider::new("vision", Behavior::Fail);
        let local = StubProvider::new("local", Behavior::Reply("TOKO ABC", 0.6));
        let sink = Arc::new(RecordingSink::new());
        let orchestrator = Orchestrator::new(vec![vision, local]).with_sink(sink.clone());

        let recognition = orchestrator.recognize(&image(), &policy(&["vision", "local"])).await;

        assert_eq!(recognition.disposition, Disposition::Accepted);
        assert_eq!(recognition.result.provider_id, "local");
        assert_eq!(recognition.attempts.len(), 2);
        assert!(!recognition.attempts[0].succeeded);

        let recorded = sink.attempts();
        assert!(matches!(recorded[0].1, AttemptOutcome::Failed(ref m) if m.contains("engine crashed")));
        assert_eq!(recorded[1].1, AttemptOutcome::Accepted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_low_confidence_is_best_effort() {
        let vision = StubProvider::new("vision", Behavior::Sleep(Duration::from_secs(120)));
        let local = StubProvider::new("local", Behavior::Reply("TOTAL Rp 25.000", 0.1));
        let sink = Arc::new(RecordingSink::new());
        let orchestrator = Orchestrator::new(vec![vision.clone(), local.clone()]).with_sink(sink.clone());

        let recognition = orchestrator.recognize(&image(), &policy(&["vision", "local"])).await;

        assert_eq!(recognition.disposition, Disposition::BestEffort);
        assert_eq!(recognition.result.provider_id, "local");
        assert_eq!(recognition.result.raw_text, "TOTAL Rp 25.000");
        assert_eq!(recognition.effective_provider_id(), "manual");
        assert!(recognition.disposition.requires_review());

        let recorded = sink.attempts();
        assert_eq!(recorded[0].1, AttemptOutcome::TimedOut);
        assert_eq!(recorded[0].0.elapsed_ms, 30_000);
        assert_eq!(recorded[1].1, AttemptOutcome::BelowThreshold);
    }

    #[tokio::test]
    async fn test_empty_order_returns_sentinel() {
        let vision = StubProvider::new("vision", Behavior::Reply("TOTAL", 0.9));
        let orchestrator = Orchestrator::new(vec![vision.clone()]);

        let recognition = orchestrator.recognize(&image(), &policy(&[])).await;

        assert_eq!(recognition.disposition, Disposition::Manual);
        assert_eq!(recognition.result, ProviderResult::manual());
        assert!(recognition.attempts.is_empty());
        assert_eq!(vision.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_text_anywhere_returns_sentinel() {
        let vision = StubProvider::new("vision", Behavior::Fail);
        let orchestrator = Orchestrator::new(vec![vision, Arc::new(ManualProvider)]);

        let recognition = orchestrator
            .recognize(&image(), &policy(&["vision", "manual"]))
            .await;

        assert_eq!(recognition.disposition, Disposition::Manual);
        assert_eq!(recognition.result.provider_id, "manual");
        assert_eq!(recognition.result.confidence, 0.0);
        assert_eq!(recognition.attempts.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_and_unknown_ids() {
        let vision = StubProvider::new("vision", Behavior::Reply("x", 0.1));
        let orchestrator = Orchestrator::new(vec![vision.clone()]);

        let recognition = orchestrator
            .recognize(&image(), &policy(&["vision", "ghost", "vision"]))
            .await;

        assert_eq!(vision.calls(), 1);
        let ids: Vec<_> = recognition.attempts.iter().map(|a| a.provider_id.as_str()).collect();
        assert_eq!(ids, vec!["vision", "ghost"]);
        assert!(!recognition.attempts[1].succeeded);
    }

    #[tokio::test]
    async fn test_best_effort_prefers_highest_confidence() {
        let vision = StubProvider::new("vision", Behavior::Reply("blurry", 0.2));
        let local = StubProvider::new("local", Behavior::Reply("sharper", 0.25));
        let orchestrator = Orchestrator::new(vec![vision, local]);

        let recognition = orchestrator.recognize(&image(), &policy(&["vision", "local"])).await;

        assert_eq!(recognition.disposition, Disposition::BestEffort);
        assert_eq!(recognition.result.raw_text, "sharper");
    }
}
