//! Per-attempt observation hooks for the orchestrator.

use std::sync::Mutex;

use tracing::{info, warn};

use super::ProviderResult;

/// How the orchestrator judged one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// Confidence met the acceptance threshold; the chain stops here.
    Accepted,
    /// The provider answered but below the threshold.
    BelowThreshold,
    /// The provider returned an error.
    Failed(String),
    /// The attempt exceeded the per-attempt timeout.
    TimedOut,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Accepted => "accepted",
            AttemptOutcome::BelowThreshold => "below_threshold",
            AttemptOutcome::Failed(_) => "failed",
            AttemptOutcome::TimedOut => "timed_out",
        }
    }
}

/// Receives every attempt the orchestrator makes, in order.
pub trait AttemptSink: Send + Sync {
    fn record(&self, attempt: &ProviderResult, outcome: &AttemptOutcome);
}

/// Emits one structured log event per attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AttemptSink for TracingSink {
    fn record(&self, attempt: &ProviderResult, outcome: &AttemptOutcome) {
        match outcome {
            AttemptOutcome::Accepted | AttemptOutcome::BelowThreshold => info!(
                provider = %attempt.provider_id,
                elapsed_ms = attempt.elapsed_ms,
                confidence = attempt.confidence,
                outcome = outcome.as_str(),
                "OCR attempt"
            ),
            AttemptOutcome::Failed(reason) => warn!(
                provider = %attempt.provider_id,
                elapsed_ms = attempt.elapsed_ms,
                outcome = outcome.as_str(),
                reason = %reason,
                "OCR attempt"
            ),
            AttemptOutcome::TimedOut => warn!(
                provider = %attempt.provider_id,
                elapsed_ms = attempt.elapsed_ms,
                outcome = outcome.as_str(),
                "OCR attempt"
            ),
        }
    }
}

/// Keeps every attempt in memory. Used by reports and tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    attempts: Mutex<Vec<(ProviderResult, AttemptOutcome)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded attempts.
    pub fn attempts(&self) -> Vec<(ProviderResult, AttemptOutcome)> {
        match self.attempts.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Provider ids in the order they were tried.
    pub fn provider_ids(&self) -> Vec<String> {
        self.attempts()
            .into_iter()
            .map(|(attempt, _)| attempt.provider_id)
            .collect()
    }
}

impl AttemptSink for RecordingSink {
    fn record(&self, attempt: &ProviderResult, outcome: &AttemptOutcome) {
        let mut guard = match self.attempts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push((attempt.clone(), outcome.clone()));
    }
}
