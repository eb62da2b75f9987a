//! End-to-end receipt extraction: image bytes in, ledger record out.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::config::KwitansiConfig;
use crate::models::receipt::{RawImage, ReceiptRecord};
use crate::ocr::{
    AttemptSink, Disposition, ImagePreprocessor, ManualProvider, Orchestrator, ProviderPolicy,
    ProviderResult, RecognitionProvider, VisionProvider,
};
use crate::receipt::{AmountCandidate, ConfidenceScorer, ReceiptParser};

/// Record plus everything that went into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptReport {
    pub record: ReceiptRecord,
    pub disposition: Disposition,
    /// Every provider attempt, in invocation order.
    pub attempts: Vec<ProviderResult>,
    /// Text the fields were extracted from.
    pub raw_text: String,
    pub amount_candidates: Vec<AmountCandidate>,
    /// False when preprocessing fell back to the original image.
    pub preprocessed: bool,
    pub needs_review: bool,
}

/// Stateless receipt pipeline. Safe to share between concurrent runs.
#[derive(Clone)]
pub struct ReceiptPipeline {
    preprocessor: ImagePreprocessor,
    orchestrator: Orchestrator,
    policy: ProviderPolicy,
    parser: ReceiptParser,
    scorer: ConfidenceScorer,
    review_threshold: f32,
}

impl ReceiptPipeline {
    /// Build a pipeline with the providers the configuration describes.
    ///
    /// The vision provider is registered only when a host is configured, the
    /// local provider only with the `native` feature. The manual provider is
    /// always available.
    pub fn new(config: &KwitansiConfig) -> Result<Self> {
        Self::with_providers(config, default_providers(config))
    }

    /// Build a pipeline over an explicit provider set.
    pub fn with_providers(
        config: &KwitansiConfig,
        providers: Vec<Arc<dyn RecognitionProvider>>,
    ) -> Result<Self> {
        config.validate()?;

        let orchestrator = Orchestrator::new(providers);
        debug!(providers = ?orchestrator.provider_ids(), "Receipt pipeline ready");

        Ok(Self {
            preprocessor: ImagePreprocessor::from_config(&config.preprocess),
            orchestrator,
            policy: ProviderPolicy::from_config(&config.providers),
            parser: ReceiptParser::new(&config.extraction)?,
            scorer: ConfidenceScorer::new(&config.scoring),
            review_threshold: config.scoring.review_threshold,
        })
    }

    /// Route attempt records to `sink` instead of the log.
    pub fn with_sink(mut self, sink: Arc<dyn AttemptSink>) -> Self {
        self.orchestrator = self.orchestrator.with_sink(sink);
        self
    }

    pub fn review_threshold(&self) -> f32 {
        self.review_threshold
    }

    /// Turn receipt image bytes into a ledger record.
    ///
    /// Fails only for a mime type other than JPEG or PNG. Every other problem
    /// shows up as missing fields, a low score or `ocr_provider_id == "manual"`.
    pub async fn extract_receipt(&self, bytes: &[u8], mime: &str) -> Result<ReceiptRecord> {
        Ok(self.extract_report(bytes, mime).await?.record)
    }

    /// Like [`extract_receipt`](Self::extract_receipt), with diagnostics.
    pub async fn extract_report(&self, bytes: &[u8], mime: &str) -> Result<ReceiptReport> {
        let raw = RawImage::new(bytes, mime)?;
        let image = self.preprocessor.preprocess(&raw);

        let recognition = self.orchestrator.recognize(&image, &self.policy).await;
        let provider_id = recognition.effective_provider_id().to_string();

        let extraction = self.parser.analyze(&recognition.result.raw_text);
        let confidence_score = self.scorer.score(&extraction.factors);

        let record = ReceiptRecord {
            amount: extraction.fields.amount,
            merchant_name: extraction.fields.merchant_name,
            date: extraction.fields.date,
            category: extraction.fields.category,
            confidence_score,
            ocr_provider_id: provider_id,
        };

        info!(
            provider = %record.ocr_provider_id,
            disposition = recognition.disposition.as_str(),
            confidence_score = record.confidence_score,
            "Receipt extracted"
        );

        Ok(ReceiptReport {
            needs_review: record.needs_review(self.review_threshold),
            record,
            disposition: recognition.disposition,
            attempts: recognition.attempts,
            raw_text: recognition.result.raw_text,
            amount_candidates: extraction.amount_candidates,
            preprocessed: image.is_processed(),
        })
    }

    /// Build a record from already-recognized text, skipping OCR.
    pub fn record_from_text(&self, text: &str, provider_id: &str) -> ReceiptRecord {
        let (fields, factors) = self.parser.extract(text);
        ReceiptRecord {
            amount: fields.amount,
            merchant_name: fields.merchant_name,
            date: fields.date,
            category: fields.category,
            confidence_score: self.scorer.score(&factors),
            ocr_provider_id: provider_id.to_string(),
        }
    }
}

/// Providers available for a configuration, in registration order.
pub fn default_providers(config: &KwitansiConfig) -> Vec<Arc<dyn RecognitionProvider>> {
    let mut providers: Vec<Arc<dyn RecognitionProvider>> = Vec::new();

    if let Some(vision) = VisionProvider::from_config(&config.providers.vision) {
        providers.push(Arc::new(vision));
    }

    #[cfg(feature = "native")]
    providers.push(Arc::new(crate::ocr::LocalOcrProvider::new(
        config.providers.local.clone(),
    )));

    providers.push(Arc::new(ManualProvider));
    providers
}
