//! Confidence scoring over extraction completeness.

use crate::models::config::ScoringConfig;
use crate::models::receipt::ExtractionFactors;

/// Weighted completeness score. Depends on the factors alone, never on OCR confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceScorer {
    amount: f32,
    merchant: f32,
    date: f32,
    category: f32,
}

impl ConfidenceScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            amount: config.amount_weight,
            merchant: config.merchant_weight,
            date: config.date_weight,
            category: config.category_weight,
        }
    }

    /// Score in [0, 1].
    pub fn score(&self, factors: &ExtractionFactors) -> f32 {
        let weight = |present: bool, w: f32| if present { w } else { 0.0 };

        let total = weight(factors.has_amount, self.amount)
            + weight(factors.has_merchant, self.merchant)
            + weight(factors.has_date, self.date)
            + weight(factors.has_category, self.category);

        total.clamp(0.0, 1.0)
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

/// Score with the default weights (0.40 / 0.25 / 0.20 / 0.15).
pub fn score(factors: &ExtractionFactors) -> f32 {
    ConfidenceScorer::default().score(factors)
}
