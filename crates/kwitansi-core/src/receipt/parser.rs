//! Structured extraction from recognized receipt text.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rules::{
    select_amount, AmountCandidate, AmountExtractor, CategoryMatcher, DateExtractor,
    FieldExtractor, MerchantExtractor,
};
use crate::error::ConfigError;
use crate::models::config::ExtractionConfig;
use crate::models::receipt::ExtractionFactors;

/// Receipt fields recovered from text, before scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub amount: Option<i64>,
    pub merchant_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub category: String,
}

/// Fields, factors and the amount candidates behind them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub fields: ExtractedFields,
    pub factors: ExtractionFactors,
    pub amount_candidates: Vec<AmountCandidate>,
}

/// Pure text-to-fields extractor. Holds only compiled rules.
#[derive(Debug, Clone)]
pub struct ReceiptParser {
    amounts: AmountExtractor,
    merchant: MerchantExtractor,
    dates: DateExtractor,
    category: CategoryMatcher,
}

impl ReceiptParser {
    pub fn new(config: &ExtractionConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            amounts: AmountExtractor::new(),
            merchant: MerchantExtractor::new(config)?,
            dates: DateExtractor::new(&config.months)?,
            category: CategoryMatcher::from_config(config),
        })
    }

    /// Extract fields and the factors that describe which were found.
    pub fn extract(&self, text: &str) -> (ExtractedFields, ExtractionFactors) {
        let extraction = self.analyze(text);
        (extraction.fields, extraction.factors)
    }

    /// Like [`extract`](Self::extract), keeping every amount candidate.
    pub fn analyze(&self, text: &str) -> Extraction {
        let amount_candidates = self.amounts.extract_all(text);
        let amount = select_amount(&amount_candidates).map(|c| c.value);

        let merchant_name = self.merchant.extract(text).map(|m| m.name);
        let date = self.dates.extract(text).map(|d| d.date);
        let category = self.category.categorize(text);

        let factors = ExtractionFactors {
            has_amount: amount.is_some(),
            has_merchant: merchant_name.is_some(),
            has_date: date.is_some(),
            has_category: category.is_matched(),
        };

        debug!(
            amount = ?amount,
            merchant = ?merchant_name,
            date = ?date,
            category = %category.label,
            candidates = amount_candidates.len(),
            "Extracted receipt fields"
        );

        Extraction {
            fields: ExtractedFields {
                amount,
                merchant_name,
                date,
                category: category.label,
            },
            factors,
            amount_candidates,
        }
    }
}
