//! Receipt field extraction and confidence scoring.

mod parser;
pub mod rules;
pub mod scoring;

pub use parser::{ExtractedFields, Extraction, ReceiptParser};
pub use rules::{AmountCandidate, AmountRule, FieldExtractor};
pub use scoring::{score, ConfidenceScorer};
