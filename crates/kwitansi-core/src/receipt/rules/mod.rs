//! Rule-based field extractors for Indonesian receipts.

pub mod amounts;
pub mod category;
pub mod dates;
pub mod merchant;
pub mod patterns;

pub use amounts::{
    extract_amount, format_rupiah, parse_rupiah, select_amount, AmountCandidate, AmountExtractor,
    AmountRule,
};
pub use category::{CategoryMatch, CategoryMatcher};
pub use dates::{DateExtractor, DateMatch, DateRule};
pub use merchant::{MerchantExtractor, MerchantMatch, MerchantRule};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the accepted value for the field.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract every candidate, in rule order.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}
