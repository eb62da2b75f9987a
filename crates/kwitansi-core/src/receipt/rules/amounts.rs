//! Amount extraction for rupiah receipts.
//!
//! Every rule runs over the whole text and every match becomes a candidate.
//! The accepted amount is the largest candidate: the grand total is almost
//! always the biggest figure printed. A phone number or receipt id written with
//! a currency marker can still win; there is no attempt to second-guess that.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::patterns::{
    AMOUNT_CURRENCY_PREFIX, AMOUNT_CURRENCY_SUFFIX, AMOUNT_DOWN_PAYMENT, AMOUNT_FINAL,
    AMOUNT_GRAND_TOTAL, WHITESPACE,
};
use super::FieldExtractor;

/// Amount rules in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountRule {
    /// "grand total", "total bayar", "total" labels.
    GrandTotal,
    /// "jumlah" and other final-amount labels.
    FinalAmount,
    /// "dp", "uang muka" labels.
    DownPayment,
    /// `Rp 12.500`
    CurrencyPrefix,
    /// `12.500 rupiah`
    CurrencySuffix,
}

impl AmountRule {
    pub const ALL: [AmountRule; 5] = [
        AmountRule::GrandTotal,
        AmountRule::FinalAmount,
        AmountRule::DownPayment,
        AmountRule::CurrencyPrefix,
        AmountRule::CurrencySuffix,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            AmountRule::GrandTotal => "grand_total",
            AmountRule::FinalAmount => "final_amount",
            AmountRule::DownPayment => "down_payment",
            AmountRule::CurrencyPrefix => "currency_prefix",
            AmountRule::CurrencySuffix => "currency_suffix",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            AmountRule::GrandTotal => &AMOUNT_GRAND_TOTAL,
            AmountRule::FinalAmount => &AMOUNT_FINAL,
            AmountRule::DownPayment => &AMOUNT_DOWN_PAYMENT,
            AmountRule::CurrencyPrefix => &AMOUNT_CURRENCY_PREFIX,
            AmountRule::CurrencySuffix => &AMOUNT_CURRENCY_SUFFIX,
        }
    }
}

/// One number found by one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountCandidate {
    /// Whole rupiah.
    pub value: i64,
    pub rule: AmountRule,
    /// Byte range of the number in the whitespace-normalized text.
    pub span: (usize, usize),
}

/// Amount field extractor.
#[derive(Debug, Default, Clone, Copy)]
pub struct AmountExtractor;

impl AmountExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = AmountCandidate;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        select_amount(&self.extract_all(text)).cloned()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let normalized = normalize_whitespace(text);
        let mut candidates = Vec::new();

        for rule in AmountRule::ALL {
            for caps in rule.pattern().captures_iter(&normalized) {
                let Some(number) = caps.get(1) else {
                    continue;
                };
                if let Some(value) = parse_rupiah(number.as_str()) {
                    candidates.push(AmountCandidate {
                        value,
                        rule,
                        span: (number.start(), number.end()),
                    });
                }
            }
        }

        candidates
    }
}

/// The largest candidate; the earliest one on ties.
pub fn select_amount(candidates: &[AmountCandidate]) -> Option<&AmountCandidate> {
    let mut best: Option<&AmountCandidate> = None;
    for candidate in candidates {
        if best.is_none_or(|b| candidate.value > b.value) {
            best = Some(candidate);
        }
    }
    best
}

/// Extract the receipt total in whole rupiah.
pub fn extract_amount(text: &str) -> Option<i64> {
    AmountExtractor::new().extract(text).map(|c| c.value)
}

/// Parse a printed rupiah figure such as `71.500` or `71,500`.
///
/// Every `.` and `,` is stripped, so a decimal part stays in the value:
/// `65.50` is 6550 and `71.500,00` is 7150000.
pub fn parse_rupiah(s: &str) -> Option<i64> {
    let digits: String = s.trim().chars().filter(|c| *c != '.' && *c != ',').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Format whole rupiah the way receipts print it: `Rp 71.500`.
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    if amount < 0 {
        format!("-Rp {}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}

fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_total_beats_subtotal_and_tax() {
        let text = "TOTAL: Rp 71.500\nSubtotal: Rp 65.000\nPajak (10%): Rp 6.500";
        assert_eq!(extract_amount(text), Some(71_500));
    }

    #[test]
    fn test_candidates_carry_rule_and_span() {
        let text = "TOTAL: Rp 71.500\nSubtotal: Rp 65.000";
        let candidates = AmountExtractor::new().extract_all(text);

        let normalized = normalize_whitespace(text);
        let total = &candidates[0];
        assert_eq!(total.rule, AmountRule::GrandTotal);
        assert_eq!(&normalized[total.span.0..total.span.1], "71.500");

        let rules: Vec<_> = candidates.iter().map(|c| (c.rule, c.value)).collect();
        assert_eq!(
            rules,
            vec![
                (AmountRule::GrandTotal, 71_500),
                (AmountRule::CurrencyPrefix, 71_500),
                (AmountRule::CurrencyPrefix, 65_000),
            ]
        );
    }

    #[test]
    fn test_label_and_number_across_lines() {
        assert_eq!(extract_amount("JUMLAH\n  125.000"), Some(125_000));
        assert_eq!(extract_amount("Uang Muka: 50.000"), Some(50_000));
        assert_eq!(extract_amount("Bayar 80.000 rupiah"), Some(80_000));
    }

    #[test]
    fn test_no_amount() {
        assert_eq!(extract_amount("Terima kasih atas kunjungan Anda"), None);
        assert_eq!(extract_amount(""), None);
    }

    #[test]
    fn test_largest_amount_wins_even_if_not_total() {
        // Known limitation: a larger figure with a currency marker wins.
        let text = "TOTAL Rp 20.000\nTunai Rp 50.000\nKembali Rp 30.000";
        assert_eq!(extract_amount(text), Some(50_000));
    }

    #[test]
    fn test_parse_rupiah() {
        assert_eq!(parse_rupiah("71.500"), Some(71_500));
        assert_eq!(parse_rupiah("71,500"), Some(71_500));
        assert_eq!(parse_rupiah("71.500,00"), Some(7_150_000));
        assert_eq!(parse_rupiah("65.50"), Some(6_550));
        assert_eq!(parse_rupiah("1.250.000"), Some(1_250_000));
        assert_eq!(parse_rupiah("7"), Some(7));
        assert_eq!(parse_rupiah("99999999999999999999999"), None);
    }

    #[test]
    fn test_decimal_separators_are_stripped_not_dropped() {
        assert_eq!(extract_amount("TOTAL Rp 65.50"), Some(6_550));
        assert_eq!(extract_amount("TOTAL Rp 71.500,00"), Some(7_150_000));
    }

    #[test]
    fn test_format_rupiah() {
        assert_eq!(format_rupiah(71_500), "Rp 71.500");
        assert_eq!(format_rupiah(1_250_000), "Rp 1.250.000");
        assert_eq!(format_rupiah(500), "Rp 500");
    }
}
