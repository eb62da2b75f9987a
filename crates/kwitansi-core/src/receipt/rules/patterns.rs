//! Fixed regex patterns for Indonesian receipt extraction.
//!
//! Patterns that depend on configurable tables (business prefixes, month
//! names) are compiled by their extractors instead.

use lazy_static::lazy_static;
use regex::Regex;

/// A rupiah figure: digits with optional `.`/`,` grouping, e.g. `71.500` or `71.500,00`.
const NUMBER: &str = r"(\d[\d.,]*\d|\d)";

/// Optional currency marker between a label and its number.
const CURRENCY: &str = r"(?:rp\.?|idr)?";

lazy_static! {
    pub static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();

    // Amount rules, in priority order
    pub static ref AMOUNT_GRAND_TOTAL: Regex = Regex::new(&format!(
        r"(?i)\b(?:grand\s*total|total\s+bayar|total\s+belanja|total\s+harga|total)\s*[:=]?\s*{CURRENCY}\s*{NUMBER}"
    )).unwrap();

    pub static ref AMOUNT_FINAL: Regex = Regex::new(&format!(
        r"(?i)\b(?:jumlah(?:\s+bayar|\s+tagihan)?|total\s+akhir|harus\s+dibayar|tagihan)\s*[:=]?\s*{CURRENCY}\s*{NUMBER}"
    )).unwrap();

    pub static ref AMOUNT_DOWN_PAYMENT: Regex = Regex::new(&format!(
        r"(?i)\b(?:dp|down\s*payment|uang\s+muka)\s*[:=]?\s*{CURRENCY}\s*{NUMBER}"
    )).unwrap();

    pub static ref AMOUNT_CURRENCY_PREFIX: Regex = Regex::new(&format!(
        r"(?i)\b(?:rp\.?|idr)\s*{NUMBER}"
    )).unwrap();

    pub static ref AMOUNT_CURRENCY_SUFFIX: Regex = Regex::new(&format!(
        r"(?i){NUMBER}\s*(?:rupiah|idr)\b"
    )).unwrap();

    // Date rules, in priority order
    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b"
    ).unwrap();

    pub static ref DATE_YMD: Regex = Regex::new(
        r"\b(\d{4})[/-](\d{1,2})[/-](\d{1,2})\b"
    ).unwrap();

    // Merchant line shapes
    pub static ref CAPITALIZED_LINE: Regex = Regex::new(
        r"^[A-Z][A-Za-z0-9&.,'()/\- ]{2,}$"
    ).unwrap();

    pub static ref GENERIC_LINE: Regex = Regex::new(r"^.{3,30}$").unwrap();
}
