//! Merchant name extraction from the receipt header.

use regex::{Regex, RegexBuilder};

use super::patterns::{CAPITALIZED_LINE, GENERIC_LINE};
use super::FieldExtractor;
use crate::error::ConfigError;
use crate::models::config::ExtractionConfig;

/// Shortest accepted merchant name, in characters.
const MIN_NAME_CHARS: usize = 3;

/// Line shapes tried against every header line, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MerchantRule {
    /// Line starts with a business prefix such as "PT" or "WARUNG".
    BusinessPrefix,
    /// Line starts with a capital letter and holds no unusual symbols.
    Capitalized,
    /// Any 3 - 30 character line.
    Generic,
}

/// A merchant line accepted by one of the rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantMatch {
    pub name: String,
    pub rule: MerchantRule,
    /// Zero-based index among the non-empty lines.
    pub line: usize,
}

/// Scans the first lines of a receipt for the merchant name.
#[derive(Debug, Clone)]
pub struct MerchantExtractor {
    scan_lines: usize,
    require_letter: bool,
    business_prefix: Option<Regex>,
    exclusions: Vec<String>,
}

impl MerchantExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            scan_lines: config.merchant_scan_lines,
            require_letter: config.merchant_require_letter,
            business_prefix: build_prefix_pattern(&config.business_prefixes)?,
            exclusions: config
                .merchant_exclusions
                .iter()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        })
    }

    fn matching_rule(&self, line: &str) -> Option<MerchantRule> {
        if self.business_prefix.as_ref().is_some_and(|p| p.is_match(line)) {
            Some(MerchantRule::BusinessPrefix)
        } else if CAPITALIZED_LINE.is_match(line) {
            Some(MerchantRule::Capitalized)
        } else if GENERIC_LINE.is_match(line) {
            Some(MerchantRule::Generic)
        } else {
            None
        }
    }

    fn is_acceptable(&self, line: &str) -> bool {
        if line.chars().count() < MIN_NAME_CHARS {
            return false;
        }
        if self.require_letter && !line.chars().any(char::is_alphabetic) {
            return false;
        }
        let lower = line.to_lowercase();
        !self.exclusions.iter().any(|e| lower.contains(e.as_str()))
    }

    fn header_lines<'a>(&self, text: &'a str) -> impl Iterator<Item = &'a str> {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(self.scan_lines)
    }
}

impl FieldExtractor for MerchantExtractor {
    type Output = MerchantMatch;

    /// The first acceptable header line. Scanning stops there.
    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        self.header_lines(text)
            .enumerate()
            .filter_map(|(index, line)| {
                let rule = self.matching_rule(line)?;
                self.is_acceptable(line).then(|| MerchantMatch {
                    name: line.to_string(),
                    rule,
                    line: index,
                })
            })
            .collect()
    }
}

/// `^(?:RUMAH MAKAN|WARUNG|...)\b`, longest prefix first. `None` for an empty table.
fn build_prefix_pattern(prefixes: &[String]) -> Result<Option<Regex>, ConfigError> {
    let mut escaped: Vec<String> = prefixes
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| regex::escape(p).replace(' ', r"\s+"))
        .collect();
    if escaped.is_empty() {
        return Ok(None);
    }
    escaped.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let pattern = format!(r"^(?:{})\b\.?\s*\S", escaped.join("|"));
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| ConfigError::InvalidEntry {
            table: "business_prefixes".to_string(),
            reason: e.to_string(),
        })
}
