//! Transaction date extraction.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use regex::{Captures, Regex, RegexBuilder};

use super::patterns::{DATE_DMY, DATE_YMD};
use super::FieldExtractor;
use crate::error::ConfigError;

/// Date rules in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRule {
    /// `20/01/2026`, `20-01-2026`
    DayMonthYear,
    /// `2026/01/20`, `2026-01-20`
    YearMonthDay,
    /// `20 Januari 2026`, `20 Jan 2026`
    MonthName,
}

/// A calendar date found in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMatch {
    pub date: NaiveDate,
    pub rule: DateRule,
    /// Byte range of the match in the input text.
    pub span: (usize, usize),
}

/// Date field extractor with a configurable month-name table.
#[derive(Debug, Clone)]
pub struct DateExtractor {
    months: BTreeMap<String, u32>,
    month_name: Option<Regex>,
}

impl DateExtractor {
    pub fn new(months: &BTreeMap<String, u32>) -> Result<Self, ConfigError> {
        let months: BTreeMap<String, u32> = months
            .iter()
            .map(|(name, number)| (name.trim().to_lowercase(), *number))
            .filter(|(name, _)| !name.is_empty())
            .collect();

        Ok(Self {
            month_name: build_month_pattern(&months)?,
            months,
        })
    }

    fn rule_matches(&self, rule: DateRule, text: &str) -> Vec<DateMatch> {
        let pattern = match rule {
            DateRule::DayMonthYear => &*DATE_DMY,
            DateRule::YearMonthDay => &*DATE_YMD,
            DateRule::MonthName => match &self.month_name {
                Some(pattern) => pattern,
                None => return Vec::new(),
            },
        };

        pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let date = self.to_date(rule, &caps)?;
                let whole = caps.get(0)?;
                Some(DateMatch {
                    date,
                    rule,
                    span: (whole.start(), whole.end()),
                })
            })
            .collect()
    }

    /// Build a date from captures. `None` for impossible dates such as 31/02.
    fn to_date(&self, rule: DateRule, caps: &Captures<'_>) -> Option<NaiveDate> {
        let (year, month, day) = match rule {
            DateRule::DayMonthYear => (
                caps[3].parse::<i32>().ok()?,
                caps[2].parse::<u32>().ok()?,
                caps[1].parse::<u32>().ok()?,
            ),
            DateRule::YearMonthDay => (
                caps[1].parse::<i32>().ok()?,
                caps[2].parse::<u32>().ok()?,
                caps[3].parse::<u32>().ok()?,
            ),
            DateRule::MonthName => (
                caps[3].parse::<i32>().ok()?,
                *self.months.get(&caps[2].to_lowercase())?,
                caps[1].parse::<u32>().ok()?,
            ),
        };
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

impl FieldExtractor for DateExtractor {
    type Output = DateMatch;

    /// The first valid match of the first rule that yields one.
    fn extract(&self, text: &str) -> Option<Self::Output> {
        [DateRule::DayMonthYear, DateRule::YearMonthDay, DateRule::MonthName]
            .into_iter()
            .find_map(|rule| self.rule_matches(rule, text).into_iter().next())
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        [DateRule::DayMonthYear, DateRule::YearMonthDay, DateRule::MonthName]
            .into_iter()
            .flat_map(|rule| self.rule_matches(rule, text))
            .collect()
    }
}

/// `\b(\d{1,2})\s*(januari|jan|...)\.?\s*(\d{4})\b`, longest names first.
fn build_month_pattern(months: &BTreeMap<String, u32>) -> Result<Option<Regex>, ConfigError> {
    let mut names: Vec<&str> = months.keys().map(String::as_str).collect();
    if names.is_empty() {
        return Ok(None);
    }
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let alternation = names
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"\b(\d{{1,2}})[\s\-]*({})\b\.?[\s\-,]*(\d{{4}})\b", alternation);

    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| ConfigError::InvalidEntry {
            table: "months".to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::ExtractionConfig;
    use pretty_assertions::assert_eq;

    fn extractor() -> DateExtractor {
        DateExtractor::new(&ExtractionConfig::default().months).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_extract_date_dmy() {
        let found = extractor().extract("Tgl: 20/01/2026 14:33").unwrap();
        assert_eq!(found.date, ymd(2026, 1, 20));
        assert_eq!(found.rule, DateRule::DayMonthYear);
        assert_eq!(found.date.format("%Y-%m-%d").to_string(), "2026-01-20");
    }

    #[test]
    fn test_extract_date_ymd() {
        let found = extractor().extract("2026-03-05 09:12").unwrap();
        assert_eq!(found.date, ymd(2026, 3, 5));
        assert_eq!(found.rule, DateRule::YearMonthDay);
    }

    #[test]
    fn test_extract_month_names() {
        let extractor = extractor();
        assert_eq!(extractor.extract("Jakarta, 17 Agustus 2025").unwrap().date, ymd(2025, 8, 17));
        assert_eq!(extractor.extract("3 Des. 2025").unwrap().date, ymd(2025, 12, 3));
        assert_eq!(extractor.extract("1-MEI-2026").unwrap().date, ymd(2026, 5, 1));
    }

    #[test]
    fn test_rule_order_wins_over_position() {
        let found = extractor().extract("1 Maret 2026 ... 15/02/2026").unwrap();
        assert_eq!(found.date, ymd(2026, 2, 15));
    }

    #[test]
    fn test_invalid_dates_are_skipped() {
        let found = extractor().extract("31/02/2026 lalu 28/02/2026").unwrap();
        assert_eq!(found.date, ymd(2026, 2, 28));

        assert_eq!(extractor().extract("99/99/2026"), None);
    }

    #[test]
    fn test_no_date() {
        assert_eq!(extractor().extract("TOTAL Rp 10.000"), None);
    }

    #[test]
    fn test_empty_month_table_disables_rule() {
        let extractor = DateExtractor::new(&BTreeMap::new()).unwrap();
        assert_eq!(extractor.extract("17 Agustus 2025"), None);
        assert!(extractor.extract("17/08/2025").is_some());
    }
}
