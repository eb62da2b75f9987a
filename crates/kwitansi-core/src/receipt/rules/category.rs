//! Expense category lookup by keyword.

use crate::models::config::{CategoryRule, ExtractionConfig};

/// Category chosen for a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMatch {
    pub label: String,
    /// The keyword that selected the category, `None` for the default.
    pub keyword: Option<String>,
}

impl CategoryMatch {
    /// Whether a table entry matched, as opposed to the default category.
    pub fn is_matched(&self) -> bool {
        self.keyword.is_some()
    }
}

/// Ordered keyword table. The first category with a hit wins.
#[derive(Debug, Clone)]
pub struct CategoryMatcher {
    rules: Vec<CategoryRule>,
    default_label: String,
}

impl CategoryMatcher {
    pub fn new(rules: &[CategoryRule], default_label: &str) -> Self {
        let rules = rules
            .iter()
            .map(|rule| CategoryRule {
                label: rule.label.clone(),
                keywords: rule
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
            .collect();

        Self {
            rules,
            default_label: default_label.to_string(),
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(&config.categories, &config.default_category)
    }

    /// Categorize by case-insensitive substring match.
    pub fn categorize(&self, text: &str) -> CategoryMatch {
        let lower = text.to_lowercase();

        for rule in &self.rules {
            if let Some(keyword) = rule.keywords.iter().find(|k| lower.contains(k.as_str())) {
                return CategoryMatch {
                    label: rule.label.clone(),
                    keyword: Some(keyword.clone()),
                };
            }
        }

        CategoryMatch {
            label: self.default_label.clone(),
            keyword: None,
        }
    }

    pub fn default_label(&self) -> &str {
        &self.default_label
    }
}
