//! Configuration structures for the receipt pipeline.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Provider identifiers known to the pipeline.
pub const VISION_PROVIDER_ID: &str = "vision";
pub const LOCAL_PROVIDER_ID: &str = "local";
pub const MANUAL_PROVIDER_ID: &str = "manual";

/// Main configuration for the kwitansi pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KwitansiConfig {
    /// Image preprocessing configuration.
    pub preprocess: PreprocessConfig,

    /// Recognition provider configuration.
    pub providers: ProviderConfig,

    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Confidence scoring configuration.
    pub scoring: ScoringConfig,
}

/// Image preprocessing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Longer image side is downscaled to this many pixels.
    pub max_dimension: u32,

    /// Luminance at or above this becomes white (0 - 255).
    pub binarize_threshold: u8,

    /// Gaussian sigma of the unsharp mask.
    pub sharpen_sigma: f32,

    /// Minimum luminance difference the unsharp mask acts on.
    pub sharpen_threshold: i32,

    /// Percent of darkest and brightest pixels ignored when stretching contrast.
    pub contrast_clip_percent: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1200,
            binarize_threshold: 180,
            sharpen_sigma: 1.0,
            sharpen_threshold: 2,
            contrast_clip_percent: 1.0,
        }
    }
}

/// Recognition provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Providers tried in this order.
    pub order: Vec<String>,

    /// Minimum self-reported confidence for early acceptance (0.0 - 1.0).
    pub acceptance_threshold: f32,

    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,

    /// Networked vision-language provider.
    pub vision: VisionConfig,

    /// Local ONNX OCR provider.
    pub local: LocalOcrConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            order: vec![
                VISION_PROVIDER_ID.to_string(),
                LOCAL_PROVIDER_ID.to_string(),
                MANUAL_PROVIDER_ID.to_string(),
            ],
            acceptance_threshold: 0.3,
            timeout_secs: 30,
            vision: VisionConfig::default(),
            local: LocalOcrConfig::default(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Vision-language provider settings (Ollama-compatible `/api/generate`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Base URL of the server. The provider is skipped when unset.
    pub host: Option<String>,

    /// Vision model name.
    pub model: String,

    /// Bearer token, if the server requires one.
    pub api_key: Option<String>,

    /// Replaces the built-in transcription prompt.
    pub prompt: Option<String>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            host: None,
            model: "llama3.2-vision".to_string(),
            api_key: None,
            prompt: None,
        }
    }
}

/// Local OCR model files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalOcrConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,
}

impl Default for LocalOcrConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
        }
    }
}

impl LocalOcrConfig {
    pub fn detection_path(&self) -> PathBuf {
        self.model_dir.join(&self.detection_model)
    }

    pub fn recognition_path(&self) -> PathBuf {
        self.model_dir.join(&self.recognition_model)
    }

    pub fn dictionary_path(&self) -> PathBuf {
        self.model_dir.join(&self.dictionary)
    }

    /// Whether all three model files are present.
    pub fn is_available(&self) -> bool {
        self.detection_path().exists()
            && self.recognition_path().exists()
            && self.dictionary_path().exists()
    }
}

/// One row of the category keyword table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub label: String,
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new(label: &str, keywords: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// How many leading non-empty lines are scanned for the merchant name.
    pub merchant_scan_lines: usize,

    /// Shop-type and legal-entity prefixes that introduce a merchant name.
    pub business_prefixes: Vec<String>,

    /// Lines containing any of these (case-insensitive) are never a merchant.
    pub merchant_exclusions: Vec<String>,

    /// Also reject merchant lines without a single letter, e.g. `20/01/2026`.
    pub merchant_require_letter: bool,

    /// Ordered category table; the first category with a keyword hit wins.
    pub categories: Vec<CategoryRule>,

    /// Category used when no keyword matches.
    pub default_category: String,

    /// Full and abbreviated month names mapped to month numbers.
    pub months: BTreeMap<String, u32>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            merchant_scan_lines: 5,
            business_prefixes: [
                "PT", "CV", "UD", "TB", "TOKO", "WARUNG", "WARTEG", "RM", "RUMAH MAKAN", "KEDAI",
                "DEPOT", "CAFE", "KAFE", "RESTO", "RESTORAN", "BAKERY", "APOTEK", "APOTIK",
                "BENGKEL", "MINIMARKET", "SUPERMARKET", "HOTEL", "SPBU",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            merchant_exclusions: [
                "receipt", "invoice", "date", "total", "cashier", "thank you", "struk", "nota",
                "kwitansi", "faktur", "tanggal", "kasir", "terima kasih", "subtotal", "jumlah",
                "tunai", "kembali", "telp", "npwp",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            merchant_require_letter: false,
            categories: default_categories(),
            default_category: "Other".to_string(),
            months: default_months(),
        }
    }
}

fn default_categories() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new(
            "Konsumsi",
            &[
                "nasi", "makan", "minum", "kopi susu", "coffee", "ayam", "bakso", "soto", "sate", "mie",
                "roti", "snack", "restoran", "resto", "warung", "warteg", "kedai", "cafe",
                "catering", "katering", "es teh", "jus",
            ],
        ),
        CategoryRule::new(
            "Transportasi",
            &[
                "bensin", "pertalite", "pertamax", "solar", "spbu", "bbm", "parkir", "e-toll",
                "jalan tol", "gojek", "grab", "taksi", "taxi", "ojek", "kereta", "tiket",
                "travel",
            ],
        ),
        CategoryRule::new(
            "Akomodasi",
            &["hotel", "penginapan", "homestay", "guest house", "losmen", "kamar"],
        ),
        CategoryRule::new(
            "ATK",
            &[
                "kertas", "pulpen", "tinta", "printer", "fotokopi", "atk", "amplop",
                "stapler", "buku tulis", "map plastik",
            ],
        ),
        CategoryRule::new(
            "Utilitas",
            &["listrik", "pln", "pdam", "internet", "wifi", "pulsa", "telepon", "indihome"],
        ),
        CategoryRule::new(
            "Kesehatan",
            &["apotek", "apotik", "obat", "klinik", "dokter", "rumah sakit", "vitamin"],
        ),
        CategoryRule::new(
            "Pemeliharaan",
            &["bengkel", "servis", "ganti oli", "sparepart", "cat tembok"],
        ),
    ]
}

fn default_months() -> BTreeMap<String, u32> {
    let table: [(&str, u32); 25] = [
        ("januari", 1),
        ("jan", 1),
        ("februari", 2),
        ("feb", 2),
        ("pebruari", 2),
        ("maret", 3),
        ("mar", 3),
        ("april", 4),
        ("apr", 4),
        ("mei", 5),
        ("juni", 6),
        ("jun", 6),
        ("juli", 7),
        ("jul", 7),
        ("agustus", 8),
        ("agu", 8),
        ("agt", 8),
        ("september", 9),
        ("sep", 9),
        ("oktober", 10),
        ("okt", 10),
        ("november", 11),
        ("nov", 11),
        ("desember", 12),
        ("des", 12),
    ];
    table
        .iter()
        .map(|(name, month)| (name.to_string(), *month))
        .collect()
}

/// Confidence scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub amount_weight: f32,
    pub merchant_weight: f32,
    pub date_weight: f32,
    pub category_weight: f32,

    /// Records scoring below this need human verification.
    pub review_threshold: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            amount_weight: 0.40,
            merchant_weight: 0.25,
            date_weight: 0.20,
            category_weight: 0.15,
            review_threshold: 0.7,
        }
    }
}

impl KwitansiConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Check value ranges and table shapes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preprocess.max_dimension == 0 {
            return Err(out_of_range("preprocess.max_dimension", self.preprocess.max_dimension));
        }
        if !(0.0..50.0).contains(&self.preprocess.contrast_clip_percent) {
            return Err(out_of_range(
                "preprocess.contrast_clip_percent",
                self.preprocess.contrast_clip_percent,
            ));
        }

        let providers = &self.providers;
        if !(0.0..=1.0).contains(&providers.acceptance_threshold) {
            return Err(out_of_range(
                "providers.acceptance_threshold",
                providers.acceptance_threshold,
            ));
        }
        if providers.timeout_secs == 0 {
            return Err(out_of_range("providers.timeout_secs", providers.timeout_secs));
        }
        for id in &providers.order {
            if ![VISION_PROVIDER_ID, LOCAL_PROVIDER_ID, MANUAL_PROVIDER_ID].contains(&id.as_str()) {
                return Err(ConfigError::UnknownProvider(id.clone()));
            }
        }

        let extraction = &self.extraction;
        if extraction.merchant_scan_lines == 0 {
            return Err(out_of_range("extraction.merchant_scan_lines", 0));
        }
        for rule in &extraction.categories {
            if rule.label.trim().is_empty() {
                return Err(ConfigError::InvalidEntry {
                    table: "categories".to_string(),
                    reason: "empty label".to_string(),
                });
            }
            if rule.keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(ConfigError::InvalidEntry {
                    table: "categories".to_string(),
                    reason: format!("empty keyword in {}", rule.label),
                });
            }
        }
        for (name, month) in &extraction.months {
            if !(1..=12).contains(month) || name.trim().is_empty() {
                return Err(ConfigError::InvalidEntry {
                    table: "months".to_string(),
                    reason: format!("{} -> {}", name, month),
                });
            }
        }

        let scoring = &self.scoring;
        for (field, weight) in [
            ("scoring.amount_weight", scoring.amount_weight),
            ("scoring.merchant_weight", scoring.merchant_weight),
            ("scoring.date_weight", scoring.date_weight),
            ("scoring.category_weight", scoring.category_weight),
            ("scoring.review_threshold", scoring.review_threshold),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(out_of_range(field, weight));
            }
        }

        Ok(())
    }
}

fn out_of_range(field: &str, value: impl ToString) -> ConfigError {
    ConfigError::OutOfRange {
        field: field.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = KwitansiConfig::default();
        config.validate().unwrap();

        assert_eq!(config.preprocess.max_dimension, 1200);
        assert_eq!(config.preprocess.binarize_threshold, 180);
        assert_eq!(config.providers.acceptance_threshold, 0.3);
        assert_eq!(config.providers.order, vec!["vision", "local", "manual"]);
        assert_eq!(config.extraction.categories[0].label, "Konsumsi");
        assert_eq!(config.extraction.categories[1].label, "Transportasi");
        assert_eq!(config.extraction.months["mei"], 5);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "providers": { "acceptance_threshold": 0.5 } }"#;
        let config: KwitansiConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.providers.acceptance_threshold, 0.5);
        assert_eq!(config.providers.timeout_secs, 30);
        assert_eq!(config.extraction.merchant_scan_lines, 5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = KwitansiConfig::default();
        config.providers.acceptance_threshold = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::OutOfRange { .. })));

        let mut config = KwitansiConfig::default();
        config.providers.order.push("tesseract".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::UnknownProvider(ref id)) if id == "tesseract"));

        let mut config = KwitansiConfig::default();
        config.extraction.months.insert("bulan13".to_string(), 13);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidEntry { .. })));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = KwitansiConfig::default();
        config.extraction.merchant_scan_lines = 3;
        config.save(&path).unwrap();

        let loaded = KwitansiConfig::from_file(&path).unwrap();
        assert_eq!(loaded.extraction.merchant_scan_lines, 3);
        assert_eq!(loaded.extraction.categories, config.extraction.categories);
    }
}
