//! Subcommands and the configuration plumbing they share.

pub mod batch;
pub mod config;
pub mod models;
pub mod process;
pub mod text;

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::debug;

use kwitansi_core::KwitansiConfig;

/// Provider overrides accepted by the commands that run OCR.
#[derive(Args, Debug, Default)]
pub struct ProviderArgs {
    /// Provider order, e.g. "vision,local,manual"
    #[arg(long, value_delimiter = ',')]
    providers: Option<Vec<String>>,

    /// Base URL of an Ollama-compatible vision server
    #[arg(long)]
    vision_host: Option<String>,

    /// Vision model name
    #[arg(long)]
    vision_model: Option<String>,

    /// Local OCR model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,
}

impl ProviderArgs {
    pub fn apply(&self, config: &mut KwitansiConfig) {
        if let Some(order) = &self.providers {
            config.providers.order = order.iter().map(|id| id.trim().to_string()).collect();
        }
        if let Some(host) = &self.vision_host {
            config.providers.vision.host = Some(host.clone());
        }
        if let Some(model) = &self.vision_model {
            config.providers.vision.model = model.clone();
        }
        if let Some(dir) = &self.model_dir {
            config.providers.local.model_dir = dir.clone();
        }
    }
}

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kwitansi")
        .join("config.json")
}

/// Path the commands read and write: `--config` if given, else the default.
pub fn resolve_config_path(config_path: Option<&str>) -> PathBuf {
    config_path.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load configuration, falling back to defaults when no file exists.
///
/// An explicit `--config` path must exist.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<KwitansiConfig> {
    if let Some(path) = config_path {
        return read_config(Path::new(path));
    }

    let path = default_config_path();
    if path.exists() {
        read_config(&path)
    } else {
        debug!("No config file at {}, using defaults", path.display());
        Ok(KwitansiConfig::default())
    }
}

fn read_config(path: &Path) -> anyhow::Result<KwitansiConfig> {
    let config = KwitansiConfig::from_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}
