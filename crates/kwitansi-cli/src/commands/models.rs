//! Models command - check and download local OCR model files.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use futures_util::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use kwitansi_core::models::config::LocalOcrConfig;

use super::load_config;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// Check which model files are present
    Status(StatusArgs),

    /// Download model files
    Download(DownloadArgs),
}

#[derive(Args)]
struct StatusArgs {
    /// Model directory (default: from config)
    #[arg(short, long)]
    model_dir: Option<PathBuf>,
}

#[derive(Args)]
struct DownloadArgs {
    /// Base URL the model files are served under
    #[arg(long = "from", required = true)]
    base_url: String,

    /// Output directory (default: model directory from config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force re-download even if files exist
    #[arg(long)]
    force: bool,
}

pub async fn run(args: ModelsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let mut local = config.providers.local;

    match args.command {
        ModelsCommand::Status(status_args) => {
            if let Some(dir) = status_args.model_dir {
                local.model_dir = dir;
            }
            check_status(&local)
        }
        ModelsCommand::Download(download_args) => {
            if let Some(dir) = download_args.output.clone() {
                local.model_dir = dir;
            }
            download_models(&local, &download_args).await
        }
    }
}

/// File name and local path of each model file.
fn model_files(local: &LocalOcrConfig) -> [(&str, PathBuf); 3] {
    [
        (local.detection_model.as_str(), local.detection_path()),
        (local.recognition_model.as_str(), local.recognition_path()),
        (local.dictionary.as_str(), local.dictionary_path()),
    ]
}

fn check_status(local: &LocalOcrConfig) -> anyhow::Result<()> {
    println!("{}", style("Model Status").bold());
    println!("Model directory: {}", local.model_dir.display());
    println!();

    let mut total_size: u64 = 0;
    for (filename, path) in model_files(local) {
        let (status, size_str) = if path.exists() {
            let size = fs::metadata(&path)?.len();
            total_size += size;
            if size > 0 {
                (style("✓").green(), format_size(size))
            } else {
                (style("⚠").yellow(), "empty".to_string())
            }
        } else {
            (style("✗").red(), "missing".to_string())
        };

        println!("  {} {:<20} {:>10}", status, filename, size_str);
    }

    println!();
    if local.is_available() {
        println!(
            "{} Local OCR ready ({})",
            style("✓").green(),
            format_size(total_size)
        );
    } else {
        println!(
            "{} Local OCR unavailable, run 'kwitansi models download --from <URL>'",
            style("⚠").yellow()
        );
    }

    Ok(())
}

async fn download_models(local: &LocalOcrConfig, args: &DownloadArgs) -> anyhow::Result<()> {
    fs::create_dir_all(&local.model_dir)?;

    println!(
        "{} Downloading models to {}",
        style("ℹ").blue(),
        local.model_dir.display()
    );
    println!();

    let client = reqwest::Client::builder()
        .user_agent(concat!("kwitansi-cli/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let multi_progress = MultiProgress::new();
    let mut success_count = 0;
    let mut skip_count = 0;
    let mut error_count = 0;

    for (filename, path) in model_files(local) {
        if path.exists() && !args.force && fs::metadata(&path)?.len() > 0 {
            println!("  {} {} (already exists)", style("✓").green(), filename);
            skip_count += 1;
            continue;
        }

        let url = model_url(&args.base_url, filename);

        let pb = multi_progress.add(ProgressBar::new(0));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} {msg:<30} [{bar:25.cyan/blue}] {bytes}/{total_bytes}")?
                .progress_chars("=>-"),
        );
        pb.set_message(filename.to_string());

        match download_file(&client, &url, &path, &pb).await {
            Ok(()) => {
                pb.finish_with_message(format!("{} {}", style("✓").green(), filename));
                success_count += 1;
            }
            Err(e) => {
                pb.finish_with_message(format!("{} {} - {}", style("✗").red(), filename, e));
                error_count += 1;
            }
        }
    }

    println!();
    println!(
        "   {} downloaded, {} already present, {} failed",
        success_count, skip_count, error_count
    );

    if error_count > 0 {
        anyhow::bail!("{} model file(s) failed to download", error_count);
    }

    Ok(())
}

fn model_url(base_url: &str, filename: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), filename)
}

async fn download_file(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    pb: &ProgressBar,
) -> anyhow::Result<()> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP {}", response.status());
    }

    if let Some(content_length) = response.content_length() {
        pb.set_length(content_length);
    }

    // Partial downloads never replace a good file
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    file.flush()?;
    drop(file);

    fs::rename(&temp_path, path)?;

    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_url_joins_without_double_slash() {
        assert_eq!(
            model_url("https://models.example/ocr/", "det.onnx"),
            "https://models.example/ocr/det.onnx"
        );
        assert_eq!(
            model_url("https://models.example/ocr", "latin_dict.txt"),
            "https://models.example/ocr/latin_dict.txt"
        );
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(7_500_000), "7.2 MB");
    }

    #[test]
    fn test_model_files_follow_config() {
        let local = LocalOcrConfig {
            model_dir: PathBuf::from("/opt/ocr"),
            ..LocalOcrConfig::default()
        };
        let files = model_files(&local);
        assert_eq!(files[0].0, "det.onnx");
        assert_eq!(files[0].1, PathBuf::from("/opt/ocr/det.onnx"));
        assert_eq!(files[2].1, PathBuf::from("/opt/ocr/latin_dict.txt"));
    }
}
