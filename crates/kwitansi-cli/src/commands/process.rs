//! Process command - extract a ledger record from a single receipt image.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use kwitansi_core::receipt::rules::format_rupiah;
use kwitansi_core::{MimeType, ReceiptPipeline, ReceiptRecord};

use super::{load_config, ProviderArgs};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input image (JPEG or PNG)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Emit the full diagnostic report (attempts, raw text, candidates) as JSON
    #[arg(long)]
    report: bool,

    /// Show extraction confidence and provider
    #[arg(long)]
    show_confidence: bool,

    #[command(flatten)]
    providers: ProviderArgs,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    args.providers.apply(&mut config);

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    let mime = mime_for(&args.input)?;

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));

    pb.set_message("Loading image...");
    let bytes = fs::read(&args.input)?;
    let pipeline = ReceiptPipeline::new(&config)?;

    pb.set_message("Recognizing receipt...");
    let report = pipeline.extract_report(&bytes, mime.as_str()).await?;

    pb.finish_and_clear();

    let output = if args.report {
        serde_json::to_string_pretty(&report)?
    } else {
        format_record(&report.record, args.format)?
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if report.needs_review {
        eprintln!(
            "{} Confidence {:.0}% is below {:.0}%, review recommended",
            style("⚠").yellow(),
            report.record.confidence_score * 100.0,
            pipeline.review_threshold() * 100.0
        );
    }

    if args.show_confidence {
        eprintln!();
        eprintln!(
            "{} Extraction confidence: {:.1}%",
            style("ℹ").blue(),
            report.record.confidence_score * 100.0
        );
        eprintln!(
            "{} Provider: {} ({})",
            style("ℹ").blue(),
            report.record.ocr_provider_id,
            report.disposition.as_str()
        );
        for attempt in &report.attempts {
            eprintln!(
                "    {:<8} {:>5.2} {:>6}ms {}",
                attempt.provider_id,
                attempt.confidence,
                attempt.elapsed_ms,
                if attempt.succeeded { "ok" } else { "failed" }
            );
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Mime type implied by the file extension.
pub fn mime_for(path: &Path) -> anyhow::Result<MimeType> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    MimeType::from_extension(&extension)
        .ok_or_else(|| anyhow::anyhow!("Unsupported file format: {}", extension))
}

pub fn format_record(record: &ReceiptRecord, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(record)?),
        OutputFormat::Csv => format_csv(record),
        OutputFormat::Text => Ok(format_text(record)),
    }
}

fn format_csv(record: &ReceiptRecord) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "merchant_name",
        "date",
        "amount",
        "category",
        "confidence_score",
        "ocr_provider_id",
    ])?;

    wtr.write_record([
        record.merchant_name.as_deref().unwrap_or(""),
        &record.date_iso().unwrap_or_default(),
        &record.amount.map(|a| a.to_string()).unwrap_or_default(),
        &record.category,
        &format!("{:.2}", record.confidence_score),
        &record.ocr_provider_id,
    ])?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(record: &ReceiptRecord) -> String {
    let missing = "-";
    let mut output = String::new();

    output.push_str(&format!(
        "Merchant:   {}\n",
        record.merchant_name.as_deref().unwrap_or(missing)
    ));
    output.push_str(&format!(
        "Date:       {}\n",
        record.date_iso().as_deref().unwrap_or(missing)
    ));
    output.push_str(&format!(
        "Amount:     {}\n",
        record.amount.map(format_rupiah).as_deref().unwrap_or(missing)
    ));
    output.push_str(&format!("Category:   {}\n", record.category));
    output.push_str(&format!(
        "Confidence: {:.0}%\n",
        record.confidence_score * 100.0
    ));
    output.push_str(&format!("Provider:   {}\n", record.ocr_provider_id));

    output
}
