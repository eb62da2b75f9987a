//! Text command - run the field extractor and scorer on recognized text.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use clap::Args;
use console::style;

use kwitansi_core::models::config::MANUAL_PROVIDER_ID;
use kwitansi_core::receipt::rules::format_rupiah;
use kwitansi_core::{ConfidenceScorer, ReceiptParser, ReceiptRecord};

use super::load_config;
use super::process::{format_record, OutputFormat};

/// Arguments for the text command.
#[derive(Args)]
pub struct TextArgs {
    /// Text file with OCR output ("-" reads stdin)
    #[arg(required = true)]
    input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Provider id stamped on the record
    #[arg(long, default_value = MANUAL_PROVIDER_ID)]
    provider_id: String,

    /// List every amount candidate and the rule that produced it
    #[arg(long)]
    explain: bool,
}

pub async fn run(args: TextArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    config.validate()?;

    let text = if args.input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        if !args.input.exists() {
            anyhow::bail!("Input file not found: {}", args.input.display());
        }
        fs::read_to_string(&args.input)?
    };

    let parser = ReceiptParser::new(&config.extraction)?;
    let scorer = ConfidenceScorer::new(&config.scoring);

    let extraction = parser.analyze(&text);
    let record = ReceiptRecord {
        confidence_score: scorer.score(&extraction.factors),
        amount: extraction.fields.amount,
        merchant_name: extraction.fields.merchant_name,
        date: extraction.fields.date,
        category: extraction.fields.category,
        ocr_provider_id: args.provider_id,
    };

    println!("{}", format_record(&record, args.format)?);

    if args.explain {
        eprintln!();
        eprintln!("{}", style("Amount candidates").bold());
        if extraction.amount_candidates.is_empty() {
            eprintln!("  (none)");
        }
        for candidate in &extraction.amount_candidates {
            let marker = if record.amount == Some(candidate.value) { "◀" } else { "" };
            eprintln!(
                "  {:<16} {:>14} at {:>4}..{:<4} {}",
                candidate.rule.id(),
                format_rupiah(candidate.value),
                candidate.span.0,
                candidate.span.1,
                style(marker).green()
            );
        }
    }

    Ok(())
}
