//! Command-line behaviour of the `kwitansi` binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use image::{ImageFormat, Rgb, RgbImage};
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

const WARUNG: &str = "WARUNG MAKAN SEDERHANA
Jl. Merdeka No. 123
20/01/2026 12:41
Nasi Goreng        2x  25.000
Subtotal: Rp 65.000
Pajak (10%): Rp 6.500
TOTAL: Rp 71.500
";

/// Binary with its config lookup pointed at an empty directory.
fn kwitansi(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kwitansi").unwrap();
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env_remove("RUST_LOG");
    cmd
}

fn write_png(path: &Path) {
    RgbImage::from_fn(120, 200, |_, y| {
        if y % 30 < 6 { Rgb([30, 30, 30]) } else { Rgb([240, 240, 235]) }
    })
    .save_with_format(path, ImageFormat::Png)
    .unwrap();
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    kwitansi(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("text"))
        .stdout(predicate::str::contains("models"));
}

#[test]
fn test_text_command_extracts_record() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("warung.txt");
    fs::write(&input, WARUNG).unwrap();

    let output = kwitansi(&home).arg("text").arg(&input).output().unwrap();
    assert!(output.status.success());

    let record: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record["amount"], 71_500);
    assert_eq!(record["merchant_name"], "WARUNG MAKAN SEDERHANA");
    assert_eq!(record["date"], "2026-01-20");
    assert_eq!(record["category"], "Konsumsi");
    assert_eq!(record["ocr_provider_id"], "manual");
    assert!(record["confidence_score"].as_f64().unwrap() > 0.99);
}

#[test]
fn test_text_command_reads_stdin_as_csv() {
    let home = TempDir::new().unwrap();
    kwitansi(&home)
        .args(["text", "-", "--format", "csv"])
        .write_stdin("TOKO SERBA ADA\nTOTAL Rp 12.000\n")
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "merchant_name,date,amount,category,confidence_score,ocr_provider_id",
        ))
        .stdout(predicate::str::contains("TOKO SERBA ADA,,12000,Other,0.65,manual"));
}

#[test]
fn test_text_explain_lists_candidates() {
    let home = TempDir::new().unwrap();
    kwitansi(&home)
        .args(["text", "-", "--explain"])
        .write_stdin(WARUNG)
        .assert()
        .success()
        .stderr(predicate::str::contains("grand_total"))
        .stderr(predicate::str::contains("Rp 65.000"));
}

#[test]
fn test_process_with_manual_only_yields_empty_record() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("struk.png");
    write_png(&input);

    let output = kwitansi(&home)
        .args(["process", "--providers", "manual"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let record: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record["ocr_provider_id"], "manual");
    assert_eq!(record["amount"], Value::Null);
    assert_eq!(record["category"], "Other");
    assert_eq!(record["confidence_score"], 0.0);
    assert!(String::from_utf8_lossy(&output.stderr).contains("review recommended"));
}

#[test]
fn test_process_report_includes_attempts() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("struk.png");
    write_png(&input);

    let output = kwitansi(&home)
        .args(["process", "--report", "--providers", "manual"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["disposition"], "manual");
    assert_eq!(report["preprocessed"], true);
    assert_eq!(report["attempts"][0]["provider_id"], "manual");
}

#[test]
fn test_process_rejects_unsupported_format() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("struk.webp");
    fs::write(&input, b"RIFF....WEBP").unwrap();

    kwitansi(&home)
        .arg("process")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported file format: webp"));
}

#[test]
fn test_process_missing_file() {
    let home = TempDir::new().unwrap();
    kwitansi(&home)
        .args(["process", "does-not-exist.jpg"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_batch_writes_outputs_and_summary() {
    let home = TempDir::new().unwrap();
    let inbox = home.path().join("inbox");
    let out = home.path().join("out");
    fs::create_dir_all(&inbox).unwrap();
    write_png(&inbox.join("a.png"));
    write_png(&inbox.join("b.png"));
    fs::write(inbox.join("notes.txt"), "not a receipt").unwrap();

    let pattern = format!("{}/*", inbox.display());
    kwitansi(&home)
        .args(["batch", &pattern, "--summary", "-j", "2", "--providers", "manual"])
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 2 files"));

    assert!(out.join("a.json").exists());
    assert!(out.join("b.json").exists());

    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("filename,status,"));
    assert!(lines[1].starts_with("a.png,success,"));
    assert!(lines[2].starts_with("b.png,success,"));
}

#[test]
fn test_batch_without_matches_fails() {
    let home = TempDir::new().unwrap();
    let pattern = format!("{}/*.png", home.path().display());
    kwitansi(&home)
        .args(["batch", &pattern])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files"));
}

#[test]
fn test_config_init_get_set() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("kwitansi.json");
    let path_arg = path.to_str().unwrap();

    kwitansi(&home)
        .args(["config", "init", "--output", path_arg])
        .assert()
        .success();
    assert!(path.exists());

    kwitansi(&home)
        .args(["--config", path_arg, "config", "get", "providers.timeout_secs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("30"));

    kwitansi(&home)
        .args(["--config", path_arg, "config", "set", "providers.order", r#"["local","manual"]"#])
        .assert()
        .success();

    let saved: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved["providers"]["order"], serde_json::json!(["local", "manual"]));

    // Out-of-range values are not written
    kwitansi(&home)
        .args(["--config", path_arg, "config", "set", "providers.timeout_secs", "0"])
        .assert()
        .failure();
    let saved: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved["providers"]["timeout_secs"], 30);
}

#[test]
fn test_config_set_rejects_unknown_provider() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("kwitansi.json");
    let path_arg = path.to_str().unwrap();

    kwitansi(&home)
        .args(["--config", path_arg, "config", "set", "providers.order", r#"["tesseract"]"#])
        .assert()
        .failure();
    assert!(!path.exists());
}

#[test]
fn test_models_status_reports_missing_files() {
    let home = TempDir::new().unwrap();
    let models = home.path().join("models");
    fs::create_dir_all(&models).unwrap();
    fs::write(models.join("det.onnx"), b"onnx").unwrap();

    kwitansi(&home)
        .args(["models", "status", "--model-dir"])
        .arg(&models)
        .assert()
        .success()
        .stdout(predicate::str::contains("det.onnx"))
        .stdout(predicate::str::contains("missing"))
        .stdout(predicate::str::contains("unavailable"));
}
