//! CLI integration tests using assert_cmd.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn examtally() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("examtally").unwrap();
    cmd.env_remove("EXAMTALLY_OPENAI_KEY");
    cmd
}

fn sample_export() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/sample-export.json")
}

#[test]
fn score_text_output() {
    examtally()
        .arg("score")
        .arg("--input")
        .arg(sample_export())
        .assert()
        .success()
        .stdout(predicate::str::contains("Total Users (Count): 3"))
        .stdout(predicate::str::contains("Submitted Users (Count): 2"))
        .stdout(predicate::str::contains("Overall Accuracy (%): 57.14"))
        .stdout(predicate::str::contains("Text Accuracy (%): 60.00"))
        .stdout(predicate::str::contains("Audio Accuracy (%): 50.00"))
        .stdout(predicate::str::contains("Standard Accuracy (%): 50.00"))
        .stdout(predicate::str::contains("Control Accuracy (%): 100.00"))
        .stdout(predicate::str::contains("Max Tab Changes (Count): 3"));
}

#[test]
fn score_json_output() {
    let output = examtally()
        .arg("score")
        .arg("--input")
        .arg(sample_export())
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["total_users"], 3);
    assert_eq!(summary["overall"]["accuracy"]["correct"], 4);
    assert_eq!(summary["overall"]["accuracy"]["incorrect"], 3);
    assert_eq!(summary["audio"]["accuracy"]["correct"], 1);
}

#[test]
fn score_table_output() {
    examtally()
        .arg("score")
        .arg("--input")
        .arg(sample_export())
        .arg("--format")
        .arg("table")
        .assert()
        .success()
        .stdout(predicate::str::contains("Metric"))
        .stdout(predicate::str::contains("57.14"));
}

#[test]
fn score_unknown_format() {
    examtally()
        .arg("score")
        .arg("--input")
        .arg(sample_export())
        .arg("--format")
        .arg("xml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown format"));
}

#[test]
fn score_nonexistent_input() {
    examtally()
        .arg("score")
        .arg("--input")
        .arg("no_such_export.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"))
        .stderr(predicate::str::contains("no_such_export.json"));
}

#[test]
fn score_applies_manual_grades() {
    let dir = TempDir::new().unwrap();
    let sheet_dir = dir.path().join("u_carol");
    std::fs::create_dir_all(&sheet_dir).unwrap();
    std::fs::write(
        sheet_dir.join("answers.csv"),
        "Question ID,Correct,Wrong\nsection2_standard_Q1,x,\n",
    )
    .unwrap();

    examtally()
        .arg("score")
        .arg("--input")
        .arg(sample_export())
        .arg("--grades")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Overall Accuracy (%): 62.50"));
}

#[test]
fn run_writes_all_reports() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");

    examtally()
        .current_dir(dir.path())
        .arg("run")
        .arg("--input")
        .arg(sample_export())
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("3 users (2 submitted, 1 in progress)"));

    assert!(out.join("report.json").exists());
    assert!(out.join("report.html").exists());
    assert!(out.join("general_statistics/summary.csv").exists());
    assert!(out.join("general_statistics/users.csv").exists());
    assert!(out.join("general_statistics/standard_accuracy_per_user.csv").exists());
    assert!(out.join("users/u_alice/answers.csv").exists());
    assert!(out.join("users/u_carol/summary.csv").exists());
    // No activity, no report.
    assert!(!out.join("users/u_dave").exists());

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("report.json")).unwrap()).unwrap();
    assert_eq!(report["users"]["u_bob"]["email"], "bob@example.com");
}

#[test]
fn run_selected_format_only() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");

    examtally()
        .current_dir(dir.path())
        .arg("run")
        .arg("--input")
        .arg(sample_export())
        .arg("--output")
        .arg(&out)
        .arg("--format")
        .arg("json")
        .assert()
        .success();

    assert!(out.join("report.json").exists());
    assert!(!out.join("report.html").exists());
    assert!(!out.join("users").exists());
}

#[test]
fn run_rejects_unknown_format() {
    let dir = TempDir::new().unwrap();

    examtally()
        .current_dir(dir.path())
        .arg("run")
        .arg("--input")
        .arg(sample_export())
        .arg("--format")
        .arg("json,pdf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown format 'pdf'"));
}

#[test]
fn accuracy_appends_unless_truncated() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("standard_accuracy_per_user.csv");
    let lines = |path: &Path| std::fs::read_to_string(path).unwrap().lines().count();

    for _ in 0..2 {
        examtally()
            .arg("accuracy")
            .arg("--input")
            .arg(sample_export())
            .arg("--output")
            .arg(&out)
            .assert()
            .success()
            .stdout(predicate::str::contains("3 row(s)"));
    }
    assert_eq!(lines(&out), 7);

    examtally()
        .arg("accuracy")
        .arg("--input")
        .arg(sample_export())
        .arg("--output")
        .arg(&out)
        .arg("--truncate")
        .assert()
        .success();
    assert_eq!(lines(&out), 4);

    let content = std::fs::read_to_string(&out).unwrap();
    assert!(content.contains("u_alice,2,1,0.667,1,0,1"));
}

#[test]
fn accuracy_uses_selected_catalog() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("accuracy.csv");

    examtally()
        .arg("accuracy")
        .arg("--input")
        .arg(sample_export())
        .arg("--output")
        .arg(&out)
        .arg("--catalog")
        .arg(dir.path().join("missing-catalog.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing-catalog.json"));
    assert!(!out.exists());

    let catalog = dir.path().join("questions.json");
    let config = dir.path().join("examtally.toml");
    std::fs::write(&config, format!("catalog = {:?}\n", catalog.display().to_string())).unwrap();
    examtally().current_dir(dir.path()).arg("init").assert().success();

    examtally()
        .arg("accuracy")
        .arg("--input")
        .arg(sample_export())
        .arg("--output")
        .arg(&out)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 row(s)"));
}

#[test]
fn validate_builtin_catalog() {
    examtally()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("53 questions"))
        .stdout(predicate::str::contains("Catalog valid."));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.json");
    std::fs::write(
        &path,
        r#"{"questions": [
            {"id": "section2_standard_Q1", "question": "Bits per byte?", "type": "blank"},
            {"id": "bonus", "question": "Anything else?", "type": "blank"}
        ]}"#,
    )
    .unwrap();

    examtally()
        .arg("validate")
        .arg("--catalog")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 questions"))
        .stdout(predicate::str::contains("[section2_standard_Q1] WARNING"))
        .stdout(predicate::str::contains("[bonus] WARNING"));
}

#[test]
fn validate_nonexistent_file() {
    examtally()
        .arg("validate")
        .arg("--catalog")
        .arg("nonexistent.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    examtally()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created examtally.toml"))
        .stdout(predicate::str::contains("Created questions.json"));

    assert!(dir.path().join("examtally.toml").exists());
    assert!(dir.path().join("questions.json").exists());

    // The written catalog is usable as-is.
    examtally()
        .current_dir(dir.path())
        .arg("validate")
        .arg("--catalog")
        .arg("questions.json")
        .assert()
        .success()
        .stdout(predicate::str::contains("Catalog valid."));
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    // First init
    examtally()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    // Second init should skip
    examtally()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn transcribe_with_mock_engine() {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join("audio");
    std::fs::create_dir_all(&cache).unwrap();
    // Only the failed transcript needs work; serve it from the cache.
    std::fs::write(cache.join("u_alice_section3_control_Q1.webm"), b"webm").unwrap();

    let config = dir.path().join("examtally.toml");
    std::fs::write(
        &config,
        format!(
            "audio_cache_dir = {:?}\nmax_retries = 0\n\n[transcriber]\ntype = \"mock\"\nresponse = \"binary tree\"\n",
            cache.display().to_string()
        ),
    )
    .unwrap();
    let output = dir.path().join("enriched.json");

    examtally()
        .current_dir(dir.path())
        .arg("transcribe")
        .arg("--input")
        .arg(sample_export())
        .arg("--output")
        .arg(&output)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 transcribed, 0 failed"));

    let enriched: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    let alice = &enriched["examResults"]["u_alice"]["-NaLice0001"]["answers"];
    assert_eq!(alice["section3_control_Q1"]["transcription"], "binary tree");
    assert_eq!(alice["section3_standard_Q1"]["transcription"], "Merge sort");
    // Unmodelled sections survive.
    assert_eq!(enriched["users"]["u_bob"]["email"], "bob@example.com");
}

#[test]
fn transcribe_requires_a_transcriber() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("examtally.toml");
    std::fs::write(&config, "max_retries = 1\n").unwrap();

    examtally()
        .current_dir(dir.path())
        .arg("transcribe")
        .arg("--input")
        .arg(sample_export())
        .arg("--output")
        .arg(dir.path().join("out.json"))
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no transcriber configured"));
}

#[test]
fn help_output() {
    examtally()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exam export normalization"));
}

#[test]
fn version_output() {
    examtally()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("examtally"));
}
