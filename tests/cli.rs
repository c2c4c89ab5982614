//! Binary-level tests for the `hresearch` command line.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn hresearch() -> Command {
    let mut cmd = Command::cargo_bin("hresearch").unwrap();
    cmd.env_remove("OPENAI_API_KEY")
        .env_remove("HRESEARCH_API_KEY")
        .env_remove("HRESEARCH_DB_PATH")
        .env_remove("HRESEARCH_PROMPT_DIR");
    cmd
}

#[test]
fn help_lists_commands() {
    hresearch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("history"))
        .stdout(predicate::str::contains("init-prompts"));
}

#[test]
fn run_without_api_key_fails() {
    let dir = TempDir::new().unwrap();
    hresearch()
        .current_dir(dir.path())
        .args(["run", "What is a CRDT?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key"));
}

#[test]
fn run_with_invalid_bounds_fails() {
    let dir = TempDir::new().unwrap();
    hresearch()
        .current_dir(dir.path())
        .args([
            "run",
            "What is a CRDT?",
            "--min-sub-questions",
            "4",
            "--max-sub-questions",
            "2",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("min_sub_questions"));
}

#[test]
fn history_on_fresh_database_is_empty() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("nested").join("sessions.db");
    hresearch()
        .args(["--db-path", db.to_str().unwrap(), "history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No saved sessions."));
    assert!(db.exists());
}

#[test]
fn history_json_is_an_array() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("sessions.db");
    let output = hresearch()
        .args(["--db-path", db.to_str().unwrap(), "--format", "json", "history"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(value.as_array().unwrap().is_empty());
}

#[test]
fn show_unknown_session_fails() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("sessions.db");
    hresearch()
        .args(["--db-path", db.to_str().unwrap(), "show", "no-such-id"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("session not found"));
}

#[test]
fn init_prompts_writes_templates() {
    let dir = TempDir::new().unwrap();
    let prompts = dir.path().join("prompts");
    hresearch()
        .args(["init-prompts", "--dir", prompts.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 4 prompt template(s)"));

    assert_eq!(std::fs::read_dir(&prompts).unwrap().count(), 4);

    hresearch()
        .args(["init-prompts", "--dir", prompts.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exist"));
}
