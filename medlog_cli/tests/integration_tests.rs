//! Integration tests for the medlog binary.
//!
//! These tests verify end-to-end behavior including:
//! - Logging, listing, filtering and removing entries
//! - Reminder bookkeeping across invocations
//! - Backup export/import and CSV export

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Helper to get the CLI with config isolated from the host
fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("medlog"));
    cmd.env("XDG_CONFIG_HOME", data_dir.join("config"))
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

fn read_record(data_dir: &Path, key: &str) -> Vec<Value> {
    let contents = fs::read_to_string(data_dir.join(format!("{}.json", key)))
        .expect("Failed to read record");
    serde_json::from_str(&contents).expect("Record should be valid JSON")
}

fn add(data_dir: &Path, name: &str, extra: &[&str]) {
    cli(data_dir)
        .arg("add")
        .arg("--name")
        .arg(name)
        .args(extra)
        .assert()
        .success();
}

#[test]
fn test_cli_help() {
    Command::new(assert_cmd::cargo::cargo_bin!("medlog"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Medication intake log with daily reminders",
        ));
}

#[test]
fn test_add_creates_records() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .args(["add", "--name", "Metformin", "--dosage", "500mg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged Metformin"));

    let medications = read_record(data_dir, "medications");
    assert_eq!(medications.len(), 1);
    assert_eq!(medications[0]["name"], "Metformin");
    assert_eq!(medications[0]["dosage"], "500mg");
    assert_eq!(medications[0]["notes"], "");
    assert!(read_record(data_dir, "reminders").is_empty());
}

#[test]
fn test_add_with_reminder() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .args(["add", "--name", "Levothyroxine", "--remind", "07:30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Daily reminder at 07:30"));

    let medications = read_record(data_dir, "medications");
    let reminders = read_record(data_dir, "reminders");
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0]["timeOfDay"], "07:30");
    assert_eq!(reminders[0]["active"], true);
    assert_eq!(reminders[0]["medicationId"], medications[0]["id"]);

    cli(data_dir)
        .arg("reminders")
        .assert()
        .success()
        .stdout(predicate::str::contains("07:30  Levothyroxine  (next "));
}

#[test]
fn test_add_rejects_invalid_input() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .args(["add", "--name", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("medication name is required"));

    cli(data_dir)
        .args(["add", "--name", "Aspirin", "--remind", "25:00"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid reminder time"));

    assert!(!data_dir.join("medications.json").exists());
}

#[test]
fn test_list_is_newest_first_and_filters() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    add(data_dir, "Aspirin", &["--dosage", "100mg"]);
    add(data_dir, "Vitamin D", &["--notes", "with breakfast"]);

    let output = cli(data_dir).arg("list").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let vitamin = stdout.find("Vitamin D").unwrap();
    let aspirin = stdout.find("Aspirin").unwrap();
    assert!(vitamin < aspirin, "newest entry should be listed first");

    cli(data_dir)
        .args(["list", "BREAKFAST"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Vitamin D"))
        .stdout(predicate::str::contains("Aspirin").not());

    cli(data_dir)
        .args(["list", "ibuprofen"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No entries."));
}

#[test]
fn test_remove_cascades_to_reminders() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    add(data_dir, "Aspirin", &["--remind", "08:00"]);
    add(data_dir, "Zinc", &["--remind", "20:00"]);
    let medications = read_record(data_dir, "medications");
    let zinc_id = medications[0]["id"].as_str().unwrap().to_string();

    cli(data_dir)
        .args(["remove", &zinc_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed Zinc"))
        .stdout(predicate::str::contains("Cancelled 1 reminder(s)"));

    let reminders = read_record(data_dir, "reminders");
    assert_eq!(reminders.len(), 1);
    assert_ne!(reminders[0]["medicationId"], zinc_id.as_str());

    // Removing again is a no-op
    cli(data_dir)
        .args(["remove", &zinc_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("No entry with id"));
}

#[test]
fn test_reminder_disable_and_enable() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    add(data_dir, "Aspirin", &["--remind", "08:00"]);
    let reminder_id = read_record(data_dir, "reminders")[0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    cli(data_dir)
        .args(["reminder", "disable", &reminder_id])
        .assert()
        .success();
    assert_eq!(read_record(data_dir, "reminders")[0]["active"], false);

    cli(data_dir)
        .arg("reminders")
        .assert()
        .success()
        .stdout(predicate::str::contains("(disabled)"));

    cli(data_dir)
        .args(["reminder", "enable", &reminder_id])
        .assert()
        .success();
    assert_eq!(read_record(data_dir, "reminders")[0]["active"], true);

    cli(data_dir)
        .args(["reminder", "enable", "0190a6c4-8f5e-7000-8000-000000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown reminder"));
}

#[test]
fn test_export_csv() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    add(data_dir, "Aspirin", &["--dosage", "100mg"]);

    cli(data_dir)
        .args(["export", "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            r#""id","name","dosage","frequency","notes","logged_at""#,
        ))
        .stdout(predicate::str::contains(r#""Aspirin","100mg","","""#));
}

#[test]
fn test_backup_export_and_import_is_idempotent() {
    let source_dir = setup_test_dir();
    let target_dir = setup_test_dir();
    let backup_path = source_dir.path().join("backup.json");

    add(source_dir.path(), "Aspirin", &["--remind", "08:00"]);
    add(source_dir.path(), "Zinc", &[]);

    cli(source_dir.path())
        .arg("export")
        .arg("--output")
        .arg(&backup_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 entries"));

    let backup: Value = serde_json::from_str(&fs::read_to_string(&backup_path).unwrap()).unwrap();
    assert_eq!(backup["version"], 1);
    assert!(backup["exportedAt"].is_string());

    add(target_dir.path(), "Existing", &[]);

    cli(target_dir.path())
        .arg("import")
        .arg(&backup_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 entries and 1 reminders"));

    cli(target_dir.path())
        .arg("import")
        .arg(&backup_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 0 entries and 0 reminders"));

    let medications = read_record(target_dir.path(), "medications");
    assert_eq!(medications.len(), 3);
    assert_eq!(medications[0]["name"], "Existing");
    assert_eq!(read_record(target_dir.path(), "reminders").len(), 1);
}

#[test]
fn test_import_rejects_malformed_backup() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add(data_dir, "Aspirin", &[]);
    let before = fs::read_to_string(data_dir.join("medications.json")).unwrap();

    let bad_path = data_dir.join("bad.json");
    fs::write(&bad_path, r#"{"medications": {"name": "Zinc"}}"#).unwrap();

    cli(data_dir)
        .arg("import")
        .arg(&bad_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Format error"));

    let after = fs::read_to_string(data_dir.join("medications.json")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_config_file_is_honored() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("from-config");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            "[data]\ndata_dir = {:?}\n\n[notifications]\nenabled = false\n",
            data_dir.to_string_lossy()
        ),
    )
    .unwrap();

    Command::new(assert_cmd::cargo::cargo_bin!("medlog"))
        .arg("--config")
        .arg(&config_path)
        .args(["add", "--name", "Aspirin", "--remind", "08:00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Daily reminder at 08:00"))
        .stderr(predicate::str::contains("Permission error"))
        .stderr(predicate::str::contains("will not fire"));

    assert!(data_dir.join("medications.json").exists());
    assert_eq!(read_record(&data_dir, "reminders").len(), 1);
}

#[test]
fn test_config_loading_is_logged() {
    let temp_dir = setup_test_dir();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[logging]\nlevel = \"warn\"\n").unwrap();

    cli(temp_dir.path())
        .env("RUST_LOG", "debug")
        .arg("--config")
        .arg(&config_path)
        .arg("list")
        .assert()
        .success()
        .stderr(predicate::str::contains("Loaded config from"));
}

#[test]
fn test_unknown_log_level_is_rejected() {
    let temp_dir = setup_test_dir();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[logging]\nlevel = \"chatty\"\n").unwrap();

    cli(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown log level"));
}
