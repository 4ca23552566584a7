//! CLI integration tests for the `lapse` command-line interface.
//!
//! Each test gets its own temporary session database.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the lapse binary pointed at a database in `dir`.
fn lapse(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lapse").unwrap();
    cmd.env_remove("LAPSE_CONFIG")
        .env_remove("LAPSE_LOG_DIR")
        .env_remove("RUST_LOG")
        .arg("--db")
        .arg(dir.path().join("sessions.db"));
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    Command::cargo_bin("lapse")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("count"))
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("set"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("clear"))
        .stdout(predicate::str::contains("sweep"))
        .stdout(predicate::str::contains("watch"));
}

#[test]
fn test_version_displays() {
    Command::cargo_bin("lapse")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lapse"));
}

#[test]
fn test_set_requires_payload() {
    let dir = TempDir::new().unwrap();
    lapse(&dir).args(["set", "abc"]).assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Commands
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_set_then_get() {
    let dir = TempDir::new().unwrap();

    lapse(&dir)
        .args(["set", "abc", r#"{"user":"alice"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("Session stored: abc"));

    let output = lapse(&dir).args(["get", "abc"]).output().unwrap();
    assert!(output.status.success());
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(payload, serde_json::json!({"user": "alice"}));
}

#[test]
fn test_get_missing_session_fails() {
    let dir = TempDir::new().unwrap();
    lapse(&dir)
        .args(["get", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Session not found: nope"));
}

#[test]
fn test_get_missing_session_flushes_file_log() {
    let dir = TempDir::new().unwrap();
    let logs = dir.path().join("logs");

    lapse(&dir)
        .arg("--log-dir")
        .arg(&logs)
        .args(["get", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Session not found: nope"));

    let written: String = std::fs::read_dir(&logs)
        .unwrap()
        .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
        .collect();
    assert!(written.contains("Getting session"));
}

#[test]
fn test_set_rejects_invalid_json() {
    let dir = TempDir::new().unwrap();
    lapse(&dir)
        .args(["set", "abc", "{not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid JSON"));
}

#[test]
fn test_set_rejects_empty_id() {
    let dir = TempDir::new().unwrap();
    lapse(&dir)
        .args(["set", "", "{}"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid session id"));
}

#[test]
fn test_count_destroy_and_clear() {
    let dir = TempDir::new().unwrap();
    for id in ["a", "b", "c"] {
        lapse(&dir).args(["set", id, "{}"]).assert().success();
    }

    lapse(&dir)
        .args(["--json", "count"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"sessions\": 3"));

    lapse(&dir).args(["destroy", "a"]).assert().success();
    lapse(&dir)
        .args(["--json", "count"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"sessions\": 2"));

    lapse(&dir)
        .args(["--json", "clear", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"deleted\":2"));
}

#[test]
fn test_clear_requires_confirmation() {
    let dir = TempDir::new().unwrap();
    lapse(&dir).args(["set", "a", "{}"]).assert().success();

    lapse(&dir)
        .arg("clear")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));

    lapse(&dir)
        .args(["--json", "count"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"sessions\": 1"));
}

#[test]
fn test_sweep_removes_expired_sessions() {
    let dir = TempDir::new().unwrap();
    lapse(&dir)
        .args(["set", "short", "{}", "--max-age", "1"])
        .assert()
        .success();
    lapse(&dir).args(["set", "long", "{}"]).assert().success();

    std::thread::sleep(std::time::Duration::from_millis(20));

    lapse(&dir)
        .args(["--json", "sweep"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"deleted\":1"));
    lapse(&dir).args(["get", "long"]).assert().success();
}

#[test]
fn test_config_file_selects_table() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("lapse.toml");
    std::fs::write(&config, "table = \"web_sessions\"\n").unwrap();

    lapse(&dir)
        .arg("--config")
        .arg(&config)
        .args(["set", "abc", "{}"])
        .assert()
        .success();

    // Default table does not see it.
    lapse(&dir)
        .args(["--json", "count"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"sessions\": 0"));

    lapse(&dir)
        .arg("--config")
        .arg(&config)
        .args(["--json", "count"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"table\": \"web_sessions\""))
        .stdout(predicate::str::contains("\"sessions\": 1"));
}

#[test]
fn test_invalid_config_rejected() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("lapse.toml");
    std::fs::write(&config, "clear_interval = 0\n").unwrap();

    lapse(&dir)
        .arg("--config")
        .arg(&config)
        .arg("count")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}
