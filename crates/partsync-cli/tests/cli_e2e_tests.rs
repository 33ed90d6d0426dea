//! End-to-end tests for the partsync binary
//!
//! These tests validate:
//! - Argument parsing and help output
//! - Configuration layering and token redaction
//! - One-shot manifest runs against a fake copy tool
//! - Failure records, status and drain
//! - Processed-log compaction

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const MANIFEST: &str = r#"[{"id": "1", "cloud_location_container": "c1",
    "cloud_destination_folder_name": "f1", "path_db": "dbA"}]"#;

/// Command with a clean environment rooted in `dir`
fn partsync(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("partsync").unwrap();
    cmd.current_dir(dir)
        .env_remove("PARTSYNC_CONFIG")
        .env_remove("PARTSYNC_BASE_URL")
        .env_remove("PARTSYNC_AUTH_TOKEN")
        .env_remove("PARTSYNC_LOG_LEVEL")
        .env("PARTSYNC_RECOVERY_DIR", dir.join("failed"))
        .env("PARTSYNC_PROCESSED_LOG", dir.join("processed_files.txt"));
    cmd
}

/// Copy tool that fails every copy of partition `tableX/p2`
#[cfg(unix)]
fn fake_tool(dir: &Path) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-copy");
    fs::write(
        &path,
        "#!/bin/sh\ncase \"$2\" in\n  */tableX/p2) echo \"simulated failure\" >&2; exit 1 ;;\nesac\nexit 0\n",
    )
    .unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

// ============================================================================
// Help and configuration
// ============================================================================

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    partsync(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("drain"))
        .stdout(predicate::str::contains("compact-log"));
}

#[test]
fn test_config_show_redacts_token() {
    let dir = TempDir::new().unwrap();
    partsync(dir.path())
        .args(["config", "show"])
        .env("PARTSYNC_BASE_URL", "https://acct.blob.core.windows.net")
        .env("PARTSYNC_AUTH_TOKEN", "?sv=1&sig=topsecret")
        .assert()
        .success()
        .stdout(predicate::str::contains("https://acct.blob.core.windows.net"))
        .stdout(predicate::str::contains("<redacted>"))
        .stdout(predicate::str::contains("topsecret").not());
}

#[test]
fn test_config_file_is_read() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("partsync.toml");
    fs::write(&config, "[transfer]\nretries = 9\n").unwrap();

    partsync(dir.path())
        .args(["--config", config.to_str().unwrap(), "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("retries = 9"));
}

#[test]
fn test_invalid_env_value_fails() {
    let dir = TempDir::new().unwrap();
    partsync(dir.path())
        .args(["config", "show"])
        .env("PARTSYNC_RETRIES", "many")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("PARTSYNC_RETRIES"));
}

#[test]
fn test_invalid_log_level_fails() {
    let dir = TempDir::new().unwrap();
    partsync(dir.path())
        .args(["config", "show"])
        .env("PARTSYNC_LOG_LEVEL", "loud")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid log level: loud"))
        .stderr(predicate::str::contains("PARTSYNC_LOG_*"));
}

#[test]
fn test_run_requires_base_url() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("batch.json"), MANIFEST).unwrap();

    partsync(dir.path())
        .args(["run", "batch.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("base_url"));
}

// ============================================================================
// Replication
// ============================================================================

#[cfg(unix)]
#[test]
fn test_run_records_failed_partition() {
    let dir = TempDir::new().unwrap();
    for partition in ["dbA/tableX/p1", "dbA/tableX/p2"] {
        fs::create_dir_all(dir.path().join(partition)).unwrap();
    }
    fs::write(dir.path().join("batch.json"), MANIFEST).unwrap();
    let tool = fake_tool(dir.path());

    let configured = |cmd: &mut Command| {
        cmd.env("PARTSYNC_TOOL_PATH", &tool)
            .env("PARTSYNC_BASE_URL", "https://acct.blob.core.windows.net")
            .env("PARTSYNC_SOURCE_ROOT", dir.path())
            .env("PARTSYNC_RETRIES", "2")
            .env("PARTSYNC_RETRY_DELAY_SECS", "0");
    };

    let mut run = partsync(dir.path());
    configured(&mut run);
    run.args(["run", "batch.json"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Partitions: 2"))
        .stderr(predicate::str::contains("1 failure record(s) still pending"));

    let records: Vec<_> = fs::read_dir(dir.path().join("failed")).unwrap().collect();
    assert_eq!(records.len(), 1);

    partsync(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("tableX/p2"))
        .stdout(predicate::str::contains("Pending failures:   1"));

    // Once the tool succeeds, drain clears the record
    let mut drain = partsync(dir.path());
    configured(&mut drain);
    drain
        .env("PARTSYNC_TOOL_PATH", "true")
        .arg("drain")
        .assert()
        .success()
        .stdout(predicate::str::contains("Recovered: "));

    partsync(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No pending failure records."));
}

#[test]
fn test_drain_with_nothing_pending() {
    let dir = TempDir::new().unwrap();
    partsync(dir.path())
        .arg("drain")
        .assert()
        .success()
        .stdout(predicate::str::contains("No pending failure records."));
}

#[test]
fn test_verify_missing_local_fails() {
    let dir = TempDir::new().unwrap();
    partsync(dir.path())
        .args(["verify", "missing", "https://acct/c1/f1/t/missing"])
        .env("PARTSYNC_TOOL_PATH", "/nonexistent/copy-tool")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

// ============================================================================
// Maintenance
// ============================================================================

#[test]
fn test_status_on_fresh_directory() {
    let dir = TempDir::new().unwrap();
    partsync(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed files:    0"));

    assert!(!dir.path().join("failed").exists());
}

#[test]
fn test_compact_log_removes_stale_entries() {
    let dir = TempDir::new().unwrap();
    let kept = dir.path().join("a.json");
    fs::write(&kept, MANIFEST).unwrap();
    let log = dir.path().join("processed_files.txt");
    fs::write(
        &log,
        format!("{0}\n{0}\n{1}\n", kept.display(), dir.path().join("gone.json").display()),
    )
    .unwrap();

    partsync(dir.path())
        .arg("compact-log")
        .assert()
        .success()
        .stdout(predicate::str::contains("Duplicates removed: 1"))
        .stdout(predicate::str::contains("Missing removed:    1"));

    assert_eq!(fs::read_to_string(&log).unwrap(), format!("{}\n", kept.display()));
}
