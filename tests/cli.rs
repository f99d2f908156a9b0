//! Smoke tests for the `envelope` binary.
//!
//! Every test points the binary at its own temp directory through
//! `ENVELOPE_LEDGER_DATA_DIR`.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn envelope(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("envelope").unwrap();
    cmd.env("ENVELOPE_LEDGER_DATA_DIR", data_dir.path())
        .env("RUST_LOG", "off");
    cmd
}

fn init(data_dir: &TempDir) {
    envelope(data_dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialization complete"));
}

#[test]
fn commands_require_init() {
    let data_dir = TempDir::new().unwrap();

    envelope(&data_dir)
        .args(["account", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("envelope init"));
}

#[test]
fn init_is_idempotent() {
    let data_dir = TempDir::new().unwrap();
    init(&data_dir);

    envelope(&data_dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already initialized"));
}

#[test]
fn account_lifecycle_through_the_cli() {
    let data_dir = TempDir::new().unwrap();
    init(&data_dir);

    envelope(&data_dir)
        .args(["account", "add", "Checking", "-b", "250.00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created account: Checking"));

    envelope(&data_dir)
        .args(["account", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Checking"));

    // Opening balance still references the account
    envelope(&data_dir)
        .args(["account", "hide", "Checking"])
        .assert()
        .success();
    envelope(&data_dir)
        .args(["account", "delete", "Checking"])
        .assert()
        .failure();

    envelope(&data_dir)
        .args(["account", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Checking").not());
}

#[test]
fn local_sync_round_trip() {
    let data_dir = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    init(&data_dir);

    envelope(&data_dir)
        .args(["sync", "enable-local"])
        .arg(remote.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Sync enabled"));

    envelope(&data_dir)
        .args(["payee", "add", "Landlord"])
        .assert()
        .success();

    envelope(&data_dir)
        .args(["sync", "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Synced with EnvelopeLedger/ledger.json"));

    assert!(remote.path().join("EnvelopeLedger/ledger.json").exists());

    envelope(&data_dir)
        .args(["sync", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("local directory"));
}
