//! End-to-end tests of the command line interface.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn cli(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tap_release_manager").unwrap();
    cmd.env_remove("GITHUB_TOKEN")
        .env_remove("GITHUB_REPOSITORY")
        .env_remove("RUST_LOG")
        .arg("--root")
        .arg(root);
    cmd
}

fn tap_with_uploads(names: &[&str]) -> tempfile::TempDir {
    let temp = tempfile::tempdir().unwrap();
    let upload = temp.path().join("upload");
    fs::create_dir_all(&upload).unwrap();
    for name in names {
        fs::write(upload.join(name), b"payload").unwrap();
    }
    temp
}

#[test]
fn check_accepts_canonical_names() {
    let tap = tap_with_uploads(&["MyTool-1.0.2.dmg", "Other-0.3.0.pkg"]);

    cli(tap.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("MyTool-1.0.2.dmg (MyTool 1.0.2)"));
}

#[test]
fn check_reports_every_invalid_name() {
    let tap = tap_with_uploads(&["MyTool-1.0.2.dmg", "bad name.zip", "Tool_2.0.1.zip"]);

    cli(tap.path())
        .arg("check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("'bad name.zip'"))
        .stderr(predicate::str::contains("'Tool_2.0.1.zip'"))
        .stderr(predicate::str::contains("2 of 3 files"));
}

#[test]
fn check_on_empty_inbox_succeeds() {
    let tap = tap_with_uploads(&[]);

    cli(tap.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("No files found"));
}

#[test]
fn release_without_token_fails_before_writing() {
    let tap = tap_with_uploads(&["MyTool-1.0.2.dmg"]);

    cli(tap.path())
        .args(["release", "--repository", "acme/tap"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GITHUB_TOKEN"));

    assert!(!tap.path().join("Casks").exists());
    assert!(!tap.path().join("state.json").exists());
    assert!(tap.path().join("upload/MyTool-1.0.2.dmg").exists());
}

#[test]
fn release_dry_run_plans_without_writing() {
    let tap = tap_with_uploads(&["MyTool-1.0.2.dmg"]);
    fs::write(
        tap.path().join("state.json"),
        r#"{"version": "0.4.1", "history": []}"#,
    )
    .unwrap();

    cli(tap.path())
        .env("GITHUB_REPOSITORY", "acme/tap")
        .args(["release", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("New Repo Version:     0.5.0 (minor)"))
        .stdout(predicate::str::contains("create Casks/my-tool.rb -> 1.0.2"));

    assert!(!tap.path().join("Casks").exists());
    assert_eq!(
        fs::read_to_string(tap.path().join("state.json")).unwrap(),
        r#"{"version": "0.4.1", "history": []}"#
    );
}

#[test]
fn preprocess_leaves_canonical_inbox_untouched() {
    let tap = tap_with_uploads(&["MyTool-1.0.2.dmg"]);

    cli(tap.path()).arg("preprocess").assert().success();

    assert_eq!(
        fs::read(tap.path().join("upload/MyTool-1.0.2.dmg")).unwrap(),
        b"payload"
    );
}
