//! End-to-end tests of the `tern` binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn tern() -> Command {
    Command::cargo_bin("tern").unwrap()
}

#[test]
fn test_help_lists_flags() {
    tern()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--watch-files"))
        .stdout(predicate::str::contains("--build-static"))
        .stdout(predicate::str::contains("--disable-spa"));
}

#[test]
fn test_diagnostic_levels_conflict() {
    tern()
        .args(["--ts-warning", "--ts-error"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_one_shot_modes_conflict() {
    tern()
        .args(["--build-static", "--install-wasm"])
        .assert()
        .failure();
}

#[test]
fn test_invalid_target_rejected() {
    tern().args(["--target", "es1999"]).assert().failure();
}

#[test]
fn test_build_static_writes_dist() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("index.html"), "<html><head></head></html>").unwrap();
    fs::write(temp.path().join("main.ts"), "export const x: number = 1;\n").unwrap();

    tern()
        .arg("--build-static")
        .arg("--root")
        .arg(temp.path())
        .env("NO_COLOR", "1")
        .assert()
        .success();

    assert!(temp.path().join("dist/index.html").exists());
    let main = fs::read_to_string(temp.path().join("dist/main.js")).unwrap();
    assert!(main.contains("System.register"));
}

#[test]
fn test_missing_root_reports_error() {
    tern()
        .args(["--root", "/definitely/not/here"])
        .assert()
        .failure();
}
