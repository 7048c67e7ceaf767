//! Integration tests for the `sql-audit` scanner binary (spec.md §6).

use std::io::Write;

use assert_cmd::{Command, cargo::cargo_bin_cmd};
use predicates::prelude::*;
use tempfile::tempdir;

fn cmd() -> Command {
    cargo_bin_cmd!("sql-audit")
}

#[test]
fn missing_project_path_exits_with_invalid_arguments_code() {
    cmd().assert().failure().code(2);
}

#[test]
fn clean_project_exits_zero() {
    let dir = tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join("ok.sql")).unwrap();
    writeln!(file, "SELECT id FROM orders WHERE id = 1 ORDER BY id LIMIT 10;").unwrap();

    cmd()
        .args(["--project-path", dir.path().to_str().unwrap()])
        .assert()
        .success();
}

#[test]
fn critical_finding_with_fail_on_critical_exits_one() {
    let dir = tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join("purge.sql")).unwrap();
    writeln!(file, "DELETE FROM orders;").unwrap();

    cmd()
        .args(["--project-path", dir.path().to_str().unwrap(), "--fail-on-critical"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn critical_finding_without_fail_on_critical_still_exits_zero() {
    let dir = tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join("purge.sql")).unwrap();
    writeln!(file, "DELETE FROM orders;").unwrap();

    cmd()
        .args(["--project-path", dir.path().to_str().unwrap()])
        .assert()
        .success();
}

#[test]
fn report_lists_checker_id_and_recommendation() {
    let dir = tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join("purge.sql")).unwrap();
    writeln!(file, "DELETE FROM orders;").unwrap();

    cmd()
        .args(["--project-path", dir.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("NoWhereClause").and(predicate::str::contains("WHERE")));
}

#[test]
fn quiet_suppresses_the_finding_list() {
    let dir = tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join("purge.sql")).unwrap();
    writeln!(file, "DELETE FROM orders;").unwrap();

    cmd()
        .args(["--project-path", dir.path().to_str().unwrap(), "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn output_file_receives_the_rendered_report() {
    let dir = tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join("purge.sql")).unwrap();
    writeln!(file, "DELETE FROM orders;").unwrap();
    let output_path = dir.path().join("report.txt");

    cmd()
        .args([
            "--project-path",
            dir.path().to_str().unwrap(),
            "--output-file",
            output_path.to_str().unwrap()
        ])
        .assert()
        .success();

    let rendered = std::fs::read_to_string(&output_path).unwrap();
    assert!(rendered.contains("NoWhereClause"));
}

#[test]
fn nonexistent_project_path_is_a_scan_error() {
    cmd()
        .args(["--project-path", "/definitely/does/not/exist/xyz"])
        .assert()
        .failure()
        .code(1);
}
