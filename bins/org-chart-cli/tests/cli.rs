// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn org_chart(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("org-chart").unwrap();
    cmd.arg("--data-dir").arg(dir.path());
    cmd
}

fn add(dir: &TempDir, id: &str, name: &str, manager: Option<&str>) {
    let mut cmd = org_chart(dir);
    cmd.args(["add", "--id", id, "--name", name, "--designation", "Engineer"]);
    if let Some(manager) = manager {
        cmd.args(["--manager", manager]);
    }
    cmd.assert().success().stdout(predicate::str::contains(id));
}

#[test]
fn employees_persist_between_invocations() {
    let dir = tempfile::tempdir().unwrap();
    add(&dir, "e1", "Ada", None);
    add(&dir, "e2", "Bo", Some("e1"));

    org_chart(&dir)
        .arg("tree")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ada (Engineer) [e1]"))
        .stdout(predicate::str::contains("  Bo (Engineer) [e2]"));

    org_chart(&dir)
        .args(["chain", "e2"])
        .assert()
        .success()
        .stdout("Ada > Bo\n");

    assert!(dir.path().join("orgChart.value").exists());
}

#[test]
fn cyclic_reassignment_fails_with_message() {
    let dir = tempfile::tempdir().unwrap();
    add(&dir, "e1", "Ada", None);
    add(&dir, "e2", "Bo", Some("e1"));

    org_chart(&dir)
        .args(["reassign", "e1", "--manager", "e2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("circular"));
}

#[test]
fn unknown_manager_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    org_chart(&dir)
        .args(["add", "--name", "Orphan", "--manager", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("manager not found: ghost"));
}

#[test]
fn delete_reassigns_reports_and_list_pages() {
    let dir = tempfile::tempdir().unwrap();
    add(&dir, "e1", "Ada", None);
    add(&dir, "e2", "Bo", Some("e1"));
    add(&dir, "e3", "Cy", Some("e2"));

    org_chart(&dir)
        .args(["delete", "e2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 reports reassigned"));

    org_chart(&dir)
        .args(["show", "e3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("manager:     Ada [e1]"));

    org_chart(&dir)
        .args(["list", "--per-page", "1", "--page", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cy"))
        .stdout(predicate::str::contains("page 2 of 2 (2 employees)"));
}

#[test]
fn bookmarks_toggle() {
    let dir = tempfile::tempdir().unwrap();
    add(&dir, "e1", "Ada", None);
    org_chart(&dir)
        .args(["bookmark", "e1"])
        .assert()
        .success()
        .stdout("bookmarked e1\n");
    org_chart(&dir)
        .args(["bookmark", "e1"])
        .assert()
        .success()
        .stdout("removed bookmark e1\n");
}

#[test]
fn designations_and_prefs() {
    let dir = tempfile::tempdir().unwrap();
    org_chart(&dir)
        .args(["designations", "add", "Staff Engineer"])
        .assert()
        .success();
    org_chart(&dir)
        .args(["designations", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Staff Engineer"));
    org_chart(&dir)
        .args(["designations", "add", "Staff Engineer"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    org_chart(&dir).args(["theme", "toggle"]).assert().success().stdout("dark\n");
    org_chart(&dir).args(["view", "grid"]).assert().success();
    org_chart(&dir).arg("view").assert().success().stdout("grid\n");
}

#[test]
fn clear_requires_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    add(&dir, "e1", "Ada", None);
    org_chart(&dir).arg("clear").assert().failure();
    org_chart(&dir).args(["clear", "--yes"]).assert().success();
    org_chart(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("employees:         0"));
}
