use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::{fs, path::Path, process::Command};

fn bin_cmd(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("locsync").expect("locsync binary built");
    cmd.current_dir(cwd).env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("locsync.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    bin_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("stats"))
        .stdout(predicate::str::contains("schema"));
}

#[test]
fn schema_writes_report_schemas() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("schemas");
    bin_cmd(dir.path())
        .args(["schema", "--out-dir"])
        .arg(&out)
        .assert()
        .success();
    for name in [
        "sync_summary.schema.json",
        "project_report.schema.json",
        "project_stats.schema.json",
    ] {
        let text = fs::read_to_string(out.join(name)).unwrap();
        let schema: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(schema.get("title").is_some(), "{name}");
    }
}

#[test]
fn unknown_project_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    bin_cmd(dir.path())
        .args(["sync", "nope", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown project(s): nope"));
}

#[test]
fn failed_project_exits_non_zero_with_a_report() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("plain/en-US")).unwrap();
    let config = write_config(
        dir.path(),
        r#"
[[projects]]
slug = "app"
locales = ["de"]

[[projects.repositories]]
url = "https://example.com/app.git"
path = "plain"
"#,
    );
    let out = bin_cmd(dir.path())
        .args(["sync", "--no-pull", "--format", "json", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    let summary: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(summary["projects"][0]["slug"], "app");
    assert_eq!(summary["projects"][0]["status"], "failed");
    assert!(summary["projects"][0]["error"].is_string());
}

#[test]
fn stats_on_empty_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db.sqlite3");
    bin_cmd(dir.path())
        .args(["stats", "--format", "json", "--database"])
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
    bin_cmd(dir.path())
        .args(["stats", "app", "--database"])
        .arg(&db)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown project: app"));
}
