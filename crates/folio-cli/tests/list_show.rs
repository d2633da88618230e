//! Integration tests for `folio list` and `folio show`.

use std::fs;
use std::thread;
use std::time::Duration;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_list_empty_book() {
    let temp = TempDir::new().unwrap();

    cargo_bin_cmd!("folio")
        .args(["--book", temp.path().to_str().unwrap(), "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No pages found."));
}

#[test]
fn test_list_shows_titles_newest_first() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("groceries.txt"), "Groceries\nmilk\neggs\n").unwrap();
    thread::sleep(Duration::from_millis(20));
    fs::write(temp.path().join("ideas.txt"), "Ideas\nwrite more tests\n").unwrap();

    let assert = cargo_bin_cmd!("folio")
        .args(["--book", temp.path().to_str().unwrap(), "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Groceries"))
        .stdout(predicate::str::contains("Ideas"));

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let ideas_pos = stdout.find("Ideas").unwrap();
    let groceries_pos = stdout.find("Groceries").unwrap();
    assert!(ideas_pos < groceries_pos, "newer page must list first");
}

#[test]
fn test_list_json_output() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("note.txt"), "A Note\nbody\n").unwrap();

    let assert = cargo_bin_cmd!("folio")
        .args(["--book", temp.path().to_str().unwrap(), "list", "--json"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let rows: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(rows[0]["name"], "note");
    assert_eq!(rows[0]["title"], "A Note");
}

#[test]
fn test_show_prints_mirror_text() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("note.txt"), "line one\nline two\n").unwrap();

    cargo_bin_cmd!("folio")
        .args(["--book", temp.path().to_str().unwrap(), "show", "note"])
        .assert()
        .success()
        .stdout("line one\nline two\n");
}

#[test]
fn test_show_missing_page_fails() {
    let temp = TempDir::new().unwrap();

    cargo_bin_cmd!("folio")
        .args(["--book", temp.path().to_str().unwrap(), "show", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_show_survives_corrupt_log() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("note.txt"), "mirror text\n").unwrap();
    fs::write(temp.path().join("note.log"), "not-a-real-tag\njunk\n").unwrap();

    cargo_bin_cmd!("folio")
        .args(["--book", temp.path().to_str().unwrap(), "show", "note"])
        .assert()
        .success()
        .stdout("mirror text\n");
}
