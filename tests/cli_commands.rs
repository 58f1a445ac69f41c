//! CLI integration tests: rule management and dry-run application.
//!
//! None of these touch the system clipboard.

use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn postclip(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("postclip"));
    cmd.current_dir(dir.path()).env_remove("POSTCLIP_RULES");
    cmd
}

#[test]
fn add_then_list_shows_rules_in_order() {
    let dir = TempDir::new().unwrap();

    postclip(&dir).args(["add", "cat", "dog"]).assert().success();
    postclip(&dir).args(["add", r"(\d+)", "#$1"]).assert().success();

    postclip(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("0: cat -> dog"))
        .stdout(predicate::str::contains(r"1: (\d+) -> #$1"));

    assert_eq!(
        fs::read_to_string(dir.path().join("rules.txt")).unwrap(),
        "cat -> dog\n(\\d+) -> #$1\n"
    );
}

#[test]
fn list_json_is_machine_readable() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("rules.txt"), "a -> b\n").unwrap();

    let output = postclip(&dir).args(["list", "--json"]).output().unwrap();
    assert!(output.status.success());
    let rules: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rules[0]["pattern"], "a");
    assert_eq!(rules[0]["replacement"], "b");
}

#[test]
fn invalid_pattern_is_rejected_and_not_saved() {
    let dir = TempDir::new().unwrap();

    postclip(&dir)
        .args(["add", "(", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("#0"));

    assert!(!dir.path().join("rules.txt").exists());
}

#[test]
fn remove_out_of_range_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("rules.txt"), "a -> b\n").unwrap();

    postclip(&dir)
        .args(["remove", "9"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No rule at index 9"));
    postclip(&dir)
        .args(["remove", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed rule #0: a -> b"));

    assert_eq!(fs::read_to_string(dir.path().join("rules.txt")).unwrap(), "");
}

#[test]
fn apply_reads_stdin_and_skips_bad_rules() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("rules.txt"), "[ -> x\ncat -> dog\njusttext\n").unwrap();

    postclip(&dir)
        .arg("apply")
        .write_stdin("I have a cat.")
        .assert()
        .success()
        .stdout("I have a dog.")
        .stderr(predicate::str::contains("warning"));
}

#[test]
fn rules_flag_selects_another_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("other.txt"), "a -> b\nb -> c\n").unwrap();

    postclip(&dir)
        .args(["--rules", "other.txt", "apply", "a"])
        .assert()
        .success()
        .stdout("c");
}

#[test]
fn watch_help_explains_background_shutdown() {
    let dir = TempDir::new().unwrap();

    postclip(&dir)
        .args(["watch", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("runs until the process is killed"))
        .stdout(predicate::str::contains("released at process exit"));
}

#[test]
fn add_rejects_rule_that_cannot_be_saved_verbatim() {
    let dir = TempDir::new().unwrap();
    postclip(&dir).args(["add", "a", "b"]).assert().success();

    postclip(&dir).args(["add", " x ", "y"]).assert().failure();
    postclip(&dir).args(["add", ", ", "\n"]).assert().failure();

    assert_eq!(fs::read_to_string(dir.path().join("rules.txt")).unwrap(), "a -> b\n");
}
