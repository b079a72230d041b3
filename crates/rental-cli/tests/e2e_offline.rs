//! E2E CLI tests that need neither a wiki nor a directory server:
//! - vocabularies and shell completions
//! - `rental user` against a directory loaded from a TOML file
//! - argument validation before anything is contacted
//! - `--verbose` lowering the default log filter
//!
//! Each test runs the `rental` binary as a subprocess with an isolated config.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

const PEOPLE: &str = r#"
[[entries]]
dn = "cn=abc12345,ou=people,o=uni-regensburg,c=de"
[entries.attributes]
objectClass = ["urrzUser"]
fullName = ["Erika Mustermann"]
mail = ["erika.mustermann@ur.de"]
groupMembership = ["cn=mi-staff,ou=mi,ou=sprachlit,o=uni-regensburg,c=de"]

[[entries]]
dn = "cn=xyz99999,ou=people,o=uni-regensburg,c=de"
[entries.attributes]
objectClass = ["urrzUser"]
fullName = ["Max Student"]
groupMembership = ["cn=students,o=uni-regensburg,c=de"]
"#;

/// Build a Command targeting the rental binary with no ambient configuration.
fn rental_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("rental"));
    cmd.env("RENTAL_LOG", "error");
    cmd.env_remove("RENTAL_CONFIG");
    cmd.env_remove("RENTAL_WIKI_TOKEN");
    cmd.env_remove("RENTAL_WIKI_SERVER");
    cmd.env_remove("FORMAT");
    cmd
}

/// Write a config whose directory is the `PEOPLE` fixture, returning its path.
fn write_config(dir: &Path, with_directory: bool) -> PathBuf {
    fs::write(dir.join("people.toml"), PEOPLE).expect("write people");
    let directory = if with_directory {
        "entries_file = \"people.toml\"\n"
    } else {
        ""
    };
    let config = format!(
        "[wiki]\nserver = \"http://127.0.0.1:9\"\ntimeout_secs = 1\n\n\
         [cache]\npersist = false\n\n\
         [directory]\nbase_dn = \"o=uni-regensburg,c=de\"\n{directory}"
    );
    let path = dir.join("rental.toml");
    fs::write(&path, config).expect("write config");
    path
}

/// The structured error rendered ahead of the process's final `Error:` line.
fn leading_json(stderr: &[u8]) -> Value {
    serde_json::Deserializer::from_slice(stderr)
        .into_iter::<Value>()
        .next()
        .expect("stderr should start with JSON")
        .expect("stderr JSON should parse")
}

fn json_stdout(output: &std::process::Output) -> Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

// ---------------------------------------------------------------------------
// Vocabularies & completions
// ---------------------------------------------------------------------------

#[test]
fn vocab_statuses_as_json_array() {
    let output = rental_cmd()
        .args(["vocab", "statuses", "--format", "json"])
        .output()
        .expect("vocab should not crash");
    let json = json_stdout(&output);
    let statuses = json.as_array().expect("array");
    assert!(statuses.iter().any(|s| s == "entliehen"));
    assert!(statuses.iter().any(|s| s == "verfügbar"));
}

#[test]
fn vocab_text_is_one_value_per_line() {
    rental_cmd()
        .args(["vocab", "types", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Laptop\n"));
}

#[test]
fn completions_mention_subcommands() {
    rental_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rental"))
        .stdout(predicate::str::contains("vocab"));
}

#[test]
fn help_lists_examples() {
    rental_cmd()
        .args(["rent", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("EXAMPLES:"));
}

// ---------------------------------------------------------------------------
// Directory lookup
// ---------------------------------------------------------------------------

#[test]
fn privileged_user_may_update() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(dir.path(), true);

    let output = rental_cmd()
        .arg("--config")
        .arg(&config)
        .args(["user", "abc12345", "--json"])
        .output()
        .expect("user should not crash");
    let json = json_stdout(&output);

    assert_eq!(json["name"], "Erika Mustermann");
    assert_eq!(json["email"], "erika.mustermann@ur.de");
    assert_eq!(json["groups"][0], "mi-staff.mi.sprachlit.uni-regensburg.de");
    let allowed: Vec<&str> = json["allowed"]
        .as_array()
        .expect("allowed array")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(allowed, ["read_item", "list_items", "update_item"]);
}

#[test]
fn student_only_reads() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(dir.path(), true);

    rental_cmd()
        .arg("--config")
        .arg(&config)
        .args(["user", "xyz99999", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("allowed\tread_item, list_items\n"));
}

#[test]
fn unknown_user_fails_with_structured_error() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(dir.path(), true);

    let output = rental_cmd()
        .arg("--config")
        .arg(&config)
        .args(["user", "nobody", "--json"])
        .output()
        .expect("user should not crash");
    assert!(!output.status.success());
    let err = leading_json(&output.stderr);
    assert_eq!(err["error"]["error_code"], "user_not_found");
}

#[test]
fn user_lookup_without_directory_is_explained() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(dir.path(), false);

    rental_cmd()
        .arg("--config")
        .arg(&config)
        .args(["user", "abc12345", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no directory configured"));
}

// ---------------------------------------------------------------------------
// Argument validation
// ---------------------------------------------------------------------------

#[test]
fn non_numeric_uid_is_rejected() {
    rental_cmd().args(["show", "readme"]).assert().failure();
}

#[test]
fn update_without_fields_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(dir.path(), false);

    rental_cmd()
        .arg("--config")
        .arg(&config)
        .args(["update", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to update"));
}

#[test]
fn broken_config_fails_with_path() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("rental.toml");
    fs::write(&path, "[wiki\nserver = ").expect("write config");

    rental_cmd()
        .arg("--config")
        .arg(&path)
        .args(["list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("rental.toml"));
}

#[test]
fn broken_config_has_config_error_code() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("rental.toml");
    fs::write(&path, "[cache]\npersist = \"sometimes\"\n").expect("write config");

    let output = rental_cmd()
        .arg("--config")
        .arg(&path)
        .args(["list", "--json"])
        .output()
        .expect("list should not crash");
    assert!(!output.status.success());
    let err = leading_json(&output.stderr);
    assert_eq!(err["error"]["error_code"], "E1002");
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[test]
fn verbose_flag_enables_debug_logs() {
    rental_cmd()
        .env_remove("RENTAL_LOG")
        .env_remove("DEBUG")
        .args(["-v", "vocab", "statuses"])
        .assert()
        .success()
        .stderr(predicate::str::contains("starting"));

    rental_cmd()
        .env_remove("RENTAL_LOG")
        .env_remove("DEBUG")
        .args(["vocab", "statuses"])
        .assert()
        .success()
        .stderr(predicate::str::contains("starting").not());
}
