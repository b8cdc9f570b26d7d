//! CLI integration tests for tuplegen.
//!
//! These tests verify command-line argument parsing, help output,
//! exit codes, and a full run against a temporary SQLite database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Get a command for the tuplegen binary.
fn cmd() -> Command {
    Command::cargo_bin("tuplegen").unwrap()
}

/// Write a SQLite configuration into `dir` and return its path.
fn sqlite_config(dir: &Path) -> PathBuf {
    let config = dir.join("tuplegen.yaml");
    std::fs::write(
        &config,
        format!(
            "database:\n  dialect: sqlite\n  path: {}\ncodegen:\n  code_dir: {}\n",
            dir.join("app.db").display(),
            dir.join("generated").display()
        ),
    )
    .unwrap();
    config
}

fn write_migrations(dir: &Path, files: &[(&str, &str)]) -> PathBuf {
    let migrations = dir.join("migrations");
    std::fs::create_dir_all(&migrations).unwrap();
    for (name, sql) in files {
        std::fs::write(migrations.join(name), sql).unwrap();
    }
    migrations
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("probe"))
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_generate_subcommand_help() {
    cmd()
        .args(["generate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--name"))
        .stdout(predicate::str::contains("--query"))
        .stdout(predicate::str::contains("--table"));
}

#[test]
fn test_migrate_subcommand_help() {
    cmd()
        .args(["migrate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dir"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tuplegen"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_global_flag_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("[default: tuplegen.yaml]"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_probe_requires_query_or_table() {
    cmd()
        .args(["probe"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--query"));
}

#[test]
fn test_probe_rejects_query_and_table() {
    cmd()
        .args(["probe", "--query", "SELECT 1", "--table", "t"])
        .assert()
        .code(2);
}

// =============================================================================
// Exit Code Tests - Config Errors
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_1() {
    // A missing file is an IO error, not a config error
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2);
}

#[test]
fn test_sqlite_without_path_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "database:").unwrap();
    writeln!(file, "  dialect: sqlite").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("database.path"));
}

// =============================================================================
// SQLite Runs
// =============================================================================

#[test]
fn test_health_check_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(dir.path());

    cmd()
        .args(["--config", config.to_str().unwrap(), "health-check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn test_migrate_generate_destroy() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(dir.path());
    let config = config.to_str().unwrap();
    let migrations = write_migrations(
        dir.path(),
        &[
            ("001_item.sql", "CREATE TABLE item (id INTEGER PRIMARY KEY, name TEXT);"),
            (
                "002_seed.sql",
                "INSERT INTO item (id, name) VALUES (1, 'bolt');\nINSERT INTO item (id, name) VALUES (2, 'nut');",
            ),
            ("notes.txt", "not a migration"),
        ],
    );

    cmd()
        .args(["--config", config, "migrate", "--dir", migrations.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Steps applied: 2"));

    cmd()
        .args(["--config", config, "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Schema version: 2"));

    cmd()
        .args(["--config", config, "--output-json", "migrate", "--dir", migrations.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"applied\": 0"));

    cmd()
        .args(["--config", config, "probe", "--table", "item"])
        .assert()
        .success()
        .stdout(predicate::str::contains("id"))
        .stdout(predicate::str::contains("name"));

    cmd()
        .args(["--config", config, "generate", "--name", "Item", "--table", "item"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Built tuplegen.generated.Item version 1"));
    assert!(dir.path().join("generated/tuplegen/generated/Item.rs").exists());

    cmd()
        .args(["--config", config, "destroy", "--name", "Item"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed tuplegen.generated.Item"));
}

#[test]
fn test_failed_migration_exits_with_code_5() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(dir.path());
    let migrations = write_migrations(
        dir.path(),
        &[
            ("001_ok.sql", "CREATE TABLE a (id INTEGER);"),
            ("002_bad.sql", "INSERT INTO missing VALUES (1);"),
        ],
    );

    cmd()
        .args(["--config", config.to_str().unwrap(), "migrate", "--dir", migrations.to_str().unwrap()])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("002_bad.sql"));

    cmd()
        .args(["--config", config.to_str().unwrap(), "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Schema version: 1"));
}

#[test]
fn test_probe_missing_table_exits_with_code_3() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(dir.path());

    cmd()
        .args(["--config", config.to_str().unwrap(), "probe", "--table", "nothing_here"])
        .assert()
        .code(3);
}
