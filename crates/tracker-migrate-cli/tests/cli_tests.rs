//! CLI integration tests for tracker-migrate.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for error conditions that do not need a database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the tracker-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("tracker-migrate").unwrap()
}

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
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
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("summary"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--entity"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tracker-migrate"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_shutdown_timeout_default() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--shutdown-timeout"))
        .stdout(predicate::str::contains("[default: 60]"));
}

#[test]
fn test_output_json_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_log_format_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"));
}

#[test]
fn test_verbosity_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 1)
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    // Missing file is an IO error (code 7), not config error (code 1)
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let file = config_file("invalid: yaml: content: [\n");

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "summary"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_required_fields_exits_with_code_1() {
    // Valid YAML but no target section
    let file = config_file("source:\n  host: legacy\n  database: tsse\n  user: reader\n");

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run"])
        .assert()
        .code(1);
}

#[test]
fn test_same_source_and_target_exits_with_code_1() {
    let file = config_file(
        "source:\n  host: db\n  database: tracker\n  user: a\n\
         target:\n  host: db\n  database: tracker\n  user: b\n",
    );

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run", "--dry-run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_zero_chunk_size_exits_with_code_1() {
    let file = config_file(
        "source:\n  host: old\n  database: tsse\n  user: a\n\
         target:\n  host: new\n  database: unit3d\n  user: b\n\
         migration:\n  chunk_sizes:\n    peers: 0\n",
    );

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("migration.chunk_sizes.peers"));
}

// =============================================================================
// Argument Parsing Tests
// =============================================================================

#[test]
fn test_unknown_entity_rejected() {
    cmd()
        .args(["run", "--entity", "wiki"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown entity 'wiki'"));
}

#[test]
fn test_entity_names_accepted_before_config_load() {
    // Parsing succeeds; the missing config file is what stops the run.
    cmd()
        .args([
            "--config",
            "nonexistent_config_file.yaml",
            "run",
            "--entity",
            "users",
            "--entity",
            "forum-threads",
        ])
        .assert()
        .code(7);
}

// =============================================================================
// Subcommand Existence Tests
// =============================================================================

#[test]
fn test_health_check_command_exists() {
    cmd()
        .args(["health-check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Test database connections"));
}

#[test]
fn test_summary_command_exists() {
    cmd()
        .args(["summary", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("row counts per entity"));
}

// =============================================================================
// Config Path Tests
// =============================================================================

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_short_config_flag() {
    // -c should work as short for --config
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

// =============================================================================
// No Subcommand Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
