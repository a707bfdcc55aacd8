//! CLI integration tests for bq-transfer.
//!
//! These tests verify command-line argument parsing, help output,
//! plan rendering, and exit codes for various error conditions.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Variable the test configs read the token from; never set.
const TOKEN_ENV: &str = "BQ_TRANSFER_CLI_TEST_TOKEN";

const VALID_CONFIG: &str = r#"
dag_id: bq_transfer_dataset
connection:
  access_token_env: BQ_TRANSFER_CLI_TEST_TOKEN
source:
  project: practical-case-436315-t2
  dataset: surv_source_dataset
  table: surv_emp_gb
export:
  bucket: surv_data_migration
  file_name: surv_emp_gb.csv
destination:
  project: practical-case-436315-t2
  dataset: surv_target_dataset
  table: surv_emp_all
"#;

/// Get a command for the bq-transfer binary.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("bq-transfer").unwrap();
    cmd.env_remove(TOKEN_ENV);
    cmd
}

fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
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
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("health-check"))
        .stdout(predicate::str::contains("validate-config"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--retries"))
        .stdout(predicate::str::contains("--no-cleanup"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bq-transfer"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_global_flags_exist() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--state-file"))
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--run-id"))
        .stdout(predicate::str::contains("[default: config.yaml]"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    // Missing file is an IO error (code 7), not config error (code 1)
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "validate-config"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let file = config_file("invalid: yaml: content: [\n");

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate-config"])
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .code(1);
}

#[test]
fn test_invalid_identifier_exits_with_code_1() {
    let file = config_file(&VALID_CONFIG.replace("surv_data_migration", "Bad Bucket"));

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate-config"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_missing_token_exits_with_code_2() {
    let file = config_file(VALID_CONFIG);

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(TOKEN_ENV));
}

#[test]
fn test_health_check_without_token_exits_with_code_2() {
    let file = config_file(VALID_CONFIG);

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2);
}

// =============================================================================
// Offline Command Tests
// =============================================================================

#[test]
fn test_validate_config() {
    let file = config_file(VALID_CONFIG);

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate-config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_validate_config_shows_owner() {
    let file = config_file(&format!("owner: data-eng\n{}", VALID_CONFIG));

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate-config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("owner data-eng"))
        .stdout(predicate::str::contains("Schedule: none"));
}

#[test]
fn test_scheduled_config_exits_with_code_1() {
    let file = config_file(&format!("schedule: \"@daily\"\n{}", VALID_CONFIG));

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate-config"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("schedule"));
}

#[test]
fn test_plan_lists_task_ids() {
    let file = config_file(VALID_CONFIG);

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "--run-id",
            "manual-1",
            "plan",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("execute_query"))
        .stdout(predicate::str::contains("extract_to_gcs"))
        .stdout(predicate::str::contains("load_csv"))
        .stdout(predicate::str::contains(
            "SELECT 'GB', a.* FROM `practical-case-436315-t2.surv_source_dataset.surv_emp_gb` a",
        ))
        .stdout(predicate::str::contains("temporary_table_manual1"))
        .stdout(predicate::str::contains(
            "gs://surv_data_migration/surv_emp_gb_manual1.csv",
        ));
}

#[test]
fn test_plan_json() {
    let file = config_file(VALID_CONFIG);

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "--output-json",
            "--run-id",
            "abc",
            "plan",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"run_id\": \"abc\""))
        .stdout(predicate::str::contains("\"write_disposition\": \"append\""));
}

#[test]
fn test_dry_run_calls_no_service() {
    let file = config_file(VALID_CONFIG);

    // No token is set: a real run would fail with code 2.
    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "run",
            "--dry-run",
            "--no-cleanup",
        ])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"cleanup\s+skipped").unwrap())
        .stdout(predicate::str::contains("Dry run"));
}

#[test]
fn test_invalid_run_id_exits_with_code_1() {
    let file = config_file(VALID_CONFIG);

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "--run-id",
            "---",
            "plan",
        ])
        .assert()
        .code(1);
}
