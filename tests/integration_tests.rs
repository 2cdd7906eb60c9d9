//! Integration tests for Stagehand
//!
//! These tests drive the binary end to end against temporary projects.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

/// Helper to create a stagehand Command isolated from the caller's environment
fn stagehand() -> Command {
    let mut cmd = cargo_bin_cmd!("stagehand");
    cmd.env_remove("STAGEHAND_STATE_FILE")
        .env_remove("STAGEHAND_DOCS_ROOT")
        .env_remove("STAGEHAND_PROCESSOR_CMD")
        .env_remove("RUST_LOG");
    cmd
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Helper to run a command with `--json` and parse its output
fn json(dir: &TempDir, args: &[&str]) -> Value {
    let output = stagehand()
        .current_dir(dir.path())
        .arg("--json")
        .args(args)
        .output()
        .unwrap();
    assert!(output.status.success(), "command {:?} exited non-zero", args);
    serde_json::from_slice(&output.stdout).unwrap()
}

fn read_state(dir: &TempDir) -> Value {
    let content = fs::read_to_string(dir.path().join(".stagehand/pipeline.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_stagehand_help() {
        stagehand()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("approve"));
    }

    #[test]
    fn test_stagehand_version() {
        stagehand().arg("--version").assert().success();
    }

    #[test]
    fn test_init_creates_structure() {
        let dir = create_temp_project();

        stagehand()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized stagehand project"));

        assert!(dir.path().join(".stagehand").exists());
        assert!(dir.path().join(".stagehand/stagehand.toml").exists());
    }

    #[test]
    fn test_init_idempotent() {
        let dir = create_temp_project();

        stagehand().current_dir(dir.path()).arg("init").assert().success();

        stagehand()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already initialized"));
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        stagehand().arg("deploy").assert().failure();
    }
}

// =============================================================================
// Pipeline Flow Tests
// =============================================================================

mod pipeline_flow {
    use super::*;

    #[test]
    fn test_status_without_state_shows_defaults() {
        let dir = create_temp_project();

        stagehand()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("new-feature"))
            .stdout(predicate::str::contains("0/8"));
    }

    #[test]
    fn test_start_continue_approve() {
        let dir = create_temp_project();

        stagehand()
            .current_dir(dir.path())
            .args(["start", "login-redesign", "improve login UX"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Started pipeline for login-redesign"));

        let state = read_state(&dir);
        assert_eq!(state["schema_version"], 1);
        assert_eq!(state["current_stage"], "spec");

        let outcome = json(&dir, &["continue"]);
        assert_eq!(outcome["success"], true);
        assert_eq!(outcome["stage"], "spec");
        assert_eq!(outcome["status"]["current_status"], "pending");
        assert!(dir.path().join("docs/specs/login-redesign.md").exists());

        let outcome = json(&dir, &["approve", "spec"]);
        assert_eq!(outcome["success"], true);
        assert_eq!(outcome["stage"], "tech");

        let status = json(&dir, &["status"]);
        assert_eq!(status["status"]["progress"], "1/8");
        assert_eq!(status["status"]["stages"]["spec"], "approved");
        assert_eq!(status["status"]["current_stage"], "tech");
    }

    #[test]
    fn test_input_is_recorded_for_current_stage() {
        let dir = create_temp_project();
        stagehand()
            .current_dir(dir.path())
            .args(["start", "billing"])
            .assert()
            .success();

        stagehand()
            .current_dir(dir.path())
            .args(["input", "finance", "team", "only"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Input recorded for spec stage"));

        let state = read_state(&dir);
        assert_eq!(state["user_input"]["spec"], "finance team only");
    }

    #[test]
    fn test_unknown_stage_is_a_soft_failure() {
        let dir = create_temp_project();
        stagehand()
            .current_dir(dir.path())
            .args(["start", "billing"])
            .assert()
            .success();

        let outcome = json(&dir, &["approve", "deploy"]);
        assert_eq!(outcome["success"], false);
        assert!(outcome["message"].as_str().unwrap().contains("deploy"));

        stagehand()
            .current_dir(dir.path())
            .args(["approve", "deploy"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Unknown stage"));
    }

    #[test]
    fn test_out_of_order_approval_is_refused() {
        let dir = create_temp_project();
        stagehand()
            .current_dir(dir.path())
            .args(["start", "billing"])
            .assert()
            .success();

        let outcome = json(&dir, &["approve", "sec"]);
        assert_eq!(outcome["success"], false);
        assert_eq!(read_state(&dir)["stages"]["sec"], "pending");
    }

    #[test]
    fn test_direct_stage_execution() {
        let dir = create_temp_project();
        stagehand()
            .current_dir(dir.path())
            .args(["start", "billing"])
            .assert()
            .success();

        let outcome = json(&dir, &["perf"]);
        assert_eq!(outcome["stage"], "perf");
        assert!(dir.path().join("docs/performance/billing.md").exists());
        assert_eq!(read_state(&dir)["current_stage"], "perf");
    }

    #[test]
    fn test_select_alternative_by_index() {
        let dir = create_temp_project();
        stagehand()
            .current_dir(dir.path())
            .args(["start", "billing"])
            .assert()
            .success();
        json(&dir, &["continue"]);

        let outcome = json(&dir, &["select", "2"]);
        assert_eq!(outcome["success"], true);
        let state = read_state(&dir);
        assert_eq!(state["selected_alternatives"]["spec"]["id"], "alternative-2");
    }

    #[test]
    fn test_reject_marks_stage_failed() {
        let dir = create_temp_project();
        stagehand()
            .current_dir(dir.path())
            .args(["start", "billing"])
            .assert()
            .success();

        let outcome = json(&dir, &["reject", "spec", "--reason", "too vague"]);
        assert_eq!(outcome["success"], true);
        let state = read_state(&dir);
        assert_eq!(state["stages"]["spec"], "failed");
        assert_eq!(state["current_status"], "failed");
    }
}

// =============================================================================
// Emergency Stop Tests
// =============================================================================

mod emergency_stop {
    use super::*;

    #[test]
    fn test_halt_blocks_continue_until_resume() {
        let dir = create_temp_project();
        stagehand()
            .current_dir(dir.path())
            .args(["start", "billing"])
            .assert()
            .success();

        let outcome = json(&dir, &["halt", "production", "incident"]);
        assert_eq!(outcome["success"], true);
        assert_eq!(read_state(&dir)["notes"], "EMERGENCY STOP: production incident");

        let blocked = json(&dir, &["continue"]);
        assert_eq!(blocked["success"], false);
        assert!(
            blocked["message"]
                .as_str()
                .unwrap()
                .contains("production incident")
        );
        assert_eq!(read_state(&dir)["stages"]["spec"], "pending");

        let resumed = json(&dir, &["resume"]);
        assert_eq!(resumed["success"], true);
        assert_eq!(read_state(&dir)["emergency_stop"], false);

        let again = json(&dir, &["resume"]);
        assert_eq!(again["success"], false);
    }
}

// =============================================================================
// Run Loop Tests
// =============================================================================

mod run_loop {
    use super::*;

    #[test]
    fn test_run_yes_completes_pipeline() {
        let dir = create_temp_project();
        stagehand()
            .current_dir(dir.path())
            .args(["start", "search", "full text search"])
            .assert()
            .success();

        stagehand()
            .current_dir(dir.path())
            .args(["run", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("8/8"));

        let state = read_state(&dir);
        assert_eq!(state["current_stage"], "completed");
        assert_eq!(state["current_status"], "approved");
        for category in [
            "specs",
            "design",
            "implementation",
            "testing",
            "security",
            "performance",
            "user",
            "release",
        ] {
            assert!(
                dir.path().join("docs").join(category).join("search.md").exists(),
                "missing {} artifact",
                category
            );
        }
    }

    #[test]
    fn test_run_without_pipeline_reports_missing_state() {
        let dir = create_temp_project();
        stagehand()
            .current_dir(dir.path())
            .args(["run", "--yes"])
            .assert()
            .success()
            .stderr(predicate::str::contains("stagehand start"));
    }

    #[test]
    fn test_continue_after_completion_is_terminal() {
        let dir = create_temp_project();
        stagehand()
            .current_dir(dir.path())
            .args(["start", "search"])
            .assert()
            .success();
        stagehand()
            .current_dir(dir.path())
            .args(["run", "--yes"])
            .assert()
            .success();

        let outcome = json(&dir, &["continue"]);
        assert_eq!(outcome["success"], true);
        assert_eq!(outcome["stage"], "completed");
        assert_eq!(outcome["response"]["requiresApproval"], false);
    }
}

// =============================================================================
// Configuration Tests
// =============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_config_init_and_show() {
        let dir = create_temp_project();

        stagehand()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created stagehand.toml"));

        stagehand()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[pipeline]"))
            .stdout(predicate::str::contains("built-in agents"));
    }

    #[test]
    fn test_config_validate_reports_unknown_stage() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".stagehand")).unwrap();
        fs::write(
            dir.path().join(".stagehand/stagehand.toml"),
            "[stages.deploy]\nrequire_approval = false\n",
        )
        .unwrap();

        stagehand()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("stages.deploy"));
    }

    #[test]
    fn test_invalid_config_is_a_hard_error() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".stagehand")).unwrap();
        fs::write(dir.path().join(".stagehand/stagehand.toml"), "[pipeline\n").unwrap();

        stagehand()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .failure();
    }

    #[test]
    fn test_state_file_flag_and_env() {
        let dir = create_temp_project();

        stagehand()
            .current_dir(dir.path())
            .args(["--state-file", "custom/state.json", "start", "billing"])
            .assert()
            .success();
        assert!(dir.path().join("custom/state.json").exists());

        stagehand()
            .current_dir(dir.path())
            .env("STAGEHAND_STATE_FILE", "env-state.json")
            .args(["start", "payments"])
            .assert()
            .success();
        assert!(dir.path().join("env-state.json").exists());
    }

    #[test]
    fn test_stage_without_approval_auto_advances() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".stagehand")).unwrap();
        fs::write(
            dir.path().join(".stagehand/stagehand.toml"),
            "[stages.spec]\nrequire_approval = false\n",
        )
        .unwrap();

        stagehand()
            .current_dir(dir.path())
            .args(["start", "billing"])
            .assert()
            .success();
        json(&dir, &["input", "finance team"]);

        let outcome = json(&dir, &["continue"]);
        assert_eq!(outcome["success"], true);
        assert_eq!(outcome["status"]["current_stage"], "tech");
        assert_eq!(read_state(&dir)["stages"]["spec"], "approved");
    }

    #[cfg(unix)]
    #[test]
    fn test_external_processor_command() {
        let dir = create_temp_project();
        let script = dir.path().join("agent.sh");
        fs::write(
            &script,
            "#!/bin/sh\ncat > /dev/null\necho '{\"success\": true, \"message\": \"external '\"$STAGEHAND_STAGE\"'\", \"requiresApproval\": true}'\n",
        )
        .unwrap();

        stagehand()
            .current_dir(dir.path())
            .args(["start", "billing"])
            .assert()
            .success();
        fs::create_dir_all(dir.path().join(".stagehand")).unwrap();
        fs::write(
            dir.path().join(".stagehand/stagehand.toml"),
            format!("[processor]\ncommand = \"sh\"\nargs = [\"{}\"]\n", script.display()),
        )
        .unwrap();

        let outcome = json(&dir, &["continue"]);
        assert_eq!(outcome["success"], true);
        assert_eq!(outcome["response"]["message"], "external spec");
    }
}
