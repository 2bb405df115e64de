//! Integration tests for the review-gate CLI
//!
//! These tests drive the binary end to end against a temporary project.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a review-gate Command isolated from the caller's env
fn gate() -> Command {
    let mut cmd = cargo_bin_cmd!("review-gate");
    cmd.env_remove("REVIEW_GATE_REVIEWER")
        .env_remove("REVIEW_GATE_CHANNELS")
        .env_remove("RUST_LOG");
    cmd
}

fn init_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    gate().current_dir(dir.path()).arg("init").assert().success();
    dir
}

fn write_layer(dir: &Path, name: &str, pass: bool) -> String {
    let body = if pass {
        r#"{"pass": true, "results": [{"check": "lint", "pass": true, "message": "clean"}]}"#
    } else {
        r#"{"pass": false, "results": [{"check": "unit-tests", "pass": false, "message": "2 failing", "error": "expected 3, got 4"}]}"#
    };
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path.to_string_lossy().to_string()
}

fn run_review(dir: &TempDir, layer1: bool, layer2: bool, files: &str) -> (Option<i32>, Value) {
    let l1 = write_layer(dir.path(), "layer1.json", layer1);
    let l2 = write_layer(dir.path(), "layer2.json", layer2);
    let output = gate()
        .current_dir(dir.path())
        .args(["review", "--layer1", &l1, "--layer2", &l2, "--files", files])
        .output()
        .unwrap();
    let json = serde_json::from_slice(&output.stdout).unwrap();
    (output.status.code(), json)
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        gate()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("review"));
    }

    #[test]
    fn test_version() {
        gate().arg("--version").assert().success();
    }

    #[test]
    fn test_init_creates_structure() {
        let dir = TempDir::new().unwrap();
        gate()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized review gate"));

        assert!(dir.path().join(".gate/gate.toml").exists());
        assert!(dir.path().join(".gate/reviews").is_dir());
        assert!(dir.path().join(".gate/escalations").is_dir());
    }

    #[test]
    fn test_init_idempotent() {
        let dir = init_project();
        gate()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already initialized"));
    }

    #[test]
    fn test_config_show_defaults() {
        let dir = init_project();
        gate()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("reviewer = \"team-lead\""));
    }

    #[test]
    fn test_stage_list() {
        gate()
            .args(["stage", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("layer1-checks"))
            .stdout(predicate::str::contains("recovery"));
    }
}

// =============================================================================
// Gate Flow Tests
// =============================================================================

mod gate_flow {
    use super::*;

    #[test]
    fn test_layer1_failure_blocks_with_exit_code_2() {
        let dir = init_project();
        let (code, json) = run_review(&dir, false, true, "src/lib.rs");

        assert_eq!(code, Some(2));
        assert_eq!(json["status"], "blocked");
        assert_eq!(json["stoppedAt"], "layer1");
        assert_eq!(json["pass"], false);
        assert_eq!(json["fixRecommendations"][0]["command"], "npm test");
    }

    #[test]
    fn test_layer2_failure_blocks_at_layer2() {
        let dir = init_project();
        let (code, json) = run_review(&dir, true, false, "src/lib.rs");
        assert_eq!(code, Some(2));
        assert_eq!(json["stoppedAt"], "layer2");
    }

    #[test]
    fn test_missing_layer_file_is_not_executed() {
        let dir = init_project();
        let output = gate()
            .current_dir(dir.path())
            .args(["review", "--layer1", "nope.json", "--files", "a.rs"])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(2));
        let json: Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(json["reason"], "Layer 1 not executed");
    }

    #[test]
    fn test_passing_change_set_requests_human_review() {
        let dir = init_project();
        let (code, json) = run_review(&dir, true, true, "src/auth/login.js");

        assert_eq!(code, Some(0));
        assert_eq!(json["status"], "pending_human_review");
        let request = &json["reviewRequest"];
        assert_eq!(request["focusAreas"]["primary"][0]["area"], "security");
        assert!(request["estimatedTime"].as_f64().unwrap() >= 10.0);

        let id = request["id"].as_str().unwrap();
        assert!(dir.path().join(format!(".gate/reviews/{id}.json")).exists());
        let outbox =
            fs::read_to_string(dir.path().join(".gate/outbox/notifications.jsonl")).unwrap();
        assert!(outbox.contains(id));
    }

    #[test]
    fn test_complete_and_pending() {
        let dir = init_project();
        let (_, json) = run_review(&dir, true, true, "src/api/users.ts");
        let id = json["reviewRequest"]["id"].as_str().unwrap().to_string();

        gate()
            .current_dir(dir.path())
            .arg("pending")
            .assert()
            .success()
            .stdout(predicate::str::contains(id.as_str()));

        gate()
            .current_dir(dir.path())
            .args(["complete", &id, "--approve", "--comments", "LGTM"])
            .assert()
            .success()
            .stdout(predicate::str::contains("approved"));

        gate()
            .current_dir(dir.path())
            .arg("pending")
            .assert()
            .success()
            .stdout(predicate::str::contains("No pending review requests"));

        gate()
            .current_dir(dir.path())
            .args(["show", &id])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"status\": \"approved\""));
    }

    #[test]
    fn test_invalid_request_id_is_rejected() {
        let dir = init_project();
        gate()
            .current_dir(dir.path())
            .args(["show", "../../etc/passwd"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid request ID"));

        gate()
            .current_dir(dir.path())
            .args(["complete", "a;rm", "--approve"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid request ID"));
    }

    #[test]
    fn test_unknown_request_is_not_found() {
        let dir = init_project();
        gate()
            .current_dir(dir.path())
            .args(["show", "hr-doesnotexist"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn test_remind_with_nothing_pending() {
        let dir = init_project();
        gate()
            .current_dir(dir.path())
            .arg("remind")
            .assert()
            .success()
            .stdout(predicate::str::contains("Sent 0 reminder(s)"));
    }
}

// =============================================================================
// Stage Runner Tests
// =============================================================================

mod stages {
    use super::*;

    #[test]
    fn test_recovery_stage_escalates_via_cli() {
        let dir = init_project();
        let context = dir.path().join("ctx.json");
        fs::write(
            &context,
            r#"{"failedStageId": "layer1-checks", "error": "lint crashed", "attempts": 3}"#,
        )
        .unwrap();

        let output = gate()
            .current_dir(dir.path())
            .args(["stage", "run", "recovery", "--context"])
            .arg(&context)
            .output()
            .unwrap();
        assert!(output.status.success());
        let json: Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(json["attempts"], 1);
        assert_eq!(json["breakerOpen"], false);

        let escalations: Vec<_> = fs::read_dir(dir.path().join(".gate/escalations"))
            .unwrap()
            .collect();
        assert_eq!(escalations.len(), 1);
    }

    #[test]
    fn test_unknown_stage_fails() {
        let dir = init_project();
        let context = dir.path().join("ctx.json");
        fs::write(&context, "{}").unwrap();
        gate()
            .current_dir(dir.path())
            .args(["stage", "run", "deploy", "--context"])
            .arg(&context)
            .assert()
            .failure()
            .stderr(predicate::str::contains("No executor found for stage: deploy"));
    }
}
