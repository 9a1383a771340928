//! CLI integration tests

use std::f64::consts::PI;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn motion(args: &[&str], store: &Path) -> Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "motion-cli", "--"])
        .args(args)
        .env("MOTION_STORE_DIR", store)
        .env("MOTION_SAMPLES_PER_LABEL", "2")
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute command")
}

/// Phyphox-style export of a 3 second recording with a sinusoidal magnitude
fn write_recording(path: &Path, freq: f64, phase: f64) {
    let mut text = String::from(
        "\"Time (s)\",\"Linear Acceleration x (m/s^2)\",\"Linear Acceleration y (m/s^2)\",\
         \"Linear Acceleration z (m/s^2)\",\"Absolute acceleration (m/s^2)\"\n",
    );
    for i in 0..300 {
        let t = i as f64 / 100.0;
        let magnitude = 1.0 + 0.5 * (2.0 * PI * freq * t + phase).sin();
        text.push_str(&format!("{:.2},0,0,0,{:.6}\n", t, magnitude));
    }
    std::fs::write(path, text).unwrap();
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let store = TempDir::new().unwrap();
    let output = motion(&["--help"], store.path());
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("motion classifiers"),
        "Should describe the tool"
    );
    assert!(stdout.contains("train"), "Should show train command");
    assert!(stdout.contains("predict"), "Should show predict command");
    assert!(stdout.contains("inspect"), "Should show inspect command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let store = TempDir::new().unwrap();
    let output = motion(&["--version"], store.path());
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("motion"), "Should show binary name");
}

/// Test train subcommand help
#[test]
fn test_train_help() {
    let store = TempDir::new().unwrap();
    let output = motion(&["train", "--help"], store.path());
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Train help should succeed");
    for option in ["--data", "--labels", "--model", "--params", "--job", "--force"] {
        assert!(stdout.contains(option), "Should show {} option", option);
    }
}

/// Test predict subcommand help
#[test]
fn test_predict_help() {
    let store = TempDir::new().unwrap();
    let output = motion(&["predict", "--help"], store.path());
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Predict help should succeed");
    for option in ["--input", "--job", "--trim-seconds", "--segments", "--pace-ms"] {
        assert!(stdout.contains(option), "Should show {} option", option);
    }
}

/// Test format and log options
#[test]
fn test_global_options() {
    let store = TempDir::new().unwrap();
    let output = motion(&["--help"], store.path());
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
    assert!(stdout.contains("--log-format"), "Should show log-format option");
    assert!(stdout.contains("--config"), "Should show config option");
    assert!(stdout.contains("--metrics"), "Should show metrics option");
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let store = TempDir::new().unwrap();
    let output = motion(&["invalid-command"], store.path());
    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test unknown model kind is rejected before training starts
#[test]
fn test_unknown_model_kind() {
    let store = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let output = motion(
        &[
            "train",
            "--data",
            data.path().to_str().unwrap(),
            "--labels",
            "walk,run",
            "--model",
            "LSTM",
            "--job",
            "job-x",
        ],
        store.path(),
    );
    assert!(!output.status.success(), "Unknown model should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown model kind"), "stderr: {}", stderr);
}

/// Test inspecting a job that was never trained
#[test]
fn test_inspect_missing_job() {
    let store = TempDir::new().unwrap();
    let output = motion(&["inspect", "--job", "never-trained"], store.path());
    assert!(!output.status.success(), "Missing job should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("never-trained"), "stderr: {}", stderr);
}

/// Test train, inspect and predict against one store
#[test]
fn test_train_then_predict() {
    let store = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    write_recording(&data.path().join("a_walk_1.csv"), 2.0, 0.0);
    write_recording(&data.path().join("a_walk_2.csv"), 2.0, 0.4);
    write_recording(&data.path().join("b_run_1.csv"), 4.0, 0.0);
    write_recording(&data.path().join("b_run_2.csv"), 4.0, 0.4);

    let train_args = [
        "train",
        "--data",
        data.path().to_str().unwrap(),
        "--labels",
        "walk,run",
        "--model",
        "KNN",
        "--params",
        "0.2,1",
        "--job",
        "job-1",
    ];
    let output = motion(&train_args, store.path());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "Train should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.contains("KNN accuracy:"), "stdout: {}", stdout);
    assert!(store.path().join("job-1").join("manifest.json").is_file());

    let output = motion(&train_args, store.path());
    assert!(!output.status.success(), "Retraining a stored job needs --force");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--force"), "stderr: {}", stderr);

    let mut forced = train_args.to_vec();
    forced.push("--force");
    let output = motion(&forced, store.path());
    assert!(output.status.success(), "Forced retrain should succeed");

    let output = motion(&["--format", "json", "inspect", "--job", "job-1"], store.path());
    assert!(output.status.success(), "Inspect should succeed");
    let manifest: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(manifest["model_kind"], "KNN");
    assert_eq!(manifest["classes"], serde_json::json!(["run", "walk"]));

    let query = data.path().join("query.csv");
    write_recording(&query, 4.0, 1.1);
    let output = motion(
        &[
            "--format",
            "json",
            "--metrics",
            "predict",
            "--input",
            query.to_str().unwrap(),
            "--job",
            "job-1",
        ],
        store.path(),
    );
    assert!(output.status.success(), "Predict should succeed");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("motion_jobs_started_total"),
        "stderr: {}",
        stderr
    );
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows[0]["prediction"], "run");
    assert_eq!(rows[0]["source"], "query.csv");
}
