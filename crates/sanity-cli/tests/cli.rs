//! End-to-end tests for the `sanity` binary.

use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

const TRAIN_GATE: &str = r#"{
  "name": "train-gate",
  "specification": "{\"checks\": [{\"type\": \"template-locations\"}, {\"type\": \"receivesyncs\", \"channel\": \"leave\"}]}",
  "templates": [
    {
      "name": "Train",
      "init": "safe",
      "locations": ["safe", "appr", "cross"],
      "edges": [
        {"source": "safe", "target": "appr", "sync": "appr!"},
        {"source": "appr", "target": "cross"},
        {"source": "cross", "target": "safe", "sync": "leave!"}
      ]
    },
    {
      "name": "Gate",
      "init": "free",
      "locations": ["free", "occ"],
      "edges": [
        {"source": "free", "target": "occ", "sync": "appr?"},
        {"source": "occ", "target": "free"}
      ]
    }
  ]
}"#;

fn sanity(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sanity"))
        .args(args)
        .env_remove("SANITY_MODEL")
        .env_remove("SANITY_SPEC")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to launch sanity")
}

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("failed to write fixture");
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_checks_lists_builtin_checks() {
    let output = sanity(&["checks"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("template-locations"));
    assert!(text.contains("receivesyncs"));
    assert!(text.contains("deadlock-locations"));
    assert!(text.contains("channel: Channel [text, required]"));
}

#[test]
fn test_run_with_stored_specification_reports_failure() {
    let dir = TempDir::new().unwrap();
    let model = write(&dir, "model.json", TRAIN_GATE);

    let output = sanity(&["run", "--model", model.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));

    let text = stdout(&output);
    assert!(text.contains("[1] ✓ template-locations"));
    assert!(text.contains("[2] ✗ receivesyncs"));
    assert!(text.contains("(trace: trace-"));
    assert!(text.contains("✗ FAILED"));
}

#[test]
fn test_run_with_spec_override_as_json() {
    let dir = TempDir::new().unwrap();
    let model = write(&dir, "model.json", TRAIN_GATE);
    let spec = write(
        &dir,
        "spec.json",
        r#"{"checks": [{"type": "receivesyncs", "channel": "appr"}, {"type": "deadlock-locations"}]}"#,
    );

    let output = sanity(&[
        "run",
        "--model",
        model.to_str().unwrap(),
        "--spec",
        spec.to_str().unwrap(),
        "--format",
        "json",
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["overall_satisfied"], true);
    assert_eq!(json["results"].as_array().unwrap().len(), 2);
    assert_eq!(json["results"][0]["check"], "receivesyncs");
}

#[test]
fn test_trace_shows_path_to_offending_send() {
    let dir = TempDir::new().unwrap();
    let model = write(&dir, "model.json", TRAIN_GATE);

    let output = sanity(&["trace", "--model", model.to_str().unwrap(), "--index", "2"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let text = stdout(&output);
    assert!(text.contains("trace through Train (3 step(s))"));
    assert!(text.contains("Train.cross -> Train.safe [leave!]"));
}

#[test]
fn test_trace_on_result_without_trace_fails() {
    let dir = TempDir::new().unwrap();
    let model = write(&dir, "model.json", TRAIN_GATE);

    let output = sanity(&["trace", "--model", model.to_str().unwrap(), "--index", "1"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("has no trace"));
}

#[test]
fn test_validate_reports_malformed_entries() {
    let dir = TempDir::new().unwrap();
    let spec = write(
        &dir,
        "spec.json",
        r#"{"checker": "symbolic", "checks": [{"type": "template-locations"}, {"channel": "go"}]}"#,
    );

    let output = sanity(&["validate", "--spec", spec.to_str().unwrap()]);
    assert!(!output.status.success());
    let text = stdout(&output);
    assert!(text.contains("[1] ✓ template-locations"));
    assert!(text.contains("[2] ✗"));
}

#[test]
fn test_validate_rejects_invalid_json() {
    let dir = TempDir::new().unwrap();
    let spec = write(&dir, "spec.json", "{\"checks\": ");

    let output = sanity(&["validate", "--spec", spec.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid specification"));
}
