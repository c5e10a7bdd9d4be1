// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::tempdir;

const DEMO: &str = r#"
apiVersion: core/v1
metadata:
  identifier: demo
  provider: acme
  version: v1
spec:
  inputs:
    parameters:
      - name: msg
        type: String
        value: hi
  pipelines:
    - metadata: {name: first, guid: g1}
      spec:
        arguments:
          parameters:
            - {name: text, from: "{{inputs.parameters.msg}}"}
    - metadata: {name: second, guid: g1}
      spec:
        arguments:
          parameters:
            - {name: text, from: "{{pipelines.first.outputs.parameters.out}}"}
        dependencies: [first]
"#;

const CYCLIC: &str = r#"
apiVersion: core/v1
metadata: {identifier: loop, version: v1}
spec:
  pipelines:
    - metadata: {name: a, guid: g}
      spec:
        arguments:
          parameters:
            - {name: x, from: "{{pipelines.b.outputs.parameters.y}}"}
    - metadata: {name: b, guid: g}
      spec:
        arguments: {}
        dependencies: [a]
"#;

fn flowspec(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("flowspec").expect("binary present");
    cmd.current_dir(dir)
        .env("NO_COLOR", "1")
        .env("FLOWSPEC_REGISTRY", dir.join("registry"));
    cmd
}

#[test]
fn validate_accepts_demo_manifest() {
    let temp = tempdir().unwrap();
    std::fs::write(temp.path().join("pipeline.yaml"), DEMO).unwrap();

    flowspec(temp.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ pipeline.yaml"));
}

#[test]
fn validate_reports_cycles() {
    let temp = tempdir().unwrap();
    std::fs::write(temp.path().join("good.yaml"), DEMO).unwrap();
    std::fs::write(temp.path().join("loop.yaml"), CYCLIC).unwrap();

    flowspec(temp.path())
        .args(["validate", "*.yaml"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Cycle detected between steps: a, b"));
}

#[test]
fn graph_renders_mermaid() {
    let temp = tempdir().unwrap();
    std::fs::write(temp.path().join("pipeline.yaml"), DEMO).unwrap();

    flowspec(temp.path())
        .args(["graph", "pipeline.yaml", "--format", "mermaid"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("graph TD"))
        .stdout(predicate::str::contains("first --> second"));
}

#[test]
fn fmt_is_idempotent() {
    let temp = tempdir().unwrap();
    std::fs::write(temp.path().join("pipeline.yaml"), DEMO).unwrap();

    flowspec(temp.path())
        .args(["fmt", "pipeline.yaml", "-o", "canonical.yaml"])
        .assert()
        .success();

    let canonical = std::fs::read_to_string(temp.path().join("canonical.yaml")).unwrap();
    assert!(canonical.contains("apiVersion: core/v1"));

    flowspec(temp.path())
        .args(["fmt", "canonical.yaml"])
        .assert()
        .success()
        .stdout(predicate::eq(canonical.as_str()));
}

#[test]
fn fmt_emits_json() {
    let temp = tempdir().unwrap();
    std::fs::write(temp.path().join("pipeline.yaml"), DEMO).unwrap();

    flowspec(temp.path())
        .args(["fmt", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"apiVersion\": \"core/v1\""));
}

#[test]
fn push_list_pull() {
    let temp = tempdir().unwrap();
    std::fs::write(temp.path().join("pipeline.yaml"), DEMO).unwrap();

    flowspec(temp.path())
        .args(["push", "pipeline.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Published acme/demo@v1"));

    flowspec(temp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("acme/demo@v1"));

    flowspec(temp.path())
        .args(["pull", "demo", "--provider", "acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("identifier: demo"));

    flowspec(temp.path())
        .args(["pull", "missing", "--provider", "acme"])
        .assert()
        .failure();
}

#[test]
fn pull_needs_a_provider() {
    let temp = tempdir().unwrap();
    flowspec(temp.path())
        .args(["pull", "demo"])
        .assert()
        .failure();
}
