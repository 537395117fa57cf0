// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const TRIO: &str = r#"{
    "name": "trio",
    "entities": [
        { "id": 0, "base_name": "mover", "simulated": true, "interactive": true,
          "obstacle_ids": [-1],
          "geometry": { "vertices": [[0,0,0],[1,0,0],[0,1,0]], "simplices": [[0,1,2]] } },
        { "id": 1, "base_name": "wall", "obstacle_source": true,
          "geometry": { "vertices": [[0,0,1],[1,0,1],[0,1,1]], "simplices": [[0,1,2]] } },
        { "id": 2, "base_name": "rod", "obstacle_source": true,
          "geometry": { "vertices": [[5,0,0],[6,0,0]], "simplices": [[0,1,1]] } }
    ]
}"#;

const DUPLICATE: &str = r#"{
    "name": "dup",
    "entities": [ { "id": 3, "base_name": "a" }, { "id": 3, "base_name": "b" } ]
}"#;

fn repulsor() -> Command {
    Command::cargo_bin("repulsor").unwrap()
}

fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn validate_lists_entities() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "trio.json", TRIO);
    repulsor()
        .arg("validate")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("scene 'trio' is valid (3 entities)"))
        .stdout(predicate::str::contains("mover_0"))
        .stdout(predicate::str::contains("IS-"));
}

#[test]
fn validate_rejects_duplicate_ids() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "dup.json", DUPLICATE);
    repulsor()
        .arg("validate")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid scene"));
}

#[test]
fn validate_reports_unreadable_files() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "broken.json", "{ not json");
    repulsor()
        .arg("validate")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read scene"));
}

#[test]
fn obstacles_json_shows_offset_aggregation() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "trio.json", TRIO);
    let output = repulsor()
        .args(["obstacles", "--json"])
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows[0]["owner"], "mover_0");
    assert_eq!(rows[0]["sources"], serde_json::json!(["wall_1", "rod_2"]));
    assert_eq!(rows[0]["vertices"], 5);
    assert_eq!(rows[0]["triangles"], 2);
}

#[test]
fn scenes_lists_json_stems() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "b.json", TRIO);
    write(dir.path(), "a.json", TRIO);
    write(dir.path(), "readme.txt", "skip");
    repulsor()
        .arg("scenes")
        .arg(dir.path())
        .assert()
        .success()
        .stdout("a\nb\n");
}

#[test]
fn settings_prints_defaults_and_resets() {
    let dir = tempfile::tempdir().unwrap();
    repulsor()
        .args(["settings", "--json", "--config-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"iterations_per_step\": 1"));
    assert!(!dir.path().join("settings.json").exists());

    repulsor()
        .args(["settings", "--reset", "--config-dir"])
        .arg(dir.path())
        .assert()
        .success();
    assert!(dir.path().join("settings.json").exists());
}
