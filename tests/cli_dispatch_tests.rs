use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_crucible")
}

fn unique_temp_path(name: &str, ext: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("crucible-{name}-{stamp}.{ext}"))
}

fn write_roster(name: &str) -> PathBuf {
    let path = unique_temp_path(name, "json");
    let roster = serde_json::json!({
        "characters": [1211, 1091, 1300],
        "enemy_index": 11001,
        "apl": { "inline": "1211|action|1211_NA_1\n1091|action|1091_NA_1\n1300|action|1300_NA_1" },
        "seed": 11
    });
    fs::write(&path, serde_json::to_string_pretty(&roster).unwrap()).unwrap();
    path
}

#[test]
fn simulate_command_dispatches_and_emits_json() {
    let roster = write_roster("simulate");
    let output = Command::new(bin())
        .args(["simulate", roster.to_str().unwrap(), "500"])
        .output()
        .expect("simulate should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(&stdout).expect("simulate should emit json");
    assert_eq!(payload["ticks"].as_u64(), Some(500));
    assert!(payload["total_damage"].as_f64().unwrap_or(0.0) > 0.0);
}

#[test]
fn simulate_writes_csv_when_asked() {
    let roster = write_roster("csv");
    let out_dir = unique_temp_path("csvdir", "d");
    let output = Command::new(bin())
        .args([
            "simulate",
            roster.to_str().unwrap(),
            "200",
            "--csv",
            out_dir.to_str().unwrap(),
        ])
        .output()
        .expect("simulate should run");

    assert_eq!(output.status.code(), Some(0));
    let hits = fs::read_to_string(out_dir.join("hits.csv")).expect("hits.csv");
    assert!(hits.lines().count() > 1, "header plus at least one hit row");
}

#[test]
fn validate_command_accepts_a_good_roster() {
    let roster = write_roster("validate");
    let output = Command::new(bin())
        .args(["validate", roster.to_str().unwrap()])
        .output()
        .expect("validate should run");
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("validation passed"));
}

#[test]
fn validate_command_rejects_a_bad_roster() {
    let path = unique_temp_path("bad", "json");
    fs::write(
        &path,
        r#"{"characters":[1211,1211,1300],"enemy_index":11001,"apl":{"inline":"1211|action|1211_NA_1"},"seed":0}"#,
    )
    .unwrap();
    let output = Command::new(bin())
        .args(["validate", path.to_str().unwrap()])
        .output()
        .expect("validate should run");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn parse_command_renders_canonical_rotation() {
    let path = unique_temp_path("rotation", "apl");
    fs::write(&path, "1211|action|1211_E_EX|attribute.1211:energy>=60\n").unwrap();
    let output = Command::new(bin())
        .args(["parse", path.to_str().unwrap()])
        .output()
        .expect("parse should run");
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1211|action|1211_E_EX|attribute.1211:energy>=60"));
}

#[test]
fn sweep_command_reports_one_row_per_variant() {
    let roster = write_roster("sweep");
    let output = Command::new(bin())
        .args(["sweep", roster.to_str().unwrap(), "3", "200", "2"])
        .output()
        .expect("sweep should run");
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    // Header plus three variant rows.
    assert_eq!(stdout.lines().count(), 4);
    assert!(stdout.contains("seed-11"));
    assert!(stdout.contains("seed-13"));
}

#[test]
fn unknown_command_exits_with_usage() {
    let output = Command::new(bin())
        .args(["bogus"])
        .output()
        .expect("binary should run");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("usage"));
}
