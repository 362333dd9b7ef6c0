use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_liftsense_cli"))
}

fn fixture_file(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

fn scratch_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("liftsense_{}_{}", std::process::id(), name))
}

#[test]
fn detect_fixture_reports_one_block() {
    let output = cli()
        .args([
            "detect",
            "--fixture",
            &fixture_file("squat_set.json"),
            "--expect",
            "Squat",
        ])
        .output()
        .expect("failed to run liftsense_cli detect");
    assert!(
        output.status.success(),
        "CLI exited with {:?}",
        output.status.code()
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("detect report JSON payload");
    assert_eq!(json["fixture"], "squat_set");
    assert_eq!(json["blocks"].as_array().map(Vec::len), Some(1));
    assert_eq!(json["blocks"][0]["results"][0]["label"], "Squat");
}

#[test]
fn detect_fixture_flags_wrong_expectation() {
    let output = cli()
        .args([
            "detect",
            "--fixture",
            &fixture_file("squat_set.json"),
            "--expect",
            "Deadlift",
        ])
        .output()
        .expect("failed to run mismatch detect");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn train_then_inspect_corpus() {
    let corpus = scratch_file("curl.lsfw");
    let output = cli()
        .args([
            "train",
            "--fixture",
            &fixture_file("curl_rest.json"),
            "--label",
            "Curl",
            "--output",
        ])
        .arg(&corpus)
        .output()
        .expect("failed to run liftsense_cli train");
    assert!(output.status.success());

    let summary: Value =
        serde_json::from_slice(&output.stdout).expect("training summary JSON payload");
    assert_eq!(summary["label"], "Curl");
    let windows = summary["windows"].as_u64().unwrap_or_default();
    assert!(windows > 0);

    let output = cli()
        .arg("inspect")
        .arg("--input")
        .arg(&corpus)
        .output()
        .expect("failed to run liftsense_cli inspect");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    assert_eq!(stdout.lines().count() as u64, windows);
    let first: Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(first["channels"], 2);

    let _ = std::fs::remove_file(&corpus);
}

#[test]
fn synth_emits_one_line_per_frame() {
    let output = cli()
        .args(["synth", "--fixture", &fixture_file("curl_rest.json")])
        .output()
        .expect("failed to run liftsense_cli synth");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    // 23 s at 50 Hz in 25-sample frames, two sensors
    assert_eq!(stdout.lines().count(), 46 * 2);
    let frame: Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(frame["location"], "left_wrist");
}

#[test]
fn template_is_a_loadable_fixture() {
    let output = cli().arg("template").output().expect("failed to run template");
    assert!(output.status.success());
    let spec: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(spec["segments"].as_array().map(Vec::len), Some(3));
}
