use assert_cmd::Command;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
}

#[test]
fn test_inspect_prints_report_json() {
    let output = Command::cargo_bin("tourkit")
        .unwrap()
        .arg("inspect")
        .arg(fixture("landing.json"))
        .env("RUST_LOG", "error")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["location"], "/");
    assert_eq!(report["branding"]["primaryColor"], "#7c3aed");
    assert_eq!(report["branding"]["textColor"], "white");
    let steps = report["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 5);
    assert_eq!(steps[0]["ref"], "e1");
    assert_eq!(steps[2]["target"], "#cta");
    assert_eq!(steps[2]["placement"]["position"], "bottom");
}

#[test]
fn test_inspect_respects_config_limit() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("tourkit.json");
    std::fs::write(&config, r#"{"discoveryLimit": 2}"#).unwrap();

    let output = Command::cargo_bin("tourkit")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .arg("inspect")
        .arg(fixture("landing.json"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["steps"].as_array().unwrap().len(), 2);
}

#[test]
fn test_inspect_missing_snapshot_fails() {
    Command::cargo_bin("tourkit")
        .unwrap()
        .arg("inspect")
        .arg("does-not-exist.json")
        .assert()
        .failure();
}
