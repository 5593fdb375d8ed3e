#![allow(missing_docs)]
//! Settings merge across system and user files.

use std::time::Duration;

use lbviz_tui::config::load_settings_from_paths;

#[test]
fn user_file_overrides_system_file() {
    let temp = tempfile::tempdir().unwrap();
    let system = temp.path().join("system.yaml");
    let user = temp.path().join("user.yaml");
    std::fs::write(
        &system,
        r#"
decision:
  base_url: "http://system:5000"
  request_timeout_ms: 1000
run:
  rate_per_second: 4
  duration_seconds: 30
topology:
  initial_targets: 5
"#,
    )
    .unwrap();
    std::fs::write(
        &user,
        r#"
decision:
  base_url: "http://user:5000"
run:
  rate_per_second: 250
ui:
  tick_rate_ms: 50
"#,
    )
    .unwrap();

    let settings = load_settings_from_paths(&system, &user);
    let client = settings.client_config(None);
    assert_eq!(client.base_url, "http://user:5000");
    assert_eq!(client.request_timeout_ms, 1000);
    assert!((settings.rate_per_second() - 100.0).abs() < f64::EPSILON);
    assert!((settings.duration_seconds() - 30.0).abs() < f64::EPSILON);
    assert_eq!(settings.controller_config().initial_targets, 5);
    assert_eq!(settings.tick_rate(), Duration::from_millis(50));
}

#[test]
fn invalid_yaml_is_ignored() {
    let temp = tempfile::tempdir().unwrap();
    let system = temp.path().join("system.yaml");
    let user = temp.path().join("user.yaml");
    std::fs::write(&system, "run:\n  duration_seconds: 20\n").unwrap();
    std::fs::write(&user, "run: [this is not a mapping\n").unwrap();

    let settings = load_settings_from_paths(&system, &user);
    assert!((settings.duration_seconds() - 20.0).abs() < f64::EPSILON);
}

#[test]
fn missing_files_fall_back_to_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let settings = load_settings_from_paths(
        &temp.path().join("absent.yaml"),
        &temp.path().join("also-absent.yaml"),
    );
    assert_eq!(settings.client_config(None).base_url, "http://127.0.0.1:5000");
    assert_eq!(settings.controller_config().result_capacity, 1000);
}
