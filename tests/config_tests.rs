// Config loading and validation tests

use msstats::config::AppConfig;
use msstats::report_writer::ReportFormat;
use msstats::retry::Narrowing;
use std::path::PathBuf;

const VALID_CONFIG: &str = r#"
[monitoring]
endpoint = "https://monitoring.googleapis.com"
request_timeout_secs = 30
max_points_per_request = 50000
page_size = 500

[report]
duration_secs = 86400
step_secs = 300
output_dir = "reports"
prefix = "weekly"
format = "csv"
timestamp_in_name = false

[run]
max_concurrent_instances = 8
deadline_secs = 1800

[retry]
max_attempts = 3
narrowing = "shorten_window"
factor = 4
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.monitoring.request_timeout_secs, 30);
    assert_eq!(config.monitoring.max_points_per_request, 50000);
    assert_eq!(config.monitoring.page_size, 500);
    assert_eq!(config.report.duration_secs, 86400);
    assert_eq!(config.report.step_secs, 300);
    assert_eq!(config.report.output_dir, PathBuf::from("reports"));
    assert_eq!(config.report.prefix.as_deref(), Some("weekly"));
    assert_eq!(config.report.format, ReportFormat::Csv);
    assert!(!config.report.timestamp_in_name);
    assert_eq!(config.run.max_concurrent_instances, 8);
    assert_eq!(config.run.deadline_secs, 1800);
    let policy = config.retry.policy();
    assert_eq!(policy.max_attempts, 3);
    assert_eq!(policy.narrowing, Narrowing::ShortenWindow);
    assert_eq!(policy.factor, 4);
}

#[test]
fn test_config_empty_uses_defaults() {
    let config = AppConfig::load_from_str("").expect("defaults");
    assert_eq!(config.monitoring.endpoint, "https://monitoring.googleapis.com");
    assert_eq!(config.report.duration_secs, 604_800);
    assert_eq!(config.report.step_secs, 60);
    assert_eq!(config.report.output_dir, PathBuf::from("."));
    assert_eq!(config.report.format, ReportFormat::Xlsx);
    assert!(config.report.timestamp_in_name);
    assert_eq!(config.run.max_concurrent_instances, 4);
    assert_eq!(config.retry.max_attempts, 2);
    assert_eq!(config.retry.narrowing, Narrowing::WidenStep);
}

#[test]
fn test_config_partial_section_keeps_other_defaults() {
    let config = AppConfig::load_from_str("[report]\nstep_secs = 120\n").unwrap();
    assert_eq!(config.report.step_secs, 120);
    assert_eq!(config.report.duration_secs, 604_800);
}

#[test]
fn test_config_validation_rejects_zero_duration() {
    let bad = VALID_CONFIG.replace("duration_secs = 86400", "duration_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("report.duration_secs"));
}

#[test]
fn test_config_validation_rejects_huge_duration() {
    let bad = VALID_CONFIG.replace("duration_secs = 86400", "duration_secs = 20000000000000");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("report.duration_secs must be <="));

    let mut config = AppConfig::default();
    config.report.duration_secs = msstats::config::MAX_DURATION_SECS;
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_rejects_zero_step() {
    let bad = VALID_CONFIG.replace("step_secs = 300", "step_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("report.step_secs"));
}

#[test]
fn test_config_validation_rejects_step_longer_than_duration() {
    let bad = VALID_CONFIG.replace("step_secs = 300", "step_secs = 90000");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("must not exceed report.duration_secs"));
}

#[test]
fn test_config_validation_rejects_zero_concurrency() {
    let bad = VALID_CONFIG.replace("max_concurrent_instances = 8", "max_concurrent_instances = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("run.max_concurrent_instances"));
}

#[test]
fn test_config_validation_rejects_zero_deadline() {
    let bad = VALID_CONFIG.replace("deadline_secs = 1800", "deadline_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("run.deadline_secs"));
}

#[test]
fn test_config_validation_rejects_zero_request_timeout() {
    let bad = VALID_CONFIG.replace("request_timeout_secs = 30", "request_timeout_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("monitoring.request_timeout_secs"));
}

#[test]
fn test_config_validation_rejects_zero_page_size() {
    let bad = VALID_CONFIG.replace("page_size = 500", "page_size = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("monitoring.page_size"));
}

#[test]
fn test_config_validation_rejects_zero_point_budget() {
    let bad = VALID_CONFIG.replace("max_points_per_request = 50000", "max_points_per_request = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("monitoring.max_points_per_request"));
}

#[test]
fn test_config_validation_rejects_empty_endpoint() {
    let bad = VALID_CONFIG.replace(
        "endpoint = \"https://monitoring.googleapis.com\"",
        "endpoint = \"\"",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("monitoring.endpoint"));
}

#[test]
fn test_config_validation_rejects_zero_attempts() {
    let bad = VALID_CONFIG.replace("max_attempts = 3", "max_attempts = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("retry.max_attempts"));
}

#[test]
fn test_config_validation_rejects_factor_below_two() {
    let bad = VALID_CONFIG.replace("factor = 4", "factor = 1");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("retry.factor"));
}

#[test]
fn test_config_rejects_unknown_format() {
    let bad = VALID_CONFIG.replace("format = \"csv\"", "format = \"pdf\"");
    assert!(AppConfig::load_from_str(&bad).is_err());
}

#[test]
fn test_config_load_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("msstats.toml");
    std::fs::write(&path, VALID_CONFIG).unwrap();
    let config = AppConfig::load_from_path(&path).unwrap();
    assert_eq!(config.report.step_secs, 300);

    let missing = AppConfig::load_from_path(&dir.path().join("absent.toml")).unwrap_err();
    assert!(missing.to_string().contains("absent.toml"));
}
