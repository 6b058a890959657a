use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::report_writer::ReportFormat;
use crate::retry::{Narrowing, RetryPolicy};

/// Config file looked up in the working directory when CONFIG_FILE is not set.
pub const DEFAULT_CONFIG_FILE: &str = "msstats.toml";
/// Longest lookback accepted; Cloud Monitoring keeps no data older than this.
pub const MAX_DURATION_SECS: u64 = 2 * 365 * 86_400;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Per-request timeout for every monitoring API call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Upper bound on points one request may return; larger windows are split.
    #[serde(default = "default_max_points_per_request")]
    pub max_points_per_request: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_endpoint() -> String {
    crate::monitoring_repo::DEFAULT_ENDPOINT.to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_points_per_request() -> u64 {
    100_000
}

fn default_page_size() -> u32 {
    10_000
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout_secs(),
            max_points_per_request: default_max_points_per_request(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Lookback window in seconds (default 7 days).
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    /// Alignment step in seconds.
    #[serde(default = "default_step_secs")]
    pub step_secs: u64,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub format: ReportFormat,
    /// Append the run timestamp to output file names.
    #[serde(default = "default_true")]
    pub timestamp_in_name: bool,
}

fn default_duration_secs() -> u64 {
    604_800
}

fn default_step_secs() -> u64 {
    60
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
            step_secs: default_step_secs(),
            output_dir: default_output_dir(),
            prefix: None,
            format: ReportFormat::default(),
            timestamp_in_name: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Instances fetched and aggregated concurrently within one project.
    #[serde(default = "default_max_concurrent_instances")]
    pub max_concurrent_instances: usize,
    /// Overall deadline for one project's run.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

fn default_max_concurrent_instances() -> usize {
    4
}

fn default_deadline_secs() -> u64 {
    3600
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_concurrent_instances: default_max_concurrent_instances(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per query, first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_narrowing")]
    pub narrowing: Narrowing,
    #[serde(default = "default_factor")]
    pub factor: u64,
}

fn default_max_attempts() -> u32 {
    2
}

fn default_narrowing() -> Narrowing {
    Narrowing::WidenStep
}

fn default_factor() -> u64 {
    2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            narrowing: default_narrowing(),
            factor: default_factor(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.narrowing, self.factor)
    }
}

impl AppConfig {
    /// Loads from CONFIG_FILE, else `msstats.toml` if present, else defaults.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var("CONFIG_FILE") {
            Ok(path) => Self::load_from_path(Path::new(&path)),
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load_from_path(Path::new(DEFAULT_CONFIG_FILE))
            }
            Err(_) => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("config {}: {}", path.display(), e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.monitoring.endpoint.is_empty(),
            "monitoring.endpoint must be non-empty"
        );
        anyhow::ensure!(
            self.monitoring.request_timeout_secs > 0,
            "monitoring.request_timeout_secs must be > 0, got {}",
            self.monitoring.request_timeout_secs
        );
        anyhow::ensure!(
            self.monitoring.max_points_per_request > 0,
            "monitoring.max_points_per_request must be > 0, got {}",
            self.monitoring.max_points_per_request
        );
        anyhow::ensure!(
            self.monitoring.page_size > 0,
            "monitoring.page_size must be > 0, got {}",
            self.monitoring.page_size
        );
        anyhow::ensure!(
            self.report.duration_secs > 0,
            "report.duration_secs must be > 0, got {}",
            self.report.duration_secs
        );
        anyhow::ensure!(
            self.report.duration_secs <= MAX_DURATION_SECS,
            "report.duration_secs must be <= {} (two years), got {}",
            MAX_DURATION_SECS,
            self.report.duration_secs
        );
        anyhow::ensure!(
            self.report.step_secs > 0,
            "report.step_secs must be > 0, got {}",
            self.report.step_secs
        );
        anyhow::ensure!(
            self.report.step_secs <= self.report.duration_secs,
            "report.step_secs ({}) must not exceed report.duration_secs ({})",
            self.report.step_secs,
            self.report.duration_secs
        );
        anyhow::ensure!(
            self.run.max_concurrent_instances > 0,
            "run.max_concurrent_instances must be > 0, got {}",
            self.run.max_concurrent_instances
        );
        anyhow::ensure!(
            self.run.deadline_secs > 0,
            "run.deadline_secs must be > 0, got {}",
            self.run.deadline_secs
        );
        anyhow::ensure!(
            self.retry.max_attempts >= 1,
            "retry.max_attempts must be >= 1, got {}",
            self.retry.max_attempts
        );
        anyhow::ensure!(
            self.retry.factor >= 2,
            "retry.factor must be >= 2, got {}",
            self.retry.factor
        );
        Ok(())
    }
}
