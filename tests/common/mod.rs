// Shared test helpers: scripted monitoring backend and series builders

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use msstats::error::{ReportError, ReportResult};
use msstats::models::*;
use msstats::monitoring_repo::{
    MonitoringBackend, SeriesPage, SeriesQuery, SeriesView, TimeSeries, build_filter,
};
use msstats::report_writer::ReportFormat;
use msstats::retry::RetryPolicy;
use msstats::runner::RunnerConfig;

pub const REGION: &str = "us-central1";
pub const STEP: u64 = 60;

/// Fixed end of every test window.
pub fn end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 8, 0, 0, 0).unwrap()
}

/// One hour at one-minute steps, ending at `end()`.
pub fn window() -> Window {
    Window::ending_at(end(), 3600, STEP).unwrap()
}

/// Unix seconds `steps` steps before `end()`.
pub fn at(steps: i64) -> i64 {
    end().timestamp() - steps * STEP as i64
}

pub fn instance_id(project: &str, name: &str) -> String {
    format!("projects/{}/locations/{}/instances/{}", project, REGION, name)
}

/// Redis series for one node of `name`.
pub fn redis_series(
    project: &str,
    name: &str,
    node: &str,
    kind: MetricKind,
    points: &[(i64, f64)],
) -> TimeSeries {
    let metric_type = Product::Redis.metric_type(kind).unwrap();
    let mut resource_labels = BTreeMap::new();
    resource_labels.insert("project_id".to_string(), project.to_string());
    resource_labels.insert("instance_id".to_string(), instance_id(project, name));
    resource_labels.insert("node_id".to_string(), node.to_string());
    resource_labels.insert("region".to_string(), REGION.to_string());
    let mut metric_labels = BTreeMap::new();
    if node == "node-0" {
        metric_labels.insert("role".to_string(), "primary".to_string());
    } else {
        metric_labels.insert("role".to_string(), "replica".to_string());
    }
    TimeSeries {
        metric_type: metric_type.to_string(),
        metric_labels,
        resource_type: "redis_instance".to_string(),
        resource_labels,
        points: points
            .iter()
            .map(|(timestamp, value)| Point {
                timestamp: *timestamp,
                value: *value,
            })
            .collect(),
    }
}

pub fn redis_command_series(
    project: &str,
    name: &str,
    node: &str,
    cmd: &str,
    points: &[(i64, f64)],
) -> TimeSeries {
    let mut ts = redis_series(project, name, node, MetricKind::Commands, points);
    ts.metric_labels.insert("cmd".to_string(), cmd.to_string());
    ts
}

/// The Instance the enumerator is expected to build for a Redis database.
pub fn redis_instance(project: &str, name: &str, nodes: &[&str]) -> Instance {
    Instance {
        project_id: project.to_string(),
        product: Product::Redis,
        instance_id: instance_id(project, name),
        name: name.to_string(),
        topology: Topology::for_product(Product::Redis, nodes.len()),
        tier: None,
        region: Some(REGION.to_string()),
        zone: None,
        nodes: nodes.iter().map(|n| Node::new(*n)).collect(),
    }
}

pub fn runner_config(out_dir: &Path) -> RunnerConfig {
    RunnerConfig {
        duration_secs: 3600,
        step_secs: STEP,
        max_concurrent_instances: 4,
        deadline_secs: 60,
        max_points_per_request: 100_000,
        page_size: 100,
        retry: RetryPolicy::default(),
        output_dir: out_dir.to_path_buf(),
        prefix: None,
        format: ReportFormat::Xlsx,
        timestamp_in_name: false,
    }
}

/// In-memory monitoring backend. Series are matched on metric type and the instance filter;
/// points are limited to the query window (start exclusive, end inclusive).
#[derive(Default)]
pub struct FakeBackend {
    series: Vec<(String, TimeSeries)>,
    failures: BTreeMap<String, ReportError>,
    quota_max_points: Option<u64>,
    delays: Vec<(String, Duration)>,
    calls: Mutex<Vec<(String, SeriesQuery)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, project: &str, series: TimeSeries) -> Self {
        self.series.push((project.to_string(), series));
        self
    }

    /// Every call for `project` fails with `err`.
    pub fn failing(mut self, project: &str, err: ReportError) -> Self {
        self.failures.insert(project.to_string(), err);
        self
    }

    /// FULL queries expecting more than `max_points` points per series are rejected.
    pub fn with_quota(mut self, max_points: u64) -> Self {
        self.quota_max_points = Some(max_points);
        self
    }

    /// Queries whose filter mentions `needle` sleep for `delay` first (tokio time, so paused
    /// clocks advance). An empty needle delays every query.
    pub fn with_delay(mut self, needle: &str, delay: Duration) -> Self {
        self.delays.push((needle.to_string(), delay));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// FULL queries issued for `metric_type`.
    pub fn full_queries(&self, metric_type: &str) -> Vec<SeriesQuery> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, q)| q.view == SeriesView::Full && q.metric_type == metric_type)
            .map(|(_, q)| q.clone())
            .collect()
    }

    fn matches(ts: &TimeSeries, query: &SeriesQuery) -> bool {
        if ts.metric_type != query.metric_type {
            return false;
        }
        query.filter == build_filter(&ts.metric_type, None)
            || ts
                .resource_labels
                .iter()
                .any(|(k, v)| query.filter == build_filter(&ts.metric_type, Some((k, v))))
    }
}

#[async_trait]
impl MonitoringBackend for FakeBackend {
    async fn list_time_series(&self, project: &str, query: &SeriesQuery) -> ReportResult<SeriesPage> {
        for (needle, delay) in &self.delays {
            if query.filter.contains(needle.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }
        self.calls
            .lock()
            .unwrap()
            .push((project.to_string(), query.clone()));

        if let Some(err) = self.failures.get(project) {
            return Err(err.clone());
        }
        if let Some(max) = self.quota_max_points
            && query.view == SeriesView::Full
            && query.window.expected_points() > max
        {
            return Err(ReportError::QuotaExceeded {
                metric: query.metric_type.clone(),
                duration_secs: query.window.duration_secs(),
                step_secs: query.window.step_secs,
            });
        }

        let start = query.window.start.timestamp();
        let end = query.window.end.timestamp();
        let matching: Vec<TimeSeries> = self
            .series
            .iter()
            .filter(|(p, ts)| p == project && Self::matches(ts, query))
            .map(|(_, ts)| {
                let mut ts = ts.clone();
                if query.view == SeriesView::Headers {
                    ts.points.clear();
                } else {
                    ts.points.retain(|p| p.timestamp > start && p.timestamp <= end);
                }
                ts
            })
            .collect();

        let offset: usize = query
            .page_token
            .as_deref()
            .map(|t| t.parse().unwrap())
            .unwrap_or(0);
        let page_size = query.page_size.max(1) as usize;
        let series: Vec<TimeSeries> = matching.iter().skip(offset).take(page_size).cloned().collect();
        let next_page_token =
            (offset + page_size < matching.len()).then(|| (offset + page_size).to_string());
        Ok(SeriesPage {
            series,
            next_page_token,
        })
    }
}
