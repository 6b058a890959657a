// Project runs: enumerate, fetch+aggregate on a bounded pool, write one report.
// A batch runs projects one after another; a failed project never stops the batch.

use chrono::{DateTime, Utc};
use futures_util::{StreamExt, stream};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::aggregation::aggregate;
use crate::config::AppConfig;
use crate::credentials::{ServiceAccountKey, ServiceAccountTokenSource, StaticToken, TokenSource};
use crate::enumerator::enumerate_instances;
use crate::error::{ReportError, ReportResult};
use crate::fetcher::MetricFetcher;
use crate::models::{AggregatedStats, Instance, NodeRow, ProjectReport, ReportRow, Window};
use crate::monitoring_repo::{CloudMonitoringRepo, MonitoringBackend};
use crate::report_writer::{ReportFormat, output_path, write_report};
use crate::retry::RetryPolicy;

/// How a project authenticates against the monitoring API.
#[derive(Debug, Clone, PartialEq)]
pub enum Credential {
    AccessToken(String),
    KeyFile(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectTarget {
    pub project_id: String,
    pub credential: Credential,
}

/// Settings for one batch, resolved from config and CLI overrides.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub duration_secs: u64,
    pub step_secs: u64,
    pub max_concurrent_instances: usize,
    pub deadline_secs: u64,
    pub max_points_per_request: u64,
    pub page_size: u32,
    pub retry: RetryPolicy,
    pub output_dir: PathBuf,
    pub prefix: Option<String>,
    pub format: ReportFormat,
    pub timestamp_in_name: bool,
}

impl RunnerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            duration_secs: config.report.duration_secs,
            step_secs: config.report.step_secs,
            max_concurrent_instances: config.run.max_concurrent_instances,
            deadline_secs: config.run.deadline_secs,
            max_points_per_request: config.monitoring.max_points_per_request,
            page_size: config.monitoring.page_size,
            retry: config.retry.policy(),
            output_dir: config.report.output_dir.clone(),
            prefix: config.report.prefix.clone(),
            format: config.report.format,
            timestamp_in_name: config.report.timestamp_in_name,
        }
    }

    pub fn window(&self, now: DateTime<Utc>) -> ReportResult<Window> {
        Window::ending_at(now, self.duration_secs, self.step_secs).ok_or_else(|| {
            ReportError::WindowOutOfRange {
                duration_secs: self.duration_secs,
                end: now.to_rfc3339(),
            }
        })
    }

    pub fn output_path(&self, project_id: &str, now: DateTime<Utc>) -> PathBuf {
        output_path(
            &self.output_dir,
            self.prefix.as_deref(),
            project_id,
            self.timestamp_in_name.then_some(now),
            self.format,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectOutcome {
    Completed {
        path: PathBuf,
        rows: usize,
        failed_rows: usize,
    },
    /// The deadline hit mid-run: the report was written with unfinished instances flagged.
    Partial {
        path: PathBuf,
        rows: usize,
        failed_rows: usize,
        reason: String,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    /// One entry per target, in the order they ran.
    pub outcomes: Vec<(String, ProjectOutcome)>,
}

impl BatchSummary {
    pub fn outcome(&self, project_id: &str) -> Option<&ProjectOutcome> {
        self.outcomes
            .iter()
            .find(|(p, _)| p == project_id)
            .map(|(_, o)| o)
    }

    pub fn failed_projects(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| !matches!(o, ProjectOutcome::Completed { .. }))
            .count()
    }

    pub fn all_completed(&self) -> bool {
        self.failed_projects() == 0
    }
}

/// Builds the HTTP backend for a target, loading its key file if it has one.
pub fn connect_cloud(
    target: &ProjectTarget,
    endpoint: &str,
    request_timeout: Duration,
) -> ReportResult<Arc<dyn MonitoringBackend>> {
    let tokens: Arc<dyn TokenSource> = match &target.credential {
        Credential::AccessToken(token) => Arc::new(StaticToken::new(token.clone())),
        Credential::KeyFile(path) => {
            let key = ServiceAccountKey::from_file(path)?;
            Arc::new(ServiceAccountTokenSource::new(
                key,
                path.clone(),
                request_timeout,
            )?)
        }
    };
    let repo = CloudMonitoringRepo::new(endpoint, request_timeout, tokens)?;
    Ok(Arc::new(repo))
}

/// Runs every target in order. Project-level failures are recorded and the batch moves on.
pub async fn run_batch<F>(
    targets: &[ProjectTarget],
    config: &RunnerConfig,
    now: DateTime<Utc>,
    connect: F,
) -> BatchSummary
where
    F: Fn(&ProjectTarget) -> ReportResult<Arc<dyn MonitoringBackend>>,
{
    let mut summary = BatchSummary::default();
    for target in targets {
        let result = match connect(target) {
            Ok(backend) => run_project(backend, &target.project_id, config, now).await,
            Err(e) => Err(e),
        };
        let outcome = match result {
            Ok((path, report)) => match report.deadline_exceeded {
                Some(secs) => {
                    let reason = ReportError::DeadlineExceeded { secs }.to_string();
                    error!(project = %target.project_id, error = %reason, "project incomplete");
                    ProjectOutcome::Partial {
                        path,
                        rows: report.rows.len(),
                        failed_rows: report.failed_rows(),
                        reason,
                    }
                }
                None => ProjectOutcome::Completed {
                    path,
                    rows: report.rows.len(),
                    failed_rows: report.failed_rows(),
                },
            },
            Err(e) => {
                error!(project = %target.project_id, error = %e, "project failed");
                ProjectOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        summary.outcomes.push((target.project_id.clone(), outcome));
    }
    info!(
        projects = summary.outcomes.len(),
        failed = summary.failed_projects(),
        "batch complete"
    );
    summary
}

/// Builds and writes the report for one project. Returns the written path.
/// A report cut short by the deadline is still written; see `ProjectReport::deadline_exceeded`.
#[instrument(skip(backend, config, now), fields(operation = "run_project"))]
pub async fn run_project(
    backend: Arc<dyn MonitoringBackend>,
    project: &str,
    config: &RunnerConfig,
    now: DateTime<Utc>,
) -> ReportResult<(PathBuf, ProjectReport)> {
    let report = build_report(backend, project, config, now).await?;

    let path = config.output_path(project, now);
    write_report(&report, &path, config.format)?;
    Ok((path, report))
}

/// Enumerates and aggregates every instance of `project` within `deadline_secs`. Rows come back
/// sorted. Instances still running at the deadline get a failed row; a deadline hit during
/// enumeration fails the project.
pub async fn build_report(
    backend: Arc<dyn MonitoringBackend>,
    project: &str,
    config: &RunnerConfig,
    now: DateTime<Utc>,
) -> ReportResult<ProjectReport> {
    let deadline_secs = config.deadline_secs;
    let deadline = Instant::now() + Duration::from_secs(deadline_secs);
    let window = config.window(now)?;
    let instances = tokio::time::timeout_at(
        deadline,
        enumerate_instances(backend.as_ref(), project, window, config.page_size),
    )
    .await
    .map_err(|_| ReportError::DeadlineExceeded {
        secs: deadline_secs,
    })??;
    info!(project, instances = instances.len(), "instances enumerated");

    let mut pending: BTreeMap<String, Instance> = instances
        .iter()
        .map(|i| (i.instance_id.clone(), i.clone()))
        .collect();
    let fetcher = MetricFetcher::new(
        backend,
        config.retry,
        config.max_points_per_request,
        config.page_size,
    );
    let mut results = stream::iter(instances)
        .map(|instance| report_instance(&fetcher, instance, window))
        .buffer_unordered(config.max_concurrent_instances.max(1));

    let mut report = ProjectReport::new(project, window, now);
    loop {
        match tokio::time::timeout_at(deadline, results.next()).await {
            Ok(Some(result)) => {
                let (row, node_rows) = result?;
                pending.remove(&row.instance.instance_id);
                report.rows.push(row);
                report.node_rows.extend(node_rows);
            }
            Ok(None) => break,
            Err(_) => {
                let reason = ReportError::DeadlineExceeded {
                    secs: deadline_secs,
                }
                .to_string();
                warn!(
                    project,
                    unfinished = pending.len(),
                    deadline_secs,
                    "deadline exceeded; flagging unfinished instances"
                );
                report.rows.extend(
                    pending
                        .into_values()
                        .map(|instance| ReportRow::failed(instance, reason.clone())),
                );
                report.notes.push(reason);
                report.deadline_exceeded = Some(deadline_secs);
                break;
            }
        }
    }
    report.sort();
    Ok(report)
}

/// Fetches and aggregates one instance. Only project-fatal errors escape; the rest mark the row failed.
async fn report_instance(
    fetcher: &MetricFetcher,
    instance: Instance,
    window: Window,
) -> ReportResult<(ReportRow, Vec<NodeRow>)> {
    let fetched = match fetcher.fetch_instance(&instance, window).await {
        Ok(f) => f,
        Err(e) if e.is_project_fatal() => return Err(e),
        Err(e) => {
            warn!(instance = %instance.instance_id, error = %e, "instance failed");
            return Ok((ReportRow::failed(instance, e.to_string()), Vec::new()));
        }
    };

    let stats = aggregate(&instance, &fetched.series);
    let node_rows = instance
        .nodes
        .iter()
        .map(|node| NodeRow {
            instance: instance.clone(),
            node: node.clone(),
            stats: stats
                .nodes
                .get(&node.id)
                .cloned()
                .unwrap_or_else(AggregatedStats::zero),
        })
        .collect();
    Ok((
        ReportRow::ok(instance, stats.instance, fetched.notes),
        node_rows,
    ))
}
