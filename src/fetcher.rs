// Per-instance metric fetch: chunked to stay under the response size limit,
// narrowed and retried (bounded) when the backend still rejects the query.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{ReportError, ReportResult};
use crate::models::{Instance, MetricKind, MetricSeries, Window};
use crate::monitoring_repo::{MonitoringBackend, SeriesQuery, TimeSeries, list_all_pages};
use crate::retry::RetryPolicy;

/// Rough number of command series per node (one per command name in use).
const COMMAND_SERIES_PER_NODE: u64 = 32;
const NODE_ID_LABELS: [&str; 2] = ["node_id", "shard_id"];

/// Series for one (instance, metric) plus the window actually queried.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub metric: MetricKind,
    pub series: Vec<MetricSeries>,
    pub requested: Window,
    /// Differs from `requested` when the query had to be narrowed.
    pub window: Window,
}

impl Fetched {
    pub fn narrowed(&self) -> bool {
        self.window != self.requested
    }

    /// Report note describing the narrowing, if any.
    pub fn note(&self) -> Option<String> {
        if !self.narrowed() {
            return None;
        }
        if self.window.step_secs != self.requested.step_secs {
            Some(format!(
                "{}: step widened from {}s to {}s",
                self.metric, self.requested.step_secs, self.window.step_secs
            ))
        } else {
            Some(format!(
                "{}: window shortened from {}s to {}s",
                self.metric,
                self.requested.duration_secs(),
                self.window.duration_secs()
            ))
        }
    }
}

/// Everything fetched for one instance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstanceSeries {
    pub series: Vec<MetricSeries>,
    pub notes: Vec<String>,
}

pub struct MetricFetcher {
    backend: Arc<dyn MonitoringBackend>,
    retry: RetryPolicy,
    max_points_per_request: u64,
    page_size: u32,
}

impl MetricFetcher {
    pub fn new(
        backend: Arc<dyn MonitoringBackend>,
        retry: RetryPolicy,
        max_points_per_request: u64,
        page_size: u32,
    ) -> Self {
        Self {
            backend,
            retry,
            max_points_per_request,
            page_size,
        }
    }

    /// Fetches every metric for `instance`, one metric at a time.
    pub async fn fetch_instance(
        &self,
        instance: &Instance,
        window: Window,
    ) -> ReportResult<InstanceSeries> {
        let mut out = InstanceSeries::default();
        for metric in MetricKind::ALL {
            let fetched = self.fetch(instance, metric, window).await?;
            if let Some(note) = fetched.note() {
                out.notes.push(note);
            }
            out.series.extend(fetched.series);
        }
        Ok(out)
    }

    /// Fetches one metric. Metrics the product does not publish yield no series.
    #[instrument(skip(self, instance, metric, window), fields(instance = %instance.name, metric = %metric, operation = "fetch"))]
    pub async fn fetch(
        &self,
        instance: &Instance,
        metric: MetricKind,
        window: Window,
    ) -> ReportResult<Fetched> {
        let Some(metric_type) = instance.product.metric_type(metric) else {
            return Ok(Fetched {
                metric,
                series: Vec::new(),
                requested: window,
                window,
            });
        };
        let base = SeriesQuery::full(
            metric,
            metric_type,
            Some((instance.product.instance_label(), instance.instance_id.as_str())),
            window,
            self.page_size,
        );

        let mut attempt = 1u32;
        let mut current = window;
        loop {
            match self.fetch_window(instance, &base, current).await {
                Ok(series) => {
                    return Ok(Fetched {
                        metric,
                        series,
                        requested: window,
                        window: current,
                    });
                }
                Err(e) if e.is_quota() => {
                    let next = if self.retry.allows_retry(attempt) {
                        self.retry.narrow(&current)
                    } else {
                        None
                    };
                    let Some(next) = next else {
                        return Err(ReportError::QuotaExceeded {
                            metric: metric_type.to_string(),
                            duration_secs: current.duration_secs(),
                            step_secs: current.step_secs,
                        });
                    };
                    warn!(
                        attempt,
                        from_step_secs = current.step_secs,
                        to_step_secs = next.step_secs,
                        from_duration_secs = current.duration_secs(),
                        to_duration_secs = next.duration_secs(),
                        "response size limit hit; narrowing query"
                    );
                    current = next;
                    attempt += 1;
                }
                Err(ReportError::NotFound(msg)) => {
                    debug!(reason = %msg, "metric not published for instance");
                    return Ok(Fetched {
                        metric,
                        series: Vec::new(),
                        requested: window,
                        window: current,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Series per request, estimated from the node count and metric.
    fn estimated_series(&self, instance: &Instance, metric: MetricKind) -> u64 {
        let nodes = instance.nodes.len().max(1) as u64;
        match metric {
            MetricKind::Commands => nodes * COMMAND_SERIES_PER_NODE,
            MetricKind::NetworkTraffic => nodes * 2,
            MetricKind::MaxMemory => 1,
            MetricKind::MemoryUsage | MetricKind::Connections => nodes,
        }
    }

    /// Splits `window` into chunks that fit the point budget and merges the results per series.
    async fn fetch_window(
        &self,
        instance: &Instance,
        base: &SeriesQuery,
        window: Window,
    ) -> ReportResult<Vec<MetricSeries>> {
        let per_series_budget =
            (self.max_points_per_request / self.estimated_series(instance, base.metric)).max(1);
        let chunks = window.split(per_series_budget);
        if chunks.len() > 1 {
            debug!(
                chunks = chunks.len(),
                per_series_budget,
                "splitting query window"
            );
        }

        let mut merged: BTreeMap<(Option<String>, BTreeMap<String, String>), MetricSeries> =
            BTreeMap::new();
        for chunk in chunks {
            let query = base.with_window(chunk);
            let series = list_all_pages(self.backend.as_ref(), &instance.project_id, &query).await?;
            for ts in series {
                let s = to_metric_series(ts, base.metric, chunk.step_secs);
                match merged.entry(s.key()) {
                    Entry::Occupied(mut e) => e.get_mut().points.extend(s.points),
                    Entry::Vacant(e) => {
                        e.insert(s);
                    }
                }
            }
        }

        let mut out: Vec<MetricSeries> = merged.into_values().collect();
        for s in &mut out {
            s.points.sort_by_key(|p| p.timestamp);
            // Instance-level series from several nodes share a key; keep the max per timestamp.
            s.points.dedup_by(|later, kept| {
                if later.timestamp != kept.timestamp {
                    return false;
                }
                kept.value = kept.value.max(later.value);
                true
            });
        }
        Ok(out)
    }
}

/// Decoded API series to the domain series. Instance-level metrics carry no node id.
pub fn to_metric_series(ts: TimeSeries, metric: MetricKind, step_secs: u64) -> MetricSeries {
    let node_id = if metric.is_instance_level() {
        None
    } else {
        Some(
            NODE_ID_LABELS
                .iter()
                .find_map(|k| ts.resource_label(k))
                .unwrap_or("unknown")
                .to_string(),
        )
    };
    MetricSeries {
        metric,
        node_id,
        labels: ts.metric_labels,
        step_secs,
        points: ts.points,
    }
}
