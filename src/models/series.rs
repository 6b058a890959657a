// Query windows and fetched time series.

use chrono::{DateTime, Duration, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::MetricKind;

/// Time range plus alignment step for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step_secs: u64,
}

impl Window {
    /// Window of `duration_secs` ending at `end`. None when the start falls outside chrono's range.
    pub fn ending_at(end: DateTime<Utc>, duration_secs: u64, step_secs: u64) -> Option<Self> {
        let span = TimeDelta::try_seconds(i64::try_from(duration_secs).ok()?)?;
        Some(Self {
            start: end.checked_sub_signed(span)?,
            end,
            step_secs,
        })
    }

    pub fn duration_secs(&self) -> u64 {
        (self.end - self.start).num_seconds().max(0) as u64
    }

    /// Points one aligned series will carry over this window.
    pub fn expected_points(&self) -> u64 {
        if self.step_secs == 0 {
            return self.duration_secs();
        }
        self.duration_secs().div_ceil(self.step_secs)
    }

    pub fn with_step(&self, step_secs: u64) -> Self {
        Self { step_secs, ..*self }
    }

    /// Same end, shorter duration.
    pub fn shortened_to(&self, duration_secs: u64) -> Option<Self> {
        Self::ending_at(self.end, duration_secs, self.step_secs)
    }

    /// Consecutive sub-windows of at most `max_points` steps each, covering the whole window.
    /// Chunk boundaries fall on step multiples from `start`.
    pub fn split(&self, max_points: u64) -> Vec<Window> {
        if max_points == 0 || self.expected_points() <= max_points {
            return vec![*self];
        }
        let chunk_secs = (max_points * self.step_secs.max(1)) as i64;
        let mut out = Vec::with_capacity(self.expected_points().div_ceil(max_points) as usize);
        let mut start = self.start;
        while start < self.end {
            let end = (start + Duration::seconds(chunk_secs)).min(self.end);
            out.push(Window {
                start,
                end,
                step_secs: self.step_secs,
            });
            start = end;
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Unix seconds (end of the aligned interval).
    pub timestamp: i64,
    pub value: f64,
}

/// Time-ordered samples for one (instance-or-node, metric) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub metric: MetricKind,
    /// None for instance-level series (capacity).
    pub node_id: Option<String>,
    /// Metric labels such as `cmd`, `role`, `direction`.
    pub labels: BTreeMap<String, String>,
    /// Step the backend aligned these points to.
    pub step_secs: u64,
    pub points: Vec<Point>,
}

impl MetricSeries {
    pub fn new(metric: MetricKind, node_id: Option<&str>, step_secs: u64) -> Self {
        Self {
            metric,
            node_id: node_id.map(str::to_string),
            labels: BTreeMap::new(),
            step_secs,
            points: Vec::new(),
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_points(mut self, points: impl IntoIterator<Item = (i64, f64)>) -> Self {
        self.points = points
            .into_iter()
            .map(|(timestamp, value)| Point { timestamp, value })
            .collect();
        self.points.sort_by_key(|p| p.timestamp);
        self
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Series identity used to merge chunked fetches: node plus metric labels.
    pub fn key(&self) -> (Option<String>, BTreeMap<String, String>) {
        (self.node_id.clone(), self.labels.clone())
    }
}
