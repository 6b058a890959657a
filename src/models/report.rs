// Flattened report records handed to the writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AggregatedStats, Instance, Node, Window};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowStatus {
    Ok,
    Failed(String),
}

impl RowStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, RowStatus::Failed(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            RowStatus::Ok => "OK",
            RowStatus::Failed(_) => "FAILED",
        }
    }
}

/// One row per instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub instance: Instance,
    pub stats: AggregatedStats,
    pub status: RowStatus,
    /// e.g. query narrowing applied while fetching.
    pub notes: Vec<String>,
}

impl ReportRow {
    pub fn ok(instance: Instance, stats: AggregatedStats, notes: Vec<String>) -> Self {
        Self {
            instance,
            stats,
            status: RowStatus::Ok,
            notes,
        }
    }

    /// Failed instances keep their row (all-zero figures) so they are flagged, not omitted.
    pub fn failed(instance: Instance, reason: impl Into<String>) -> Self {
        Self {
            instance,
            stats: AggregatedStats::zero(),
            status: RowStatus::Failed(reason.into()),
            notes: Vec::new(),
        }
    }

    /// Status reason and notes joined for the Notes column.
    pub fn notes_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.notes.len() + 1);
        if let RowStatus::Failed(reason) = &self.status {
            parts.push(reason);
        }
        parts.extend(self.notes.iter().map(String::as_str));
        parts.join("; ")
    }
}

/// Per-node detail for the NodeData sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRow {
    pub instance: Instance,
    pub node: Node,
    pub stats: AggregatedStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub project_id: String,
    pub window: Window,
    pub generated_at: DateTime<Utc>,
    /// Sorted by instance name, then instance id.
    pub rows: Vec<ReportRow>,
    /// Sorted by instance name, instance id, node id.
    pub node_rows: Vec<NodeRow>,
    /// Project-level notes for the Summary sheet.
    pub notes: Vec<String>,
    /// Set when the run deadline cut the report short; holds the deadline in seconds.
    pub deadline_exceeded: Option<u64>,
}

impl ProjectReport {
    pub fn new(project_id: impl Into<String>, window: Window, generated_at: DateTime<Utc>) -> Self {
        Self {
            project_id: project_id.into(),
            window,
            generated_at,
            rows: Vec::new(),
            node_rows: Vec::new(),
            notes: Vec::new(),
            deadline_exceeded: None,
        }
    }

    /// Sorts rows into their stable output order.
    pub fn sort(&mut self) {
        self.rows.sort_by(|a, b| {
            (&a.instance.name, &a.instance.instance_id)
                .cmp(&(&b.instance.name, &b.instance.instance_id))
        });
        self.node_rows.sort_by(|a, b| {
            (&a.instance.name, &a.instance.instance_id, &a.node.id).cmp(&(
                &b.instance.name,
                &b.instance.instance_id,
                &b.node.id,
            ))
        });
    }

    pub fn failed_rows(&self) -> usize {
        self.rows.iter().filter(|r| r.status.is_failed()).count()
    }
}
