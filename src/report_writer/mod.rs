// Report rendering: fixed column layout shared by the xlsx and csv writers.

mod csv_report;
mod xlsx;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::error::{ReportError, ReportResult};
use crate::models::{AggregatedStats, NodeRow, ProjectReport, ReportRow};

pub const CLUSTER_SHEET: &str = "ClusterData";
pub const NODE_SHEET: &str = "NodeData";
pub const SUMMARY_SHEET: &str = "Summary";

/// Value written in the Source column of every row.
pub const SOURCE: &str = "MS";

pub const CLUSTER_IDENTITY_COLUMNS: [&str; 12] = [
    "Source",
    "Project ID",
    "InstanceType",
    "ClusterId",
    "InstanceId",
    "Topology",
    "NodeCount",
    "NodeType",
    "Region",
    "Zone",
    "Status",
    "Notes",
];

pub const NODE_IDENTITY_COLUMNS: [&str; 10] = [
    "Source",
    "Project ID",
    "InstanceType",
    "ClusterId",
    "InstanceId",
    "NodeId",
    "NodeRole",
    "NodeType",
    "Region",
    "Zone",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Xlsx => "xlsx",
            ReportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    /// Plain rendering for the csv writer.
    pub fn render(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
        }
    }
}

/// `<out_dir>/[<prefix>-]<project>[-<YYYYmmdd-HHMMSS>].<ext>`
pub fn output_path(
    out_dir: &Path,
    prefix: Option<&str>,
    project_id: &str,
    timestamp: Option<DateTime<Utc>>,
    format: ReportFormat,
) -> PathBuf {
    let mut name = String::new();
    if let Some(p) = prefix.filter(|p| !p.is_empty()) {
        name.push_str(p);
        name.push('-');
    }
    name.push_str(project_id);
    if let Some(ts) = timestamp {
        name.push('-');
        name.push_str(&ts.format("%Y%m%d-%H%M%S").to_string());
    }
    name.push('.');
    name.push_str(format.extension());
    out_dir.join(name)
}

pub fn cluster_header() -> Vec<String> {
    CLUSTER_IDENTITY_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(AggregatedStats::metric_columns())
        .collect()
}

pub fn node_header() -> Vec<String> {
    NODE_IDENTITY_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(AggregatedStats::metric_columns())
        .collect()
}

fn metric_cells(stats: &AggregatedStats) -> impl Iterator<Item = Cell> {
    stats.metric_values().into_iter().map(|(_, v)| Cell::Number(v))
}

pub fn cluster_record(row: &ReportRow) -> Vec<Cell> {
    let i = &row.instance;
    let mut cells = vec![
        Cell::text(SOURCE),
        Cell::text(&i.project_id),
        Cell::text(i.product.label()),
        Cell::text(&i.name),
        Cell::text(&i.instance_id),
        Cell::text(i.topology.as_str()),
        Cell::Number(i.nodes.len() as f64),
        Cell::text(i.tier.as_deref().unwrap_or_default()),
        Cell::text(i.region.as_deref().unwrap_or_default()),
        Cell::text(i.zone.as_deref().unwrap_or_default()),
        Cell::text(row.status.as_str()),
        Cell::text(row.notes_text()),
    ];
    cells.extend(metric_cells(&row.stats));
    cells
}

pub fn node_record(row: &NodeRow) -> Vec<Cell> {
    let i = &row.instance;
    let mut cells = vec![
        Cell::text(SOURCE),
        Cell::text(&i.project_id),
        Cell::text(i.product.label()),
        Cell::text(&i.name),
        Cell::text(&i.instance_id),
        Cell::text(&row.node.id),
        Cell::text(row.node.role.as_deref().unwrap_or_default()),
        Cell::text(i.tier.as_deref().unwrap_or_default()),
        Cell::text(i.region.as_deref().unwrap_or_default()),
        Cell::text(i.zone.as_deref().unwrap_or_default()),
    ];
    cells.extend(metric_cells(&row.stats));
    cells
}

/// Key/value lines for the Summary sheet, followed by failures and notes.
pub fn summary_lines(report: &ProjectReport) -> Vec<(String, String)> {
    let w = &report.window;
    let mut lines = vec![
        ("Project ID".to_string(), report.project_id.clone()),
        ("Window Start".to_string(), w.start.to_rfc3339()),
        ("Window End".to_string(), w.end.to_rfc3339()),
        ("Duration (s)".to_string(), w.duration_secs().to_string()),
        ("Step (s)".to_string(), w.step_secs.to_string()),
        ("Generated At".to_string(), report.generated_at.to_rfc3339()),
        (
            "Tool".to_string(),
            format!("{} {}", crate::version::NAME, crate::version::VERSION),
        ),
        ("Instances".to_string(), report.rows.len().to_string()),
        ("Failed Instances".to_string(), report.failed_rows().to_string()),
    ];
    for note in &report.notes {
        lines.push(("Note".to_string(), note.clone()));
    }
    for row in &report.rows {
        let text = row.notes_text();
        if !text.is_empty() {
            lines.push((row.instance.instance_id.clone(), text));
        }
    }
    lines
}

/// Writes `report` to `path`, creating parent directories and replacing any existing file.
#[instrument(skip(report), fields(project = %report.project_id, operation = "write_report"))]
pub fn write_report(report: &ProjectReport, path: &Path, format: ReportFormat) -> ReportResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ReportError::io_write(path, e))?;
    }
    match format {
        ReportFormat::Xlsx => xlsx::write(report, path)?,
        ReportFormat::Csv => csv_report::write(report, path)?,
    }
    info!(
        path = %path.display(),
        rows = report.rows.len(),
        node_rows = report.node_rows.len(),
        "report written"
    );
    Ok(())
}
