// CSV output: the ClusterData layout only.

use std::path::Path;

use super::{cluster_header, cluster_record};
use crate::error::{ReportError, ReportResult};
use crate::models::ProjectReport;

pub(super) fn write(report: &ProjectReport, path: &Path) -> ReportResult<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| ReportError::io_write(path, e))?;
    writer
        .write_record(cluster_header())
        .map_err(|e| ReportError::io_write(path, e))?;
    for row in &report.rows {
        let record: Vec<String> = cluster_record(row).iter().map(|c| c.render()).collect();
        writer
            .write_record(&record)
            .map_err(|e| ReportError::io_write(path, e))?;
    }
    writer.flush().map_err(|e| ReportError::io_write(path, e))
}
