// Workbook output: ClusterData, NodeData and Summary sheets.

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::path::Path;

use super::{
    CLUSTER_SHEET, Cell, NODE_SHEET, SUMMARY_SHEET, cluster_header, cluster_record, node_header,
    node_record, summary_lines,
};
use crate::error::{ReportError, ReportResult};
use crate::models::ProjectReport;

pub(super) fn write(report: &ProjectReport, path: &Path) -> ReportResult<()> {
    let mut workbook = build(report).map_err(|e| ReportError::io_write(path, e))?;
    workbook
        .save(path)
        .map_err(|e| ReportError::io_write(path, e))
}

fn build(report: &ProjectReport) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(CLUSTER_SHEET)?;
    write_table(
        sheet,
        &bold,
        &cluster_header(),
        report.rows.iter().map(cluster_record),
    )?;

    let sheet = workbook.add_worksheet();
    sheet.set_name(NODE_SHEET)?;
    write_table(
        sheet,
        &bold,
        &node_header(),
        report.node_rows.iter().map(node_record),
    )?;

    let sheet = workbook.add_worksheet();
    sheet.set_name(SUMMARY_SHEET)?;
    for (row, (key, value)) in summary_lines(report).iter().enumerate() {
        let row = row as u32;
        sheet.write_string_with_format(row, 0, key, &bold)?;
        sheet.write_string(row, 1, value)?;
    }
    sheet.set_column_width(0, 24)?;

    Ok(workbook)
}

fn write_table(
    sheet: &mut Worksheet,
    header_format: &Format,
    header: &[String],
    records: impl Iterator<Item = Vec<Cell>>,
) -> Result<(), XlsxError> {
    for (col, name) in header.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, name, header_format)?;
    }
    sheet.set_freeze_panes(1, 0)?;
    for (i, record) in records.enumerate() {
        let row = (i + 1) as u32;
        for (col, cell) in record.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Text(s) => sheet.write_string(row, col, s)?,
                Cell::Number(n) => sheet.write_number(row, col, *n)?,
            };
        }
    }
    Ok(())
}
