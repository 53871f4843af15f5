//! Tabular export of flattened report records
//!
//! Builds one table per report: the column set is the union of every key
//! seen across the records (missing cells render empty), with the run
//! timestamp as the first column of every row. An empty record set still
//! produces a one-row file so downstream consumers always find output at
//! the expected path.

use anyhow::{Context, Result};
use chrono::Local;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::flatten::FlatRecord;

pub const RUN_DATE_COLUMN: &str = "RunDate";
const EMPTY_MARKER_COLUMN: &str = "Message";
const EMPTY_MARKER_VALUE: &str = "No data found";

/// What was written, reported back up to the pipeline
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub file_path: PathBuf,
    pub file_size: u64,
    pub rows_written: usize,
}

/// Local timestamp stamped into the RunDate column
pub fn run_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Write `records` as a spreadsheet-format (CSV) table at `path`,
/// creating missing parent directories
pub fn export_records(
    records: &[FlatRecord],
    run_date: &str,
    path: &Path,
) -> Result<ExportOutcome> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating report file {}", path.display()))?;

    let rows_written = if records.is_empty() {
        writer.write_record([RUN_DATE_COLUMN, EMPTY_MARKER_COLUMN])?;
        writer.write_record([run_date, EMPTY_MARKER_VALUE])?;
        1
    } else {
        let columns: Vec<&String> = records
            .iter()
            .flat_map(|record| record.keys())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut header = Vec::with_capacity(columns.len() + 1);
        header.push(RUN_DATE_COLUMN.to_string());
        header.extend(columns.iter().map(|c| c.to_string()));
        writer.write_record(&header)?;

        for record in records {
            let mut row = Vec::with_capacity(columns.len() + 1);
            row.push(run_date.to_string());
            for column in &columns {
                row.push(record.get(*column).map(render_cell).unwrap_or_default());
            }
            writer.write_record(&row)?;
        }
        records.len()
    };

    writer.flush()?;

    let file_path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let file_size = fs::metadata(&file_path)
        .with_context(|| format!("reading size of {}", file_path.display()))?
        .len();

    Ok(ExportOutcome {
        file_path,
        file_size,
        rows_written,
    })
}

/// Render one scalar cell; nested leftovers from near-flat JSON items are
/// serialized to their JSON text
fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
