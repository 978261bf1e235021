use chrono::{DateTime, Datelike, Local, Timelike};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::ExportError;
use crate::records::Record;

/// Serializes records to a timestamped CSV file under `output_dir`.
///
/// Header row first, then one row per record with fields in `columns` order.
/// Multi-valued fields are flattened with `|`. Characters that would break
/// the row structure (commas, CR/LF) are removed from values rather than
/// quoted, so every row keeps the same arity as the header.
pub fn export_csv(
    records: &[Record],
    columns: &[String],
    output_dir: &Path,
) -> Result<PathBuf, ExportError> {
    let mut csv = String::new();
    let header: Vec<String> = columns.iter().map(|column| sanitize_cell(column)).collect();
    csv.push_str(&header.join(","));
    csv.push('\n');

    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| {
                record
                    .get(column)
                    .map(|value| sanitize_cell(&value.joined()))
                    .unwrap_or_default()
            })
            .collect();
        csv.push_str(&row.join(","));
        csv.push('\n');
    }

    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(timestamped_filename(&Local::now()));
    fs::write(&path, csv)?;

    ::log::info!("Exported {} records to {}", records.len(), path.display());
    Ok(path)
}

/// `YYYY-M-D-H-M-S.csv` from the local wall clock, no zero padding
fn timestamped_filename(now: &DateTime<Local>) -> String {
    format!(
        "{}-{}-{}-{}-{}-{}.csv",
        now.year(),
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

/// Removes the column and row delimiters from a cell value
fn sanitize_cell(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ',' | '\n' | '\r'))
        .collect()
}
