use crate::table::{Column, DataTable};
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Load a CSV file with headers into a typed table.
pub fn load_csv(path: &Path) -> Result<DataTable> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file '{}'", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("Failed to read CSV record")?;
        rows.push(record.iter().map(|f| f.to_string()).collect());
    }

    from_rows(headers, rows)
}

/// Build a typed table from raw string cells, inferring one type per column.
pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<DataTable> {
    let columns = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let cells: Vec<&str> = rows
                .iter()
                .map(|row| row.get(idx).map(String::as_str).unwrap_or(""))
                .collect();
            build_column(name, &cells)
        })
        .collect();
    DataTable::new(columns)
}

/// Tokens treated as missing cells, compared after trimming and lowercasing.
fn is_missing(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    matches!(lowered.as_str(), "" | "na" | "n/a" | "null" | "none" | "nan")
}

fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" => Some(true),
        "false" | "f" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn parse_numeric(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_temporal(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(t);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(d.and_hms_opt(0, 0, 0).unwrap_or_default());
        }
    }
    None
}

/// A column gets a non-text type only when every non-missing cell parses
/// as that type. Mixed columns fall back to text.
fn build_column(name: &str, cells: &[&str]) -> Column {
    let present: Vec<&str> = cells.iter().copied().filter(|c| !is_missing(c)).collect();

    if !present.is_empty() && present.iter().all(|c| parse_numeric(c).is_some()) {
        return Column::numeric(
            name,
            cells
                .iter()
                .map(|c| if is_missing(c) { None } else { parse_numeric(c) })
                .collect(),
        );
    }
    if !present.is_empty() && present.iter().all(|c| parse_boolean(c).is_some()) {
        return Column::boolean(
            name,
            cells
                .iter()
                .map(|c| if is_missing(c) { None } else { parse_boolean(c) })
                .collect(),
        );
    }
    if !present.is_empty() && present.iter().all(|c| parse_temporal(c).is_some()) {
        return Column::temporal(
            name,
            cells
                .iter()
                .map(|c| if is_missing(c) { None } else { parse_temporal(c) })
                .collect(),
        );
    }
    Column::text(
        name,
        cells
            .iter()
            .map(|c| {
                if is_missing(c) {
                    None
                } else {
                    Some(c.trim().to_string())
                }
            })
            .collect(),
    )
}
