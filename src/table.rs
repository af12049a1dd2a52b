use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Inferred scalar type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Text,
    Boolean,
    Temporal,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
            ColumnType::Temporal => "temporal",
        };
        write!(f, "{}", tag)
    }
}

/// Typed cell storage; `None` is a missing cell.
#[derive(Debug, Clone)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Boolean(Vec<Option<bool>>),
    Temporal(Vec<Option<NaiveDateTime>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Temporal(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn missing_count(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnData::Text(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnData::Boolean(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnData::Temporal(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }
}

/// A named, typed column with positionally aligned cells.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Column {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Column {
            name: name.into(),
            data: ColumnData::Text(values),
        }
    }

    pub fn boolean(name: impl Into<String>, values: Vec<Option<bool>>) -> Self {
        Column {
            name: name.into(),
            data: ColumnData::Boolean(values),
        }
    }

    pub fn temporal(name: impl Into<String>, values: Vec<Option<NaiveDateTime>>) -> Self {
        Column {
            name: name.into(),
            data: ColumnData::Temporal(values),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self.data {
            ColumnData::Numeric(_) => ColumnType::Numeric,
            ColumnData::Text(_) => ColumnType::Text,
            ColumnData::Boolean(_) => ColumnType::Boolean,
            ColumnData::Temporal(_) => ColumnType::Temporal,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Numeric(_))
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self.data, ColumnData::Temporal(_))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.data.missing_count()
    }

    pub fn non_missing_count(&self) -> usize {
        self.len() - self.missing_count()
    }

    /// Non-missing values of a numeric column, in row order.
    /// Empty for non-numeric columns.
    pub fn numeric_values(&self) -> Vec<f64> {
        match &self.data {
            ColumnData::Numeric(v) => v.iter().filter_map(|c| *c).collect(),
            _ => Vec::new(),
        }
    }

    /// Numeric cells aligned with row positions (missing preserved).
    /// Used for pairwise statistics across columns.
    pub fn numeric_cells(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Numeric(v) => Some(v),
            _ => None,
        }
    }

    /// Cells projected onto a continuous axis: numeric values as-is,
    /// temporal values as epoch seconds. `None` for text and boolean
    /// columns.
    pub fn continuous_cells(&self) -> Option<Vec<Option<f64>>> {
        match &self.data {
            ColumnData::Numeric(v) => Some(v.clone()),
            ColumnData::Temporal(v) => Some(
                v.iter()
                    .map(|c| c.map(|t| t.and_utc().timestamp() as f64))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// One cell rendered as a display string; `None` for a missing cell
    /// or an out-of-range row.
    pub fn display_cell(&self, row: usize) -> Option<String> {
        match &self.data {
            ColumnData::Numeric(v) => v.get(row).copied().flatten().map(format_number),
            ColumnData::Text(v) => v.get(row).cloned().flatten(),
            ColumnData::Boolean(v) => v.get(row).copied().flatten().map(|b| b.to_string()),
            ColumnData::Temporal(v) => v
                .get(row)
                .copied()
                .flatten()
                .map(|t| format_timestamp(&t)),
        }
    }

    /// Numeric cell at a row; `None` for missing, out of range, or a
    /// non-numeric column.
    pub fn numeric_cell(&self, row: usize) -> Option<f64> {
        match &self.data {
            ColumnData::Numeric(v) => v.get(row).copied().flatten(),
            _ => None,
        }
    }

    /// Continuous value at a row, with temporal cells taken as their
    /// epoch seconds.
    pub fn continuous_cell(&self, row: usize) -> Option<f64> {
        match &self.data {
            ColumnData::Numeric(v) => v.get(row).copied().flatten(),
            ColumnData::Temporal(v) => v
                .get(row)
                .copied()
                .flatten()
                .map(|t| t.and_utc().timestamp() as f64),
            _ => None,
        }
    }

    /// Distinct non-missing display values in order of first appearance.
    pub fn distinct_in_order(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for value in self.display_values() {
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        seen
    }

    /// Frequency of each distinct non-missing value, count-descending and
    /// ties broken by ascending value.
    pub fn value_counts(&self) -> Vec<(String, usize)> {
        let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for value in self.display_values() {
            *counts.entry(value).or_insert(0) += 1;
        }
        let mut out: Vec<(String, usize)> = counts.into_iter().collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    /// Non-missing cells rendered as display strings, in row order.
    /// The rendering is what frequency counts and category labels use.
    pub fn display_values(&self) -> Vec<String> {
        match &self.data {
            ColumnData::Numeric(v) => v.iter().filter_map(|c| c.map(format_number)).collect(),
            ColumnData::Text(v) => v.iter().filter_map(|c| c.clone()).collect(),
            ColumnData::Boolean(v) => v
                .iter()
                .filter_map(|c| c.map(|b| b.to_string()))
                .collect(),
            ColumnData::Temporal(v) => v
                .iter()
                .filter_map(|c| c.map(|t| format_timestamp(&t)))
                .collect(),
        }
    }
}

/// Render a numeric cell the way payloads and category labels show it.
pub fn format_number(v: f64) -> String {
    format!("{}", v)
}

/// Midnight timestamps came from date-only cells; render them without the
/// time part.
pub fn format_timestamp(t: &NaiveDateTime) -> String {
    if t.time() == chrono::NaiveTime::MIN {
        t.format("%Y-%m-%d").to_string()
    } else {
        t.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// An immutable in-memory table: ordered named columns with equal row counts.
#[derive(Debug, Clone)]
pub struct DataTable {
    columns: Vec<Column>,
}

impl DataTable {
    /// Build a table, enforcing unique names and aligned row counts.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.name.clone()) {
                return Err(anyhow!("Duplicate column name '{}'", col.name));
            }
        }
        if let Some(first) = columns.first() {
            let rows = first.len();
            for col in &columns {
                if col.len() != rows {
                    return Err(anyhow!(
                        "Column '{}' has {} rows, expected {}",
                        col.name,
                        col.len(),
                        rows
                    ));
                }
            }
        }
        Ok(DataTable { columns })
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Exact-name lookup. Fuzzy lookup is the resolver's job.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in table order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Names of numeric columns, in table order.
    pub fn numeric_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.clone())
            .collect()
    }

    /// Values of a numeric column grouped by the display value of a key
    /// column, groups in order of first appearance. Rows where either cell
    /// is missing are skipped. Without a key every value lands in a single
    /// group labelled with the value column's name.
    pub fn grouped_numeric(&self, key: Option<&str>, value: &str) -> Vec<(String, Vec<f64>)> {
        let Some(value_col) = self.column(value) else {
            return Vec::new();
        };
        let Some(key_name) = key else {
            return vec![(value.to_string(), value_col.numeric_values())];
        };
        let Some(key_col) = self.column(key_name) else {
            return Vec::new();
        };
        let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
        for row in 0..self.row_count() {
            let (Some(label), Some(v)) = (key_col.display_cell(row), value_col.numeric_cell(row))
            else {
                continue;
            };
            match groups.iter_mut().find(|(name, _)| *name == label) {
                Some((_, values)) => values.push(v),
                None => groups.push((label, vec![v])),
            }
        }
        groups
    }
}
