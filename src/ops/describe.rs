use crate::context::SessionContext;
use crate::envelope::{OpError, OpReport, OpResult};
use crate::resolve::{self, Correction};
use crate::selector::{parse_selector, Selector};
use crate::stats::{self, FiveNumber};
use crate::table::{format_number, DataTable};
use anyhow::Result;

/// Summary statistics (count, mean, std, min, quartiles, max) for numeric
/// columns, rendered as a CSV table with one row per statistic.
///
/// The selector narrows the columns; a selection that leaves no numeric
/// column falls back to every numeric column. A dataset without numeric
/// columns cannot be described at all.
pub fn run(ctx: &SessionContext, selector: &str) -> OpResult {
    let dataset = ctx.snapshot().ok_or(OpError::NoDatasetLoaded)?;
    let table = &dataset.table;
    let all_numeric = table.numeric_column_names();
    if all_numeric.is_empty() {
        return Err(OpError::NoNumericColumns);
    }

    let mut corrections: Vec<Correction> = Vec::new();
    let chosen = match parse_selector(selector) {
        Selector::All => all_numeric,
        Selector::First(n) => {
            let subset = numeric_part(table, table.column_names().into_iter().take(n));
            if subset.is_empty() {
                all_numeric
            } else {
                subset
            }
        }
        Selector::Names(requested) => {
            let resolution = resolve::resolve_columns(
                &requested,
                &table.column_names(),
                resolve::DEFAULT_THRESHOLD,
            );
            let subset = numeric_part(table, dedup(resolution.matched).into_iter());
            if subset.is_empty() {
                all_numeric
            } else {
                corrections = resolution.corrections;
                subset
            }
        }
    };

    let text = statistics_table(table, &chosen)
        .map_err(|e| OpError::RenderError { detail: e.to_string() })?;
    Ok(OpReport::csv(text).with_corrections(corrections))
}

fn numeric_part(table: &DataTable, names: impl Iterator<Item = String>) -> Vec<String> {
    names
        .filter(|name| table.column(name).map(|c| c.is_numeric()).unwrap_or(false))
        .collect()
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut seen = Vec::new();
    for name in names {
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

struct ColumnSummary {
    count: usize,
    mean: Option<f64>,
    std: Option<f64>,
    five: Option<FiveNumber>,
}

fn statistics_table(table: &DataTable, chosen: &[String]) -> Result<String> {
    let summaries: Vec<ColumnSummary> = chosen
        .iter()
        .map(|name| {
            let values = table
                .column(name)
                .map(|c| c.numeric_values())
                .unwrap_or_default();
            let sorted = stats::sorted(&values);
            ColumnSummary {
                count: values.len(),
                mean: stats::mean(&values),
                std: stats::sample_std(&values),
                five: stats::five_number(&sorted),
            }
        })
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header = vec![String::new()];
    header.extend(chosen.iter().cloned());
    writer.write_record(&header)?;

    write_row(&mut writer, "count", &summaries, |s| Some(s.count.to_string()))?;
    write_row(&mut writer, "mean", &summaries, |s| s.mean.map(format_number))?;
    write_row(&mut writer, "std", &summaries, |s| s.std.map(format_number))?;
    write_row(&mut writer, "min", &summaries, |s| {
        s.five.map(|f| format_number(f.min))
    })?;
    write_row(&mut writer, "25%", &summaries, |s| {
        s.five.map(|f| format_number(f.q1))
    })?;
    write_row(&mut writer, "50%", &summaries, |s| {
        s.five.map(|f| format_number(f.median))
    })?;
    write_row(&mut writer, "75%", &summaries, |s| {
        s.five.map(|f| format_number(f.q3))
    })?;
    write_row(&mut writer, "max", &summaries, |s| {
        s.five.map(|f| format_number(f.max))
    })?;

    writer.flush()?;
    Ok(String::from_utf8(writer.into_inner()?)?)
}

fn write_row<F>(
    writer: &mut csv::Writer<Vec<u8>>,
    label: &str,
    summaries: &[ColumnSummary],
    cell: F,
) -> Result<()>
where
    F: Fn(&ColumnSummary) -> Option<String>,
{
    let mut record = vec![label.to_string()];
    record.extend(summaries.iter().map(|s| cell(s).unwrap_or_default()));
    writer.write_record(&record)?;
    Ok(())
}
