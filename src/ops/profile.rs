use crate::context::SessionContext;
use crate::envelope::{OpError, OpReport, OpResult};
use crate::ops::parse_params;
use crate::resolve::{self, Correction};
use crate::stats;
use crate::table::Column;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct ProfileParams {
    pub column: String,
}

/// Accepts either the JSON object form or a bare column name.
pub fn run_raw(ctx: &SessionContext, payload: &str) -> OpResult {
    let trimmed = payload.trim();
    let params = if trimmed.starts_with('{') {
        parse_params::<ProfileParams>(payload)?
    } else if trimmed.is_empty() {
        return Err(OpError::InvalidSpec {
            detail: "expected a column name".to_string(),
        });
    } else {
        ProfileParams {
            column: trimmed.to_string(),
        }
    };
    run(ctx, &params)
}

/// Single-column profile: type, missingness, cardinality, top values,
/// and for numeric columns the summary statistics with IQR outlier info.
pub fn run(ctx: &SessionContext, params: &ProfileParams) -> OpResult {
    let dataset = ctx.snapshot().ok_or(OpError::NoDatasetLoaded)?;
    let table = &dataset.table;
    let names = table.column_names();

    let resolved = resolve::resolve_column(&params.column, &names, resolve::DEFAULT_THRESHOLD)
        .ok_or_else(|| OpError::column_not_found(&params.column, &names))?;
    let mut corrections = Vec::new();
    if resolved != params.column {
        corrections.push(Correction {
            requested: params.column.clone(),
            resolved: resolved.clone(),
        });
    }

    // Lookup cannot miss: the resolver only returns names the table has.
    let col = table
        .column(&resolved)
        .ok_or_else(|| OpError::column_not_found(&resolved, &names))?;

    let total_rows = table.row_count();
    let missing = col.missing_count();
    let missing_pct = if total_rows > 0 {
        stats::round2(missing as f64 / total_rows as f64 * 100.0)
    } else {
        0.0
    };

    let counts = col.value_counts();
    let top_values: Vec<Value> = counts
        .iter()
        .take(10)
        .map(|(value, count)| json!({"value": value, "count": count}))
        .collect();

    let mut payload = json!({
        "column": resolved,
        "dtype": col.column_type().to_string(),
        "missing": {"count": missing, "percentage": missing_pct},
        "cardinality": counts.len(),
        "top_values": top_values,
    });

    if col.is_numeric() {
        if let Some(object) = payload.as_object_mut() {
            object.insert("numeric_stats".to_string(), numeric_stats(col));
        }
    }

    Ok(OpReport::json(payload).with_corrections(corrections))
}

fn numeric_stats(col: &Column) -> Value {
    let values = col.numeric_values();
    let sorted = stats::sorted(&values);
    let five = stats::five_number(&sorted);

    let (outlier_count, bounds) = match five {
        Some(f) => {
            let (lower, upper) = stats::iqr_fences(f.q1, f.q3);
            let count = values.iter().filter(|&&v| v < lower || v > upper).count();
            (count, Some((lower, upper)))
        }
        None => (0, None),
    };

    // Full precision throughout: the reported bounds are the exact fences
    // the outlier count was flagged against.
    json!({
        "min": five.map(|f| f.min),
        "max": five.map(|f| f.max),
        "mean": stats::mean(&values),
        "median": five.map(|f| f.median),
        "std": stats::sample_std(&values),
        "skewness": stats::skewness(&values),
        "outliers": {
            "count": outlier_count,
            "lower_bound": bounds.map(|(l, _)| l),
            "upper_bound": bounds.map(|(_, u)| u),
        },
    })
}
