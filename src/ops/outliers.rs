use crate::context::SessionContext;
use crate::envelope::{OpError, OpReport, OpResult};
use crate::ops::parse_params;
use crate::resolve::{self, Correction};
use crate::stats;
use serde::Deserialize;
use serde_json::json;

const ZSCORE_THRESHOLD: f64 = 3.0;

#[derive(Debug, Deserialize)]
pub struct OutlierParams {
    pub column: String,
    #[serde(default)]
    pub method: Option<String>,
}

pub fn run_raw(ctx: &SessionContext, payload: &str) -> OpResult {
    run(ctx, &parse_params(payload)?)
}

/// Flag outliers in one numeric column, by IQR fences (default) or by
/// population z-score above 3. Both methods look at non-missing values
/// only; a zero-spread column has no z-score outliers.
pub fn run(ctx: &SessionContext, params: &OutlierParams) -> OpResult {
    let dataset = ctx.snapshot().ok_or(OpError::NoDatasetLoaded)?;
    let table = &dataset.table;
    let names = table.column_names();

    let method = params
        .method
        .as_deref()
        .unwrap_or("iqr")
        .trim()
        .to_lowercase();
    if method != "iqr" && method != "zscore" {
        return Err(OpError::InvalidMethod {
            given: params.method.clone().unwrap_or_default(),
            expected: vec!["iqr".to_string(), "zscore".to_string()],
        });
    }

    let resolved = resolve::resolve_column(&params.column, &names, resolve::DEFAULT_THRESHOLD)
        .ok_or_else(|| OpError::column_not_found(&params.column, &names))?;
    let mut corrections = Vec::new();
    if resolved != params.column {
        corrections.push(Correction {
            requested: params.column.clone(),
            resolved: resolved.clone(),
        });
    }

    let col = table
        .column(&resolved)
        .ok_or_else(|| OpError::column_not_found(&resolved, &names))?;
    if !col.is_numeric() {
        return Err(OpError::NotNumeric { column: resolved });
    }

    let values = col.numeric_values();
    let mut object = serde_json::Map::new();
    object.insert("column".to_string(), json!(resolved));
    object.insert("method".to_string(), json!(method));

    let outliers: Vec<f64> = if method == "iqr" {
        let sorted = stats::sorted(&values);
        match stats::five_number(&sorted) {
            Some(five) => {
                let (lower, upper) = stats::iqr_fences(five.q1, five.q3);
                // Fences go out exactly as used for flagging below.
                object.insert("lower_bound".to_string(), json!(lower));
                object.insert("upper_bound".to_string(), json!(upper));
                values
                    .iter()
                    .copied()
                    .filter(|&v| v < lower || v > upper)
                    .collect()
            }
            None => {
                object.insert("lower_bound".to_string(), json!(null));
                object.insert("upper_bound".to_string(), json!(null));
                Vec::new()
            }
        }
    } else {
        object.insert("threshold".to_string(), json!(ZSCORE_THRESHOLD));
        match (stats::mean(&values), stats::population_std(&values)) {
            (Some(m), Some(s)) if s > 0.0 => values
                .iter()
                .copied()
                .filter(|v| ((v - m) / s).abs() > ZSCORE_THRESHOLD)
                .collect(),
            _ => Vec::new(),
        }
    };

    let percentage = if values.is_empty() {
        0.0
    } else {
        stats::round2(outliers.len() as f64 / values.len() as f64 * 100.0)
    };
    object.insert("count".to_string(), json!(outliers.len()));
    object.insert("percentage".to_string(), json!(percentage));
    object.insert(
        "outlier_min".to_string(),
        json!(outliers.iter().copied().fold(None::<f64>, |acc, v| {
            Some(acc.map_or(v, |a| a.min(v)))
        })),
    );
    object.insert(
        "outlier_max".to_string(),
        json!(outliers.iter().copied().fold(None::<f64>, |acc, v| {
            Some(acc.map_or(v, |a| a.max(v)))
        })),
    );

    Ok(OpReport::json(serde_json::Value::Object(object)).with_corrections(corrections))
}
