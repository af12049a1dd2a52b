use crate::context::SessionContext;
use crate::envelope::{OpError, OpReport, OpResult};
use crate::resolve;
use crate::stats;
use serde_json::{json, Map, Value};

/// Pairwise correlation matrix over the requested numeric columns.
///
/// The parameter ladder is strict: `columns` must be a non-empty array of
/// strings; every name must resolve (one miss fails the whole request);
/// non-numeric columns are then dropped, and at least one numeric column
/// must survive. `method` is `pearson` (default) or `spearman`.
pub fn run_raw(ctx: &SessionContext, payload: &str) -> OpResult {
    let dataset = ctx.snapshot().ok_or(OpError::NoDatasetLoaded)?;
    let table = &dataset.table;

    let value: Value = if payload.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str(payload).map_err(|e| OpError::InvalidSpec {
            detail: e.to_string(),
        })?
    };
    let object = value.as_object().ok_or_else(|| OpError::InvalidSpec {
        detail: "expected a JSON object with parameters".to_string(),
    })?;

    let requested = match object.get("columns") {
        None | Some(Value::Null) => return Err(OpError::NoColumnsProvided),
        Some(Value::Array(items)) if items.is_empty() => return Err(OpError::NoColumnsProvided),
        Some(Value::Array(items)) => {
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(s) => names.push(s.to_string()),
                    None => {
                        return Err(OpError::InvalidSpec {
                            detail: "'columns' entries must be strings".to_string(),
                        })
                    }
                }
            }
            names
        }
        Some(_) => return Err(OpError::NoColumnsProvided),
    };

    let method = match object.get("method") {
        None | Some(Value::Null) => "pearson".to_string(),
        Some(Value::String(s)) => {
            let lowered = s.trim().to_lowercase();
            if lowered != "pearson" && lowered != "spearman" {
                return Err(OpError::InvalidMethod {
                    given: s.clone(),
                    expected: vec!["pearson".to_string(), "spearman".to_string()],
                });
            }
            lowered
        }
        Some(_) => {
            return Err(OpError::InvalidSpec {
                detail: "'method' must be a string".to_string(),
            })
        }
    };

    let names = table.column_names();
    let resolution = resolve::resolve_columns(&requested, &names, resolve::DEFAULT_THRESHOLD);
    if !resolution.not_found.is_empty() {
        return Err(OpError::columns_not_found(&resolution.not_found, &names));
    }

    // Duplicates collapse to the first occurrence, keeping request order.
    let mut included: Vec<String> = Vec::new();
    for name in resolution.matched {
        if !included.contains(&name) {
            included.push(name);
        }
    }
    included.retain(|name| {
        table
            .column(name)
            .map(|c| c.is_numeric())
            .unwrap_or(false)
    });
    if included.is_empty() {
        return Err(OpError::NoNumericColumns);
    }

    let cells: Vec<&[Option<f64>]> = included
        .iter()
        .filter_map(|name| table.column(name).and_then(|c| c.numeric_cells()))
        .collect();

    let k = included.len();
    let mut matrix: Vec<Vec<Option<f64>>> = vec![vec![None; k]; k];
    for i in 0..k {
        matrix[i][i] = Some(1.0);
        for j in (i + 1)..k {
            let (xs, ys) = stats::pairwise_complete(cells[i], cells[j]);
            let r = match method.as_str() {
                "spearman" => stats::spearman(&xs, &ys),
                _ => stats::pearson(&xs, &ys),
            }
            .map(stats::round4);
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }

    let mut nested = Map::new();
    for (i, row_name) in included.iter().enumerate() {
        let mut row = Map::new();
        for (j, col_name) in included.iter().enumerate() {
            row.insert(col_name.clone(), json!(matrix[i][j]));
        }
        nested.insert(row_name.clone(), Value::Object(row));
    }

    let payload = json!({
        "method": method,
        "columns": included,
        "matrix": nested,
    });
    Ok(OpReport::json(payload).with_corrections(resolution.corrections))
}
