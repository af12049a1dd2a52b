use crate::context::SessionContext;
use crate::envelope::{OpError, OpReport, OpResult};
use crate::ops::parse_params;
use crate::resolve::{self, Correction};
use crate::stats;
use serde::Deserialize;
use serde_json::{json, Map};

const DEFAULT_TOP_K: usize = 10;

#[derive(Debug, Deserialize)]
pub struct DistributionParams {
    pub column: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

pub fn run_raw(ctx: &SessionContext, payload: &str) -> OpResult {
    run(ctx, &parse_params(payload)?)
}

/// Frequency distribution of one column's values: the top K categories
/// with counts and percentages of the non-missing total, and an
/// `__other__` bucket aggregating whatever K cut off.
pub fn run(ctx: &SessionContext, params: &DistributionParams) -> OpResult {
    let dataset = ctx.snapshot().ok_or(OpError::NoDatasetLoaded)?;
    let table = &dataset.table;
    let names = table.column_names();
    let top_k = params.top_k.unwrap_or(DEFAULT_TOP_K);

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

    let counts = col.value_counts();
    let cardinality = counts.len();
    let non_missing = col.non_missing_count();
    let pct = |count: usize| {
        if non_missing == 0 {
            0.0
        } else {
            stats::round2(count as f64 / non_missing as f64 * 100.0)
        }
    };

    let mut distribution = Map::new();
    for (value, count) in counts.iter().take(top_k) {
        distribution.insert(
            value.clone(),
            json!({"count": count, "percentage": pct(*count)}),
        );
    }
    if cardinality > top_k {
        let rest: usize = counts.iter().skip(top_k).map(|(_, c)| c).sum();
        distribution.insert(
            "__other__".to_string(),
            json!({"count": rest, "percentage": pct(rest)}),
        );
    }

    let payload = json!({
        "column": resolved,
        "cardinality": cardinality,
        "top_k": top_k,
        "distribution": distribution,
    });
    Ok(OpReport::json(payload).with_corrections(corrections))
}
