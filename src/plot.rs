//! Plot dispatch: validate a chart request, resolve its columns, fill in
//! defaults, summarize the plotted data and hand the drawing to a
//! [`Renderer`].
//!
//! The data summary rides along in the success payload so a caller can
//! narrate the chart without re-deriving statistics from the dataset.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::context::SessionContext;
use crate::envelope::{OpError, OpReport, OpResult};
use crate::ops;
use crate::render::{PlotKind, RenderRequest, Renderer};
use crate::resolve::{self, Correction};
use crate::stats;
use crate::table::{Column, DataTable};

#[derive(Debug, Default, Deserialize)]
pub struct PlotParams {
    pub plot_type: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
    pub hue: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    pub title: Option<String>,
}

/// Raw payload in, envelope out. An empty payload is a plain histogram
/// request over the first numeric column.
pub fn run_raw(ctx: &SessionContext, renderer: &dyn Renderer, payload: &str) -> OpResult {
    let params = if payload.trim().is_empty() {
        PlotParams::default()
    } else {
        ops::parse_params(payload)?
    };
    run(ctx, renderer, &params)
}

pub fn run(ctx: &SessionContext, renderer: &dyn Renderer, params: &PlotParams) -> OpResult {
    let dataset = ctx.snapshot().ok_or(OpError::NoDatasetLoaded)?;
    let table = &dataset.table;

    let kind = match params.plot_type.as_deref() {
        None => PlotKind::Histogram,
        Some(raw) => {
            PlotKind::from_name(&raw.trim().to_lowercase()).ok_or_else(|| {
                OpError::UnsupportedKind {
                    given: raw.to_string(),
                    supported: PlotKind::supported_names(),
                }
            })?
        }
    };

    let names = table.column_names();
    let mut corrections = Vec::new();
    let mut x = resolve_axis(params.x.as_deref(), &names, &mut corrections)?;
    let mut y = resolve_axis(params.y.as_deref(), &names, &mut corrections)?;
    let hue = resolve_axis(params.hue.as_deref(), &names, &mut corrections)?;
    let explicit = resolve_batch(&params.columns, &names, &mut corrections)?;

    // Histogram and boxplot fall back to the first numeric column; a
    // boxplot also picks the next distinct numeric column as its value
    // axis when the dataset offers more than one.
    let numeric = table.numeric_column_names();
    if x.is_none() && matches!(kind, PlotKind::Histogram | PlotKind::Boxplot) {
        x = Some(numeric.first().cloned().ok_or(OpError::NoNumericColumns)?);
    }
    if y.is_none() && kind == PlotKind::Boxplot && numeric.len() > 1 {
        let next = numeric
            .iter()
            .find(|n| Some(n.as_str()) != x.as_deref())
            .unwrap_or(&numeric[0]);
        y = Some(next.clone());
    }

    match kind {
        PlotKind::Histogram | PlotKind::Countplot => {
            require(&x, "x", kind)?;
        }
        PlotKind::Bar => {
            require(&x, "x", kind)?;
            let y_name = require(&y, "y", kind)?;
            require_numeric(table, &y_name)?;
        }
        PlotKind::Scatter | PlotKind::Line => {
            let x_name = require(&x, "x", kind)?;
            let y_name = require(&y, "y", kind)?;
            require_continuous(table, &x_name)?;
            require_numeric(table, &y_name)?;
        }
        PlotKind::Boxplot | PlotKind::Violin => {
            let y_name = require(&y, "y", kind)?;
            require_numeric(table, &y_name)?;
        }
        PlotKind::Heatmap | PlotKind::Pairplot => {}
    }

    let involved: Vec<String> = match kind {
        PlotKind::Heatmap => {
            let selected = if !explicit.is_empty() {
                numeric_subset(table, &explicit)
            } else if x.is_some() || y.is_some() {
                let provided: Vec<String> = [x.clone(), y.clone()].into_iter().flatten().collect();
                numeric_subset(table, &provided)
            } else {
                numeric.clone()
            };
            // A single column still renders, as a 1x1 matrix.
            if selected.is_empty() {
                return Err(OpError::NoNumericColumns);
            }
            selected
        }
        PlotKind::Pairplot => {
            let selected = if !explicit.is_empty() {
                numeric_subset(table, &explicit)
            } else {
                let provided: Vec<String> = [x.clone(), y.clone(), hue.clone()]
                    .into_iter()
                    .flatten()
                    .collect();
                if provided.is_empty() {
                    numeric.iter().take(4).cloned().collect()
                } else {
                    numeric_subset(table, &provided)
                }
            };
            if selected.is_empty() {
                return Err(OpError::NoNumericColumns);
            }
            selected
        }
        _ => Vec::new(),
    };

    let data_summary = match kind {
        PlotKind::Histogram => {
            let name = x.as_deref().unwrap_or_default();
            histogram_summary(column(table, name)?, name)
        }
        PlotKind::Countplot => {
            let name = x.as_deref().unwrap_or_default();
            category_summary(column(table, name)?, name, None)
        }
        PlotKind::Bar => {
            let x_name = x.as_deref().unwrap_or_default();
            category_summary(column(table, x_name)?, x_name, y.as_deref())
        }
        PlotKind::Boxplot | PlotKind::Violin => {
            box_summary(table, x.as_deref(), y.as_deref().unwrap_or_default())
        }
        PlotKind::Scatter => scatter_summary(
            table,
            x.as_deref().unwrap_or_default(),
            y.as_deref().unwrap_or_default(),
        ),
        PlotKind::Line => line_summary(
            table,
            x.as_deref().unwrap_or_default(),
            y.as_deref().unwrap_or_default(),
        ),
        PlotKind::Heatmap => heatmap_summary(table, &involved),
        PlotKind::Pairplot => json!({
            "columns": involved.clone(),
            "count": table.row_count(),
        }),
    };

    let title = match params.title.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => default_title(kind, x.as_deref(), y.as_deref(), &explicit, &involved),
    };

    let request = RenderRequest {
        kind,
        x: x.clone(),
        y: y.clone(),
        hue: hue.clone(),
        columns: involved.clone(),
        title,
    };
    // One render attempt, no retry: a failed chart is reported, never
    // silently redrawn.
    let artifact = renderer
        .render(table, &request)
        .map_err(|e| OpError::RenderError {
            detail: e.to_string(),
        })?;

    let payload = json!({
        "plot_type": kind.name(),
        "plot_path": artifact.path.display().to_string(),
        "plot_url": artifact.url,
        "data_summary": data_summary,
    });
    Ok(OpReport::json(payload).with_corrections(corrections))
}

/// Resolve one optional axis reference. Empty strings count as absent, the
/// way an orchestrator tends to send them.
fn resolve_axis(
    requested: Option<&str>,
    names: &[String],
    corrections: &mut Vec<Correction>,
) -> Result<Option<String>, OpError> {
    let Some(requested) = requested.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    let resolved = resolve::resolve_column(requested, names, resolve::DEFAULT_THRESHOLD)
        .ok_or_else(|| OpError::column_not_found(requested, names))?;
    if resolved != requested {
        corrections.push(Correction {
            requested: requested.to_string(),
            resolved: resolved.clone(),
        });
    }
    Ok(Some(resolved))
}

/// Resolve an explicit columns list as a batch, deduplicating names that
/// fuzz onto the same column.
fn resolve_batch(
    requested: &[String],
    names: &[String],
    corrections: &mut Vec<Correction>,
) -> Result<Vec<String>, OpError> {
    if requested.is_empty() {
        return Ok(Vec::new());
    }
    let resolution = resolve::resolve_columns(requested, names, resolve::DEFAULT_THRESHOLD);
    if !resolution.not_found.is_empty() {
        return Err(OpError::columns_not_found(&resolution.not_found, names));
    }
    corrections.extend(resolution.corrections);
    let mut unique = Vec::new();
    for name in resolution.matched {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    Ok(unique)
}

fn require(value: &Option<String>, parameter: &str, kind: PlotKind) -> Result<String, OpError> {
    value.clone().ok_or_else(|| OpError::MissingParameter {
        parameter: parameter.to_string(),
        kind: kind.name().to_string(),
    })
}

fn require_numeric(table: &DataTable, name: &str) -> Result<(), OpError> {
    match table.column(name) {
        Some(col) if col.is_numeric() => Ok(()),
        Some(_) => Err(OpError::NotNumeric {
            column: name.to_string(),
        }),
        None => Err(OpError::column_not_found(name, &table.column_names())),
    }
}

/// Scatter and line also take a temporal axis; the renderer plots it on
/// the epoch-second timeline.
fn require_continuous(table: &DataTable, name: &str) -> Result<(), OpError> {
    match table.column(name) {
        Some(col) if col.is_numeric() || col.is_temporal() => Ok(()),
        Some(_) => Err(OpError::NotNumeric {
            column: name.to_string(),
        }),
        None => Err(OpError::column_not_found(name, &table.column_names())),
    }
}

fn column<'a>(table: &'a DataTable, name: &str) -> Result<&'a Column, OpError> {
    table
        .column(name)
        .ok_or_else(|| OpError::column_not_found(name, &table.column_names()))
}

/// Keep only names that are numeric columns, preserving order.
fn numeric_subset(table: &DataTable, names: &[String]) -> Vec<String> {
    names
        .iter()
        .filter(|n| table.column(n).map(|c| c.is_numeric()).unwrap_or(false))
        .cloned()
        .collect()
}

fn default_title(
    kind: PlotKind,
    x: Option<&str>,
    y: Option<&str>,
    explicit: &[String],
    involved: &[String],
) -> String {
    let x = x.unwrap_or_default();
    let y = y.unwrap_or_default();
    match kind {
        PlotKind::Histogram => format!("Distribution of {}", x),
        PlotKind::Bar => format!("{} by {}", y, x),
        PlotKind::Boxplot => {
            if x.is_empty() {
                format!("Box Plot of {}", y)
            } else {
                format!("Box Plot of {} by {}", y, x)
            }
        }
        PlotKind::Scatter => format!("{} vs {}", y, x),
        PlotKind::Line => format!("{} over {}", y, x),
        PlotKind::Countplot => format!("Count of {}", x),
        PlotKind::Violin => {
            if x.is_empty() {
                format!("Violin Plot of {}", y)
            } else {
                format!("Violin Plot of {} by {}", y, x)
            }
        }
        PlotKind::Heatmap => {
            if explicit.is_empty() {
                "Correlation Heatmap".to_string()
            } else {
                format!("Correlation Heatmap ({})", involved.join(", "))
            }
        }
        PlotKind::Pairplot => format!("Pair Plot ({})", involved.join(", ")),
    }
}

fn top_values(col: &Column) -> Vec<Value> {
    col.value_counts()
        .iter()
        .take(10)
        .map(|(value, count)| json!({"value": value, "count": count}))
        .collect()
}

fn histogram_summary(col: &Column, name: &str) -> Value {
    if !col.is_numeric() {
        return json!({
            "column": name,
            "count": col.non_missing_count(),
            "top_values": top_values(col),
        });
    }
    let values = col.numeric_values();
    let sorted = stats::sorted(&values);
    let five = stats::five_number(&sorted);
    json!({
        "column": name,
        "count": values.len(),
        "mean": stats::mean(&values).map(stats::round2),
        "median": five.map(|f| stats::round2(f.median)),
        "std": stats::sample_std(&values).map(stats::round2),
        "min": five.map(|f| stats::round2(f.min)),
        "max": five.map(|f| stats::round2(f.max)),
    })
}

fn category_summary(x_col: &Column, x: &str, y: Option<&str>) -> Value {
    let counts = x_col.value_counts();
    let mut object = Map::new();
    object.insert("x".to_string(), json!(x));
    if let Some(y) = y {
        object.insert("y".to_string(), json!(y));
    }
    object.insert("categories".to_string(), json!(counts.len()));
    object.insert("top_values".to_string(), json!(top_values(x_col)));
    Value::Object(object)
}

fn box_summary(table: &DataTable, x: Option<&str>, y: &str) -> Value {
    let values = table
        .column(y)
        .map(|c| c.numeric_values())
        .unwrap_or_default();
    let sorted = stats::sorted(&values);
    let five = stats::five_number(&sorted);
    let mut object = Map::new();
    object.insert("y".to_string(), json!(y));
    object.insert("count".to_string(), json!(values.len()));
    object.insert("min".to_string(), json!(five.map(|f| stats::round2(f.min))));
    object.insert("q1".to_string(), json!(five.map(|f| stats::round2(f.q1))));
    object.insert(
        "median".to_string(),
        json!(five.map(|f| stats::round2(f.median))),
    );
    object.insert("q3".to_string(), json!(five.map(|f| stats::round2(f.q3))));
    object.insert("max".to_string(), json!(five.map(|f| stats::round2(f.max))));
    if let Some(x) = x {
        let mut groups = Map::new();
        for (label, group_values) in table.grouped_numeric(Some(x), y) {
            groups.insert(label, json!(group_values.len()));
        }
        object.insert("x".to_string(), json!(x));
        object.insert("groups".to_string(), Value::Object(groups));
    }
    Value::Object(object)
}

fn pair_values(table: &DataTable, x: &str, y: &str) -> (Vec<f64>, Vec<f64>) {
    let x_cells = table.column(x).and_then(|c| c.continuous_cells());
    let y_cells = table.column(y).and_then(|c| c.continuous_cells());
    match (x_cells, y_cells) {
        (Some(a), Some(b)) => stats::pairwise_complete(&a, &b),
        _ => (Vec::new(), Vec::new()),
    }
}

fn scatter_summary(table: &DataTable, x: &str, y: &str) -> Value {
    let (xs, ys) = pair_values(table, x, y);
    json!({
        "x": x,
        "y": y,
        "count": xs.len(),
        "correlation": stats::pearson(&xs, &ys).map(stats::round4),
    })
}

fn line_summary(table: &DataTable, x: &str, y: &str) -> Value {
    let (_, ys) = pair_values(table, x, y);
    let sorted = stats::sorted(&ys);
    let five = stats::five_number(&sorted);
    json!({
        "x": x,
        "y": y,
        "count": ys.len(),
        "y_min": five.map(|f| stats::round2(f.min)),
        "y_mean": stats::mean(&ys).map(stats::round2),
        "y_max": five.map(|f| stats::round2(f.max)),
    })
}

/// Strongest absolute pairwise correlations among the plotted columns,
/// rounded the same way the correlation operation rounds.
fn heatmap_summary(table: &DataTable, names: &[String]) -> Value {
    let mut pairs: Vec<(String, String, f64)> = Vec::new();
    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            let (a, b) = pair_values(table, &names[i], &names[j]);
            if let Some(r) = stats::pearson(&a, &b) {
                pairs.push((names[i].clone(), names[j].clone(), stats::round4(r)));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.abs().partial_cmp(&a.2.abs()).unwrap());
    let top: Vec<Value> = pairs
        .iter()
        .take(5)
        .map(|(a, b, r)| json!({"columns": [a, b], "r": r}))
        .collect();
    json!({"columns": names, "top_correlations": top})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Dataset;
    use crate::envelope::OpPayload;
    use crate::ops::correlation;
    use crate::render::{NullRenderer, PlotArtifact};
    use std::path::PathBuf;

    struct FailingRenderer;

    impl Renderer for FailingRenderer {
        fn render(&self, _table: &DataTable, _request: &RenderRequest) -> anyhow::Result<PlotArtifact> {
            Err(anyhow::anyhow!("disk full"))
        }
    }

    struct CapturingRenderer;

    impl Renderer for CapturingRenderer {
        fn render(&self, _table: &DataTable, request: &RenderRequest) -> anyhow::Result<PlotArtifact> {
            Ok(PlotArtifact {
                path: PathBuf::from(format!("plots/{}.png", request.title)),
                url: format!("/plots/{}.png", request.title),
            })
        }
    }

    fn make_context() -> SessionContext {
        let table = DataTable::new(vec![
            Column::text(
                "name",
                vec![
                    Some("ada".to_string()),
                    Some("bob".to_string()),
                    Some("cleo".to_string()),
                ],
            ),
            Column::numeric("age", vec![Some(1.0), Some(2.0), Some(4.0)]),
            Column::numeric("fare", vec![Some(2.0), Some(4.0), Some(8.0)]),
            Column::numeric("score", vec![Some(4.0), Some(3.0), Some(1.0)]),
        ])
        .unwrap();
        let mut ctx = SessionContext::new();
        ctx.replace(Dataset {
            label: "test".to_string(),
            table,
        });
        ctx
    }

    fn payload(result: OpResult) -> Value {
        match result.unwrap().payload {
            OpPayload::Json(v) => v,
            _ => panic!("expected JSON payload"),
        }
    }

    fn day(d: u32) -> Option<chrono::NaiveDateTime> {
        chrono::NaiveDate::from_ymd_opt(2021, 3, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
    }

    fn timeline_context() -> SessionContext {
        let table = DataTable::new(vec![
            Column::temporal("day", vec![day(1), day(2), day(3)]),
            Column::numeric("fare", vec![Some(3.0), Some(5.0), Some(7.0)]),
        ])
        .unwrap();
        let mut ctx = SessionContext::new();
        ctx.replace(Dataset {
            label: "test".to_string(),
            table,
        });
        ctx
    }

    #[test]
    fn test_no_dataset() {
        let ctx = SessionContext::new();
        let err = run_raw(&ctx, &NullRenderer, "{}").unwrap_err();
        assert_eq!(err, OpError::NoDatasetLoaded);
    }

    #[test]
    fn test_empty_payload_is_histogram_of_first_numeric() {
        let ctx = make_context();
        let value = payload(run_raw(&ctx, &CapturingRenderer, ""));
        assert_eq!(value["plot_type"], "histogram");
        assert_eq!(value["plot_url"], "/plots/Distribution of age.png");
        assert_eq!(value["data_summary"]["column"], "age");
        assert_eq!(value["data_summary"]["count"], 3);
        assert_eq!(value["data_summary"]["mean"], 2.33);
    }

    #[test]
    fn test_unsupported_kind_lists_supported() {
        let ctx = make_context();
        let err = run_raw(&ctx, &NullRenderer, r#"{"plot_type": "pie"}"#).unwrap_err();
        match err {
            OpError::UnsupportedKind { given, supported } => {
                assert_eq!(given, "pie");
                assert_eq!(supported.len(), 9);
                assert!(supported.contains(&"histogram".to_string()));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_scatter_summary_matches_correlation_operation() {
        let ctx = make_context();
        let value = payload(run_raw(
            &ctx,
            &NullRenderer,
            r#"{"plot_type": "scatter", "x": "age", "y": "score"}"#,
        ));
        let summary = &value["data_summary"];
        assert_eq!(summary["count"], 3);

        let matrix = payload(correlation::run_raw(
            &ctx,
            r#"{"columns": ["age", "score"]}"#,
        ));
        assert_eq!(summary["correlation"], matrix["matrix"]["age"]["score"]);
    }

    #[test]
    fn test_scatter_requires_both_axes() {
        let ctx = make_context();
        let err = run_raw(
            &ctx,
            &NullRenderer,
            r#"{"plot_type": "scatter", "x": "age"}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            OpError::MissingParameter {
                parameter: "y".to_string(),
                kind: "scatter".to_string(),
            }
        );
    }

    #[test]
    fn test_scatter_rejects_text_axis() {
        let ctx = make_context();
        let err = run_raw(
            &ctx,
            &NullRenderer,
            r#"{"plot_type": "scatter", "x": "name", "y": "age"}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            OpError::NotNumeric {
                column: "name".to_string(),
            }
        );
    }

    #[test]
    fn test_scatter_accepts_temporal_axis() {
        // Dates land on the epoch-second timeline, so the daily fare rise
        // correlates perfectly with time.
        let value = payload(run_raw(
            &timeline_context(),
            &NullRenderer,
            r#"{"plot_type": "scatter", "x": "day", "y": "fare"}"#,
        ));
        let summary = &value["data_summary"];
        assert_eq!(summary["count"], 3);
        assert_eq!(summary["correlation"], 1.0);
    }

    #[test]
    fn test_line_accepts_temporal_axis() {
        let value = payload(run_raw(
            &timeline_context(),
            &CapturingRenderer,
            r#"{"plot_type": "line", "x": "day", "y": "fare"}"#,
        ));
        assert_eq!(value["plot_url"], "/plots/fare over day.png");
        assert_eq!(value["data_summary"]["count"], 3);
        assert_eq!(value["data_summary"]["y_min"], 3.0);
        assert_eq!(value["data_summary"]["y_max"], 7.0);
    }

    #[test]
    fn test_scatter_temporal_value_axis_is_rejected() {
        // Only the x axis stretches to temporal columns; y stays numeric.
        let err = run_raw(
            &timeline_context(),
            &NullRenderer,
            r#"{"plot_type": "scatter", "x": "fare", "y": "day"}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            OpError::NotNumeric {
                column: "day".to_string(),
            }
        );
    }

    #[test]
    fn test_boxplot_autofills_both_axes() {
        let ctx = make_context();
        let value = payload(run_raw(&ctx, &CapturingRenderer, r#"{"plot_type": "boxplot"}"#));
        // First numeric column becomes the grouping axis, the next distinct
        // numeric column the value axis.
        assert_eq!(value["plot_url"], "/plots/Box Plot of fare by age.png");
        assert_eq!(value["data_summary"]["y"], "fare");
        assert_eq!(value["data_summary"]["median"], 4.0);
    }

    #[test]
    fn test_boxplot_single_numeric_column_still_needs_y() {
        let table = DataTable::new(vec![Column::numeric(
            "fare",
            vec![Some(1.0), Some(2.0)],
        )])
        .unwrap();
        let mut ctx = SessionContext::new();
        ctx.replace(Dataset {
            label: "test".to_string(),
            table,
        });
        let err = run_raw(&ctx, &NullRenderer, r#"{"plot_type": "boxplot"}"#).unwrap_err();
        assert_eq!(
            err,
            OpError::MissingParameter {
                parameter: "y".to_string(),
                kind: "boxplot".to_string(),
            }
        );
    }

    #[test]
    fn test_violin_does_not_autofill() {
        let ctx = make_context();
        let err = run_raw(&ctx, &NullRenderer, r#"{"plot_type": "violin"}"#).unwrap_err();
        assert_eq!(
            err,
            OpError::MissingParameter {
                parameter: "y".to_string(),
                kind: "violin".to_string(),
            }
        );
    }

    #[test]
    fn test_fuzzy_axis_is_disclosed() {
        let ctx = make_context();
        let report = run_raw(
            &ctx,
            &NullRenderer,
            r#"{"plot_type": "histogram", "x": "Age"}"#,
        )
        .unwrap();
        assert_eq!(report.corrections.len(), 1);
        assert_eq!(report.corrections[0].requested, "Age");
        assert_eq!(report.corrections[0].resolved, "age");
        let message = report.into_message();
        assert!(message.contains("Interpreted 'Age' as column 'age'."));
    }

    #[test]
    fn test_unknown_axis_suggests() {
        let ctx = make_context();
        let err = run_raw(
            &ctx,
            &NullRenderer,
            r#"{"plot_type": "histogram", "x": "fr"}"#,
        )
        .unwrap_err();
        match err {
            OpError::ColumnNotFound { requested, suggestion, .. } => {
                assert_eq!(requested, "fr");
                assert_eq!(suggestion.as_deref(), Some("fare"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_heatmap_defaults_to_all_numeric() {
        let ctx = make_context();
        let value = payload(run_raw(&ctx, &NullRenderer, r#"{"plot_type": "heatmap"}"#));
        let summary = &value["data_summary"];
        assert_eq!(
            summary["columns"],
            json!(["age", "fare", "score"])
        );
        let top = summary["top_correlations"].as_array().unwrap();
        assert_eq!(top.len(), 3);
        // age and fare move in lockstep, so that pair tops the list.
        assert_eq!(top[0]["columns"], json!(["age", "fare"]));
        assert_eq!(top[0]["r"], 1.0);
    }

    #[test]
    fn test_heatmap_with_text_columns_only_fails() {
        let table = DataTable::new(vec![Column::text(
            "name",
            vec![Some("a".to_string()), Some("b".to_string())],
        )])
        .unwrap();
        let mut ctx = SessionContext::new();
        ctx.replace(Dataset {
            label: "test".to_string(),
            table,
        });
        let err = run_raw(&ctx, &NullRenderer, r#"{"plot_type": "heatmap"}"#).unwrap_err();
        assert_eq!(err, OpError::NoNumericColumns);
    }

    #[test]
    fn test_heatmap_single_numeric_column_is_a_unit_matrix() {
        let table = DataTable::new(vec![
            Column::text("name", vec![Some("a".to_string()), Some("b".to_string())]),
            Column::numeric("fare", vec![Some(1.0), Some(2.0)]),
        ])
        .unwrap();
        let mut ctx = SessionContext::new();
        ctx.replace(Dataset {
            label: "test".to_string(),
            table,
        });
        let value = payload(run_raw(&ctx, &NullRenderer, r#"{"plot_type": "heatmap"}"#));
        let summary = &value["data_summary"];
        assert_eq!(summary["columns"], json!(["fare"]));
        assert_eq!(summary["top_correlations"], json!([]));
    }

    #[test]
    fn test_pairplot_takes_first_four_numeric() {
        let ctx = make_context();
        let value = payload(run_raw(&ctx, &CapturingRenderer, r#"{"plot_type": "pairplot"}"#));
        assert_eq!(
            value["data_summary"]["columns"],
            json!(["age", "fare", "score"])
        );
        assert_eq!(value["data_summary"]["count"], 3);
        assert_eq!(value["plot_url"], "/plots/Pair Plot (age, fare, score).png");
    }

    #[test]
    fn test_pairplot_single_column_renders_one_panel() {
        let ctx = make_context();
        let value = payload(run_raw(
            &ctx,
            &CapturingRenderer,
            r#"{"plot_type": "pairplot", "columns": ["fare"]}"#,
        ));
        assert_eq!(value["data_summary"]["columns"], json!(["fare"]));
        assert_eq!(value["plot_url"], "/plots/Pair Plot (fare).png");
    }

    #[test]
    fn test_countplot_summary() {
        let ctx = make_context();
        let value = payload(run_raw(
            &ctx,
            &NullRenderer,
            r#"{"plot_type": "countplot", "x": "name"}"#,
        ));
        let summary = &value["data_summary"];
        assert_eq!(summary["x"], "name");
        assert_eq!(summary["categories"], 3);
        assert_eq!(summary["top_values"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_explicit_title_wins() {
        let ctx = make_context();
        let value = payload(run_raw(
            &ctx,
            &CapturingRenderer,
            r#"{"plot_type": "line", "x": "age", "y": "fare", "title": "Fares"}"#,
        ));
        assert_eq!(value["plot_url"], "/plots/Fares.png");
        assert_eq!(value["data_summary"]["y_mean"], 4.67);
    }

    #[test]
    fn test_render_failure_is_surfaced() {
        let ctx = make_context();
        let err = run_raw(
            &ctx,
            &FailingRenderer,
            r#"{"plot_type": "histogram", "x": "age"}"#,
        )
        .unwrap_err();
        match err {
            OpError::RenderError { detail } => assert!(detail.contains("disk full")),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(
            OpError::RenderError {
                detail: String::new()
            }
            .reason(),
            "render_error"
        );
    }

    #[test]
    fn test_bad_parameter_types_are_invalid_spec() {
        let ctx = make_context();
        let err = run_raw(&ctx, &NullRenderer, r#"{"plot_type": 7}"#).unwrap_err();
        assert!(matches!(err, OpError::InvalidSpec { .. }));
    }
}
