use crate::context::SessionContext;
use crate::envelope::{OpError, OpReport, OpResult};
use crate::resolve::{self, Correction};
use crate::selector::{parse_selector, Selector};
use serde_json::Value;

/// Column name -> type tag, in dataset column order.
///
/// The selector narrows the mapping: an integer keeps the first N columns
/// (N = 0 gives an empty mapping), a name list keeps the resolved subset.
/// A name list where nothing resolves falls back to the full schema.
pub fn run(ctx: &SessionContext, selector: &str) -> OpResult {
    let dataset = ctx.snapshot().ok_or(OpError::NoDatasetLoaded)?;
    let table = &dataset.table;
    let names = table.column_names();

    let (included, corrections): (Vec<String>, Vec<Correction>) = match parse_selector(selector) {
        Selector::All => (names, Vec::new()),
        Selector::First(n) => (names.into_iter().take(n).collect(), Vec::new()),
        Selector::Names(requested) => {
            let resolution =
                resolve::resolve_columns(&requested, &names, resolve::DEFAULT_THRESHOLD);
            if resolution.matched.is_empty() {
                (names, Vec::new())
            } else {
                (resolution.matched, resolution.corrections)
            }
        }
    };

    let mut mapping = serde_json::Map::new();
    for col in table.columns() {
        if included.iter().any(|name| name == &col.name) {
            mapping.insert(
                col.name.clone(),
                Value::String(col.column_type().to_string()),
            );
        }
    }
    Ok(OpReport::json(Value::Object(mapping)).with_corrections(corrections))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Dataset;
    use crate::table::{Column, DataTable};

    fn make_context() -> SessionContext {
        let table = DataTable::new(vec![
            Column::text("name", vec![Some("a".to_string())]),
            Column::numeric("age", vec![Some(30.0)]),
            Column::numeric("fare", vec![Some(7.25)]),
            Column::boolean("survived", vec![Some(true)]),
        ])
        .unwrap();
        let mut ctx = SessionContext::new();
        ctx.replace(Dataset {
            label: "test".to_string(),
            table,
        });
        ctx
    }

    fn keys(value: &Value) -> Vec<String> {
        value.as_object().unwrap().keys().cloned().collect()
    }

    fn payload(result: OpResult) -> Value {
        match result.unwrap().payload {
            crate::envelope::OpPayload::Json(v) => v,
            _ => panic!("expected JSON payload"),
        }
    }

    #[test]
    fn test_full_schema_in_dataset_order() {
        let value = payload(run(&make_context(), ""));
        assert_eq!(keys(&value), vec!["name", "age", "fare", "survived"]);
        assert_eq!(value["age"], "numeric");
        assert_eq!(value["name"], "text");
        assert_eq!(value["survived"], "boolean");
    }

    #[test]
    fn test_first_n_selector() {
        let value = payload(run(&make_context(), "2"));
        assert_eq!(keys(&value), vec!["name", "age"]);
    }

    #[test]
    fn test_zero_selector_is_empty() {
        let value = payload(run(&make_context(), "0"));
        assert!(value.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_name_list_keeps_dataset_order() {
        // Request order is fare-before-age; output stays in dataset order.
        let value = payload(run(&make_context(), "fare, age"));
        assert_eq!(keys(&value), vec!["age", "fare"]);
    }

    #[test]
    fn test_variant_names_resolve_with_corrections() {
        let result = run(&make_context(), "Age").unwrap();
        assert_eq!(result.corrections.len(), 1);
        assert_eq!(result.corrections[0].resolved, "age");
    }

    #[test]
    fn test_unresolvable_list_falls_back_to_full_schema() {
        let value = payload(run(&make_context(), "qqqq, wwww"));
        assert_eq!(keys(&value).len(), 4);
    }

    #[test]
    fn test_no_dataset() {
        let ctx = SessionContext::new();
        assert_eq!(run(&ctx, "").unwrap_err(), OpError::NoDatasetLoaded);
    }
}
