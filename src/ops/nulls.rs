use crate::context::SessionContext;
use crate::envelope::{OpError, OpReport, OpResult};
use serde_json::Value;

/// Missing-cell count per column, dataset order, columns with zero
/// missing cells omitted. A fully clean dataset yields an empty mapping.
pub fn run(ctx: &SessionContext) -> OpResult {
    let dataset = ctx.snapshot().ok_or(OpError::NoDatasetLoaded)?;

    let mut mapping = serde_json::Map::new();
    for col in dataset.table.columns() {
        let missing = col.missing_count();
        if missing > 0 {
            mapping.insert(col.name.clone(), Value::from(missing));
        }
    }
    Ok(OpReport::json(Value::Object(mapping)))
}
