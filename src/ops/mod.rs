pub mod correlation;
pub mod describe;
pub mod distribution;
pub mod nulls;
pub mod outliers;
pub mod profile;
pub mod schema;

use crate::context::SessionContext;
use crate::envelope::{OpError, OpResult};
use crate::plot;
use crate::render::Renderer;
use serde::de::DeserializeOwned;

/// Route an operation name plus its raw payload string to the operation.
/// This is the single entry point the CLI and any embedding orchestrator
/// go through; `schema` and `describe` read the payload as a selector
/// string, everything else as JSON parameters.
pub fn dispatch(
    ctx: &SessionContext,
    renderer: &dyn Renderer,
    op: &str,
    payload: &str,
) -> OpResult {
    match op {
        "schema" => schema::run(ctx, payload),
        "nulls" => nulls::run(ctx),
        "describe" => describe::run(ctx, payload),
        "profile" | "column_profile" => profile::run_raw(ctx, payload),
        "outliers" => outliers::run_raw(ctx, payload),
        "correlation" => correlation::run_raw(ctx, payload),
        "distribution" | "categorical_distribution" => distribution::run_raw(ctx, payload),
        "plot" => plot::run_raw(ctx, renderer, payload),
        other => Err(OpError::InvalidSpec {
            detail: format!("unknown operation '{}'", other),
        }),
    }
}

/// Deserialize a JSON parameter payload, folding every parse failure into
/// `InvalidSpec`.
pub(crate) fn parse_params<T: DeserializeOwned>(payload: &str) -> Result<T, OpError> {
    if payload.trim().is_empty() {
        return Err(OpError::InvalidSpec {
            detail: "expected a JSON object with parameters".to_string(),
        });
    }
    serde_json::from_str(payload).map_err(|e| OpError::InvalidSpec {
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::NullRenderer;
    use serde::Deserialize;

    #[test]
    fn test_unknown_operation() {
        let ctx = SessionContext::new();
        let err = dispatch(&ctx, &NullRenderer, "sparkline", "").unwrap_err();
        assert_eq!(err.reason(), "invalid_spec");
    }

    #[test]
    fn test_parse_params_reports_detail() {
        #[derive(Debug, Deserialize)]
        struct P {
            #[allow(dead_code)]
            column: String,
        }
        let err = parse_params::<P>("{\"colmn\": 1]").unwrap_err();
        assert_eq!(err.reason(), "invalid_spec");
        let err = parse_params::<P>("").unwrap_err();
        assert!(matches!(err, OpError::InvalidSpec { .. }));
    }
}
