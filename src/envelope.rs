use crate::resolve::{self, Correction};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

/// What every operation returns across the boundary.
pub type OpResult = Result<OpReport, OpError>;

/// Successful payloads are JSON objects, except describe's statistics
/// table which stays CSV text.
#[derive(Debug, Clone)]
pub enum OpPayload {
    Json(Value),
    CsvTable(String),
}

/// A successful operation outcome: the payload plus any name corrections
/// the resolver applied on the way.
#[derive(Debug, Clone)]
pub struct OpReport {
    pub payload: OpPayload,
    pub corrections: Vec<Correction>,
}

impl OpReport {
    pub fn json(value: Value) -> Self {
        OpReport {
            payload: OpPayload::Json(value),
            corrections: Vec::new(),
        }
    }

    pub fn csv(table: String) -> Self {
        OpReport {
            payload: OpPayload::CsvTable(table),
            corrections: Vec::new(),
        }
    }

    pub fn with_corrections(mut self, corrections: Vec<Correction>) -> Self {
        self.corrections = corrections;
        self
    }

    /// Serialize for the orchestrator boundary. JSON payloads become one
    /// object; applied corrections ride along as a `corrections` list and
    /// a human-readable `note`. The CSV table gets the note as a leading
    /// line instead.
    pub fn into_message(self) -> String {
        let note = correction_note(&self.corrections);
        match self.payload {
            OpPayload::Json(value) => {
                let mut object = match value {
                    Value::Object(map) => map,
                    other => {
                        let mut map = serde_json::Map::new();
                        map.insert("result".to_string(), other);
                        map
                    }
                };
                if !self.corrections.is_empty() {
                    object.insert(
                        "corrections".to_string(),
                        serde_json::to_value(&self.corrections).unwrap_or(Value::Null),
                    );
                    if let Some(note) = note {
                        object.insert("note".to_string(), Value::String(note));
                    }
                }
                Value::Object(object).to_string()
            }
            OpPayload::CsvTable(table) => match note {
                Some(note) => format!("{}\n{}", note, table),
                None => table,
            },
        }
    }
}

fn correction_note(corrections: &[Correction]) -> Option<String> {
    if corrections.is_empty() {
        return None;
    }
    let parts: Vec<String> = corrections
        .iter()
        .map(|c| format!("interpreted '{}' as column '{}'", c.requested, c.resolved))
        .collect();
    let mut note = parts.join("; ");
    if let Some(first) = note.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    note.push('.');
    Some(note)
}

/// A requested name nothing matched, with the closest miss if one exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingColumn {
    pub requested: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Structured operation failures. Each variant carries what the caller
/// needs to repair the request; none of them panics through the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum OpError {
    NoDatasetLoaded,
    ColumnNotFound {
        requested: String,
        suggestion: Option<String>,
        available: Vec<String>,
    },
    ColumnsNotFound {
        missing: Vec<MissingColumn>,
        available: Vec<String>,
    },
    NotNumeric {
        column: String,
    },
    InvalidMethod {
        given: String,
        expected: Vec<String>,
    },
    NoColumnsProvided,
    NoNumericColumns,
    InvalidSpec {
        detail: String,
    },
    MissingParameter {
        parameter: String,
        kind: String,
    },
    UnsupportedKind {
        given: String,
        supported: Vec<String>,
    },
    RenderError {
        detail: String,
    },
}

impl OpError {
    /// Look up the closest column to decorate a single-name failure.
    pub fn column_not_found(requested: &str, available: &[String]) -> Self {
        OpError::ColumnNotFound {
            requested: requested.to_string(),
            suggestion: resolve::suggestion_for(requested, available),
            available: available.to_vec(),
        }
    }

    /// Same as `column_not_found`, for a batch of unresolved names.
    pub fn columns_not_found(not_found: &[String], available: &[String]) -> Self {
        OpError::ColumnsNotFound {
            missing: not_found
                .iter()
                .map(|name| MissingColumn {
                    requested: name.clone(),
                    suggestion: resolve::suggestion_for(name, available),
                })
                .collect(),
            available: available.to_vec(),
        }
    }

    /// Stable machine-readable code, one per variant.
    pub fn reason(&self) -> &'static str {
        match self {
            OpError::NoDatasetLoaded => "no_dataset_loaded",
            OpError::ColumnNotFound { .. } => "column_not_found",
            OpError::ColumnsNotFound { .. } => "columns_not_found",
            OpError::NotNumeric { .. } => "not_numeric",
            OpError::InvalidMethod { .. } => "invalid_method",
            OpError::NoColumnsProvided => "no_columns_provided",
            OpError::NoNumericColumns => "no_numeric_columns",
            OpError::InvalidSpec { .. } => "invalid_spec",
            OpError::MissingParameter { .. } => "missing_parameter",
            OpError::UnsupportedKind { .. } => "unsupported_kind",
            OpError::RenderError { .. } => "render_error",
        }
    }

    /// The failure as one JSON object: message, reason code, and the
    /// variant's structured fields.
    pub fn to_value(&self) -> Value {
        let mut object = serde_json::Map::new();
        object.insert("error".to_string(), Value::String(self.to_string()));
        object.insert("reason".to_string(), Value::String(self.reason().to_string()));
        match self {
            OpError::NoDatasetLoaded
            | OpError::NoColumnsProvided
            | OpError::NoNumericColumns => {}
            OpError::ColumnNotFound {
                requested,
                suggestion,
                available,
            } => {
                object.insert("requested".to_string(), json!(requested));
                if let Some(s) = suggestion {
                    object.insert("suggestion".to_string(), json!(s));
                }
                object.insert("available".to_string(), json!(available));
            }
            OpError::ColumnsNotFound { missing, available } => {
                object.insert(
                    "missing".to_string(),
                    serde_json::to_value(missing).unwrap_or(Value::Null),
                );
                object.insert("available".to_string(), json!(available));
            }
            OpError::NotNumeric { column } => {
                object.insert("column".to_string(), json!(column));
            }
            OpError::InvalidMethod { given, expected } => {
                object.insert("given".to_string(), json!(given));
                object.insert("expected".to_string(), json!(expected));
            }
            OpError::InvalidSpec { detail } | OpError::RenderError { detail } => {
                object.insert("detail".to_string(), json!(detail));
            }
            OpError::MissingParameter { parameter, kind } => {
                object.insert("parameter".to_string(), json!(parameter));
                object.insert("kind".to_string(), json!(kind));
            }
            OpError::UnsupportedKind { given, supported } => {
                object.insert("given".to_string(), json!(given));
                object.insert("supported".to_string(), json!(supported));
            }
        }
        Value::Object(object)
    }

    pub fn into_message(self) -> String {
        self.to_value().to_string()
    }
}

impl fmt::Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpError::NoDatasetLoaded => {
                write!(f, "No dataset loaded. Load a dataset before running operations.")
            }
            OpError::ColumnNotFound {
                requested,
                suggestion,
                ..
            } => {
                write!(f, "Column '{}' not found.", requested)?;
                if let Some(s) = suggestion {
                    write!(f, " Did you mean '{}'?", s)?;
                }
                Ok(())
            }
            OpError::ColumnsNotFound { missing, .. } => {
                let names: Vec<&str> = missing.iter().map(|m| m.requested.as_str()).collect();
                write!(f, "Columns not found: {}.", names.join(", "))
            }
            OpError::NotNumeric { column } => {
                write!(f, "Column '{}' is not numeric.", column)
            }
            OpError::InvalidMethod { given, expected } => {
                write!(
                    f,
                    "Invalid method '{}'. Expected one of: {}.",
                    given,
                    expected.join(", ")
                )
            }
            OpError::NoColumnsProvided => {
                write!(f, "No columns provided. Pass a list of column names.")
            }
            OpError::NoNumericColumns => write!(f, "No numeric columns available."),
            OpError::InvalidSpec { detail } => write!(f, "Invalid parameters: {}", detail),
            OpError::MissingParameter { parameter, kind } => {
                write!(f, "Missing required parameter '{}' for {} plots.", parameter, kind)
            }
            OpError::UnsupportedKind { given, supported } => {
                write!(
                    f,
                    "Unsupported plot type '{}'. Supported types: {}.",
                    given,
                    supported.join(", ")
                )
            }
            OpError::RenderError { detail } => write!(f, "Rendering failed: {}", detail),
        }
    }
}

impl std::error::Error for OpError {}
