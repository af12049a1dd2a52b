use std::fs;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

const SAMPLE_CSV: &str = "name,age,fare,city\n\
ada,22,7.25,lyon\n\
bob,38,71.28,paris\n\
cleo,26,7.92,lyon\n\
dan,35,53.1,nice\n\
eve,,8.05,paris\n";

/// Helper function to run tabstat against a CSV written into `dir`
fn run_tabstat(dir: &TempDir, csv_content: &str, args: &[&str]) -> Result<String, String> {
    let data_path = dir.path().join("data.csv");
    fs::write(&data_path, csv_content).map_err(|e| format!("Failed to write CSV: {}", e))?;
    let plots_dir = dir.path().join("plots");

    let output = Command::new("cargo")
        .args(["run", "--bin", "tabstat", "--", "--data"])
        .arg(&data_path)
        .arg("--plots-dir")
        .arg(&plots_dir)
        .args(args)
        .output()
        .map_err(|e| format!("Failed to spawn process: {}", e))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).to_string())
    }
}

fn json_output(stdout: &str) -> Value {
    serde_json::from_str(stdout.trim()).expect("stdout is not valid JSON")
}

/// Check if bytes are a valid PNG
fn is_valid_png(bytes: &[u8]) -> bool {
    bytes.len() > 8 && &bytes[0..8] == &[137, 80, 78, 71, 13, 10, 26, 10]
}

#[test]
fn test_end_to_end_schema() {
    let dir = TempDir::new().unwrap();
    let result = run_tabstat(&dir, SAMPLE_CSV, &["schema"]);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let value = json_output(&result.unwrap());
    assert_eq!(value["name"], "text");
    assert_eq!(value["age"], "numeric");
    assert_eq!(value["fare"], "numeric");
    assert_eq!(value["city"], "text");
    assert_eq!(value.as_object().unwrap().len(), 4);
}

#[test]
fn test_end_to_end_schema_first_n() {
    let dir = TempDir::new().unwrap();
    let result = run_tabstat(&dir, SAMPLE_CSV, &["schema", "2"]);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let value = json_output(&result.unwrap());
    let object = value.as_object().unwrap();
    assert_eq!(object.len(), 2);
    assert!(object.contains_key("name"));
    assert!(object.contains_key("age"));
}

#[test]
fn test_end_to_end_nulls() {
    let dir = TempDir::new().unwrap();
    let result = run_tabstat(&dir, SAMPLE_CSV, &["nulls"]);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let value = json_output(&result.unwrap());
    assert_eq!(value["age"], 1);
    assert_eq!(value.as_object().unwrap().len(), 1);
}

#[test]
fn test_end_to_end_describe() {
    let dir = TempDir::new().unwrap();
    let result = run_tabstat(&dir, SAMPLE_CSV, &["describe"]);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let stdout = result.unwrap();
    // CSV table, not JSON: one column per numeric column, one row per
    // statistic.
    assert!(stdout.contains(",age,fare"));
    assert!(stdout.contains("count,4,5"));
    assert!(stdout.contains("mean,30.25,"));
    assert!(stdout.contains("25%,"));
    assert!(stdout.contains("75%,"));
}

#[test]
fn test_end_to_end_profile_bare_column_name() {
    let dir = TempDir::new().unwrap();
    let result = run_tabstat(&dir, SAMPLE_CSV, &["profile", "fare"]);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let value = json_output(&result.unwrap());
    assert_eq!(value["column"], "fare");
    assert_eq!(value["dtype"], "numeric");
    assert_eq!(value["missing"]["count"], 0);
    assert_eq!(value["cardinality"], 5);
    assert_eq!(value["numeric_stats"]["min"], 7.25);
    assert_eq!(value["numeric_stats"]["max"], 71.28);
    let mean = value["numeric_stats"]["mean"].as_f64().unwrap();
    assert!((mean - 29.52).abs() < 1e-9);
}

#[test]
fn test_end_to_end_outliers_iqr_bounds() {
    let dir = TempDir::new().unwrap();
    let result = run_tabstat(&dir, SAMPLE_CSV, &["outliers", r#"{"column": "age"}"#]);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let value = json_output(&result.unwrap());
    assert_eq!(value["column"], "age");
    assert_eq!(value["method"], "iqr");
    // Exact fences for ages [22, 26, 35, 38]: quartiles 25 and 35.75.
    assert_eq!(value["lower_bound"], 8.875);
    assert_eq!(value["upper_bound"], 51.875);
    assert_eq!(value["count"], 0);
}

#[test]
fn test_end_to_end_correlation_defaults_to_pearson() {
    let dir = TempDir::new().unwrap();
    let result = run_tabstat(
        &dir,
        SAMPLE_CSV,
        &["correlation", r#"{"columns": ["age", "fare"]}"#],
    );
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let value = json_output(&result.unwrap());
    assert_eq!(value["method"], "pearson");
    assert_eq!(value["columns"], serde_json::json!(["age", "fare"]));
    assert_eq!(value["matrix"]["age"]["age"], 1.0);
    let r = value["matrix"]["age"]["fare"].as_f64().unwrap();
    assert!((-1.0..=1.0).contains(&r));
}

#[test]
fn test_end_to_end_correlation_without_columns_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = run_tabstat(&dir, SAMPLE_CSV, &["correlation"]);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let value = json_output(&result.unwrap());
    assert_eq!(value["reason"], "no_columns_provided");
}

#[test]
fn test_end_to_end_distribution() {
    let dir = TempDir::new().unwrap();
    let result = run_tabstat(&dir, SAMPLE_CSV, &["distribution", r#"{"column": "city"}"#]);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let value = json_output(&result.unwrap());
    assert_eq!(value["column"], "city");
    assert_eq!(value["cardinality"], 3);
    let distribution = value["distribution"].as_object().unwrap();
    assert_eq!(distribution.len(), 3);
    assert_eq!(distribution["lyon"]["count"], 2);
    assert_eq!(distribution["lyon"]["percentage"], 40.0);
    assert_eq!(distribution["nice"]["percentage"], 20.0);
    // Counts descending, value ascending breaking the tie.
    let keys: Vec<&String> = distribution.keys().collect();
    assert_eq!(keys, ["lyon", "paris", "nice"]);
}

#[test]
fn test_end_to_end_plot_histogram_with_fuzzy_column() {
    let dir = TempDir::new().unwrap();
    let result = run_tabstat(
        &dir,
        SAMPLE_CSV,
        &["plot", r#"{"plot_type": "histogram", "x": "Fare"}"#],
    );
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let value = json_output(&result.unwrap());
    assert_eq!(value["plot_type"], "histogram");
    assert_eq!(value["note"], "Interpreted 'Fare' as column 'fare'.");
    assert_eq!(value["data_summary"]["column"], "fare");
    assert_eq!(value["data_summary"]["mean"], 29.52);
    assert!(value["plot_url"]
        .as_str()
        .unwrap()
        .starts_with("/plots/plot_histogram_"));

    let png_bytes = fs::read(value["plot_path"].as_str().unwrap()).expect("plot file missing");
    assert!(is_valid_png(&png_bytes), "Output is not a valid PNG");
}

#[test]
fn test_end_to_end_plot_defaults_to_histogram() {
    let dir = TempDir::new().unwrap();
    let result = run_tabstat(&dir, SAMPLE_CSV, &["plot"]);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let value = json_output(&result.unwrap());
    assert_eq!(value["plot_type"], "histogram");
    // First numeric column fills in for the missing axis.
    assert_eq!(value["data_summary"]["column"], "age");
}

#[test]
fn test_end_to_end_plot_scatter_reports_correlation() {
    let dir = TempDir::new().unwrap();
    let result = run_tabstat(
        &dir,
        SAMPLE_CSV,
        &["plot", r#"{"plot_type": "scatter", "x": "age", "y": "fare"}"#],
    );
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let value = json_output(&result.unwrap());
    assert_eq!(value["data_summary"]["count"], 4);
    assert!(value["data_summary"]["correlation"].is_number());

    let png_bytes = fs::read(value["plot_path"].as_str().unwrap()).expect("plot file missing");
    assert!(is_valid_png(&png_bytes));
}

#[test]
fn test_end_to_end_unknown_column_is_an_error_envelope() {
    let dir = TempDir::new().unwrap();
    let result = run_tabstat(&dir, SAMPLE_CSV, &["profile", "bogus"]);
    // Operation failures still exit zero; the envelope carries the error.
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let value = json_output(&result.unwrap());
    assert_eq!(value["reason"], "column_not_found");
    assert_eq!(value["requested"], "bogus");
    assert_eq!(value["available"].as_array().unwrap().len(), 4);
}

#[test]
fn test_end_to_end_unsupported_plot_kind() {
    let dir = TempDir::new().unwrap();
    let result = run_tabstat(&dir, SAMPLE_CSV, &["plot", r#"{"plot_type": "pie"}"#]);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let value = json_output(&result.unwrap());
    assert_eq!(value["reason"], "unsupported_kind");
    assert_eq!(value["supported"].as_array().unwrap().len(), 9);
}

#[test]
fn test_end_to_end_missing_data_file() {
    let output = Command::new("cargo")
        .args(["run", "--bin", "tabstat", "--"])
        .args(["--data", "/no/such/file.csv", "schema"])
        .output()
        .expect("Failed to spawn process");
    assert!(!output.status.success(), "Should have failed to load");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load dataset"));
}
