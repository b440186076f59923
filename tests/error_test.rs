//! Tests for error types

use trueno_ab::experiment::{Aggregation, MetricSet, MetricWindow};
use trueno_ab::Error;

#[test]
fn test_not_found_error() {
    let error = Error::NotFound("exp-9".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("No exposure data found"));
    assert!(error_str.contains("exp-9"));
}

#[test]
fn test_missing_columns_error() {
    let error = Error::MissingColumns {
        table: "events".to_string(),
        columns: vec!["event_name".to_string(), "event_time".to_string()],
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("events table"));
    assert!(error_str.contains("event_name, event_time"));
}

#[test]
fn test_unsupported_aggregation_error() {
    let error = "median".parse::<Aggregation>().unwrap_err();
    let error_str = format!("{error}");
    assert!(error_str.contains("Unsupported aggregation type: median"));
    assert!(error_str.contains("binary, sum, count"));
}

#[test]
fn test_invalid_duration_error() {
    let error = MetricWindow::parse("soon", "7 days").unwrap_err();
    assert!(matches!(error, Error::InvalidDuration(_)));
    assert!(format!("{error}").contains("Invalid duration"));
}

#[test]
fn test_invalid_window_error() {
    let json = r#"{"m": {"metric_id": "m", "event": {"name": "e"},
                   "window": {"start": "7 days", "end": "1 day"}, "aggregation": "sum"}}"#;
    let error = MetricSet::from_json(json).unwrap_err();
    let error_str = format!("{error}");
    assert!(error_str.contains("m"));
    assert!(error_str.contains("before start"));
}

#[test]
fn test_domain_error() {
    let error = trueno_ab::sample_size::calculate_sample_size(1.5, 0.1, 0.05, 0.8).unwrap_err();
    assert!(matches!(error, Error::Domain(_)));
    assert!(format!("{error}").contains("baseline_rate"));
}

#[test]
fn test_storage_error() {
    let error = Error::StorageError("schema drift".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Storage error"));
    assert!(error_str.contains("schema drift"));
}

#[test]
fn test_invalid_input_error() {
    let error = Error::InvalidInput("duplicate metric_id".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Invalid input"));
    assert!(error_str.contains("duplicate metric_id"));
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let error: Error = json_error.into();
    assert!(format!("{error}").contains("JSON error"));
}

#[test]
fn test_arrow_error_conversion() {
    let arrow_error = arrow::error::ArrowError::SchemaError("bad schema".to_string());
    let error: Error = arrow_error.into();
    assert!(format!("{error}").contains("Arrow error"));
}

#[test]
fn test_other_error() {
    let error = Error::Other("custom error message".to_string());
    let error_str = format!("{error}");
    assert_eq!(error_str, "custom error message");
}

#[test]
fn test_error_debug() {
    let error = Error::Statistics("bad degrees of freedom".to_string());
    let debug_str = format!("{error:?}");
    assert!(debug_str.contains("Statistics"));
}
