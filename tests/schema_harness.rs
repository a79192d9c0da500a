use fast_time_server::handlers::{input_schema, CONVERT_TIME};
use fast_time_server::schema::{validate_value, SchemaValidationError};
use serde_json::json;

#[test]
fn convert_time_schema_reports_missing_fields() {
    let schema = input_schema(CONVERT_TIME).unwrap();
    let err = validate_value(&schema, &json!({ "time": "2025-01-01T00:00:00Z" })).unwrap_err();

    match err {
        SchemaValidationError::ValidationFailed(problems) => {
            assert!(!problems.is_empty());
            let joined = problems.join(" ");
            assert!(joined.contains("source_timezone"), "got: {joined}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn convert_time_schema_rejects_extra_fields() {
    let schema = input_schema(CONVERT_TIME).unwrap();
    let instance = json!({
        "time": "2025-01-01T00:00:00Z",
        "source_timezone": "UTC",
        "target_timezone": "UTC",
        "format": "unix"
    });
    assert!(validate_value(&schema, &instance).is_err());
}

#[test]
fn malformed_schema_is_a_compile_error() {
    let err = validate_value(&json!({ "type": 12 }), &json!({})).unwrap_err();
    assert!(matches!(err, SchemaValidationError::SchemaCompile(_)));
}
