use service_metrics::domain::{CounterSample, Metric, MetricSample};
use service_metrics::parser::{DecodeError, RecordError, decode};

#[test]
fn test_decodes_gauges_and_counters() {
    let raw = br#"
        [
            {"key": "loadavg", "value": 4.25, "unit": "load"},
            {"key": "connections", "value": -3, "unit": "count"},
            {"name": "requests", "delta": 12}
        ]
    "#;

    let batch = decode(raw).unwrap();

    assert_eq!(
        batch.metrics,
        vec![
            Metric::Gauge(MetricSample::new("loadavg", 4.25, "load")),
            Metric::Gauge(MetricSample::new("connections", -3.0, "count")),
            Metric::Counter(CounterSample::new("requests", 12)),
        ]
    );
    assert!(batch.skipped.is_empty());
}

#[test]
fn test_invalid_records_are_skipped_and_reported() {
    let raw = br#"[
        {"key": "good", "value": 1, "unit": "u"},
        {"key": "", "value": 1, "unit": "u"},
        {"key": "no-value", "unit": "u"},
        {"key": "string-value", "value": "1", "unit": "u"},
        {"key": "numeric-unit", "value": 1, "unit": 5},
        {"name": "fractional", "delta": 1.5},
        "not an object",
        {"key": "also-good", "value": 0, "unit": "u"}
    ]"#;

    let batch = decode(raw).unwrap();

    let names: Vec<&str> = batch.metrics.iter().map(Metric::name).collect();
    assert_eq!(names, vec!["good", "also-good"]);

    let indices: Vec<usize> = batch.skipped.iter().map(RecordError::index).collect();
    assert_eq!(indices, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(
        batch.skipped[1],
        RecordError::MissingField {
            index: 2,
            field: "value"
        }
    );
    assert_eq!(batch.skipped[5], RecordError::NotAnObject { index: 6 });
}

#[test]
fn test_truncated_json_fails_whole_batch() {
    let err = decode(br#"[{"key":"service-dummy","value":99,"#).unwrap_err();
    assert!(matches!(err, DecodeError::Json(_)));
}

#[test]
fn test_empty_output_fails_whole_batch() {
    assert!(decode(b"").is_err());
    assert!(decode(b"   \n").is_err());
}

#[test]
fn test_decoding_is_deterministic() {
    let raw = br#"[{"key":"a","value":1,"unit":"u"},{"key":1},{"name":"c","delta":3}]"#;

    let first = decode(raw).unwrap();
    let second = decode(raw).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_gauge_with_a_name_field_is_still_forwarded_as_gauge() {
    let batch =
        decode(br#"[{"key":"service-dummy","value":99,"unit":"metric","name":"label"}]"#).unwrap();

    assert_eq!(batch.len(), 1);
    assert_eq!(
        batch.metrics[0],
        Metric::Gauge(MetricSample::new("service-dummy", 99.0, "metric"))
    );
    assert!(batch.skipped.is_empty());
}
