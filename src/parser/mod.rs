//! Decoding of collector stdout into typed metric records.
//!
//! The payload is a JSON array. Each element must be either a gauge
//! (`{"key": string, "value": number, "unit": string}`) or a counter
//! (`{"name": string, "delta": non-negative integer}`). Elements that are
//! neither are reported individually and skipped; the rest of the batch is
//! still returned.

use crate::domain::{CounterSample, Metric, MetricSample};
use serde_json::{Map, Value};
use thiserror::Error;

/// The payload as a whole could not be read as a batch.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON array of metric objects, got {0}")]
    NotAnArray(&'static str),
}

/// Why a single record was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("record {index} is not an object")]
    NotAnObject { index: usize },
    #[error("record {index}: missing field '{field}'")]
    MissingField { index: usize, field: &'static str },
    #[error("record {index}: field '{field}' has the wrong type, expected {expected}")]
    InvalidFieldType {
        index: usize,
        field: &'static str,
        expected: &'static str,
    },
    #[error("record {index}: field '{field}' {reason}")]
    InvalidValue {
        index: usize,
        field: &'static str,
        reason: &'static str,
    },
}

impl RecordError {
    pub fn index(&self) -> usize {
        match self {
            RecordError::NotAnObject { index }
            | RecordError::MissingField { index, .. }
            | RecordError::InvalidFieldType { index, .. }
            | RecordError::InvalidValue { index, .. } => *index,
        }
    }
}

/// Result of decoding one collector run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedBatch {
    pub metrics: Vec<Metric>,
    pub skipped: Vec<RecordError>,
}

impl DecodedBatch {
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Decodes a collector payload.
///
/// Pure and deterministic: the same bytes always produce the same batch.
pub fn decode(raw: &[u8]) -> Result<DecodedBatch, DecodeError> {
    let value: Value = serde_json::from_slice(raw)?;
    let Value::Array(records) = value else {
        return Err(DecodeError::NotAnArray(json_type(&value)));
    };

    let mut batch = DecodedBatch {
        metrics: Vec::with_capacity(records.len()),
        skipped: Vec::new(),
    };

    for (index, record) in records.iter().enumerate() {
        match decode_record(index, record) {
            Ok(metric) => batch.metrics.push(metric),
            Err(e) => batch.skipped.push(e),
        }
    }

    Ok(batch)
}

fn decode_record(index: usize, record: &Value) -> Result<Metric, RecordError> {
    let obj = record
        .as_object()
        .ok_or(RecordError::NotAnObject { index })?;

    // Gauge shape wins; the counter shape is only tried when that fails.
    let gauge_err = match decode_gauge(index, obj) {
        Ok(sample) => return Ok(Metric::Gauge(sample)),
        Err(e) => e,
    };

    if !obj.contains_key("name") && !obj.contains_key("delta") {
        return Err(gauge_err);
    }

    match decode_counter(index, obj) {
        Ok(sample) => Ok(Metric::Counter(sample)),
        // Report against the shape the record was most likely meant to have
        Err(_) if obj.contains_key("key") => Err(gauge_err),
        Err(counter_err) => Err(counter_err),
    }
}

fn decode_gauge(index: usize, obj: &Map<String, Value>) -> Result<MetricSample, RecordError> {
    let key = string_field(index, obj, "key")?;
    if key.is_empty() {
        return Err(RecordError::InvalidValue {
            index,
            field: "key",
            reason: "must not be empty",
        });
    }

    let value = obj
        .get("value")
        .ok_or(RecordError::MissingField {
            index,
            field: "value",
        })?
        .as_f64()
        .ok_or(RecordError::InvalidFieldType {
            index,
            field: "value",
            expected: "number",
        })?;
    if !value.is_finite() {
        return Err(RecordError::InvalidValue {
            index,
            field: "value",
            reason: "must be finite",
        });
    }

    let unit = string_field(index, obj, "unit")?;

    Ok(MetricSample::new(key, value, unit))
}

fn decode_counter(index: usize, obj: &Map<String, Value>) -> Result<CounterSample, RecordError> {
    let name = string_field(index, obj, "name")?;
    if name.is_empty() {
        return Err(RecordError::InvalidValue {
            index,
            field: "name",
            reason: "must not be empty",
        });
    }

    let delta = obj.get("delta").ok_or(RecordError::MissingField {
        index,
        field: "delta",
    })?;
    let delta = match delta {
        Value::Number(n) => {
            if let Some(delta) = n.as_u64() {
                delta
            } else {
                let as_float = n.as_f64().unwrap_or(f64::NAN);
                if as_float < 0.0 {
                    return Err(RecordError::InvalidValue {
                        index,
                        field: "delta",
                        reason: "must not be negative",
                    });
                }
                // Whole-valued floats such as 14.0 are accepted
                if as_float.fract() == 0.0 && as_float < u64::MAX as f64 {
                    as_float as u64
                } else {
                    return Err(RecordError::InvalidValue {
                        index,
                        field: "delta",
                        reason: "must be a whole number",
                    });
                }
            }
        }
        _ => {
            return Err(RecordError::InvalidFieldType {
                index,
                field: "delta",
                expected: "number",
            });
        }
    };

    Ok(CounterSample::new(name, delta))
}

fn string_field<'a>(
    index: usize,
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, RecordError> {
    obj.get(field)
        .ok_or(RecordError::MissingField { index, field })?
        .as_str()
        .ok_or(RecordError::InvalidFieldType {
            index,
            field,
            expected: "string",
        })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
