//! Frame and window validation
//!
//! Pure checks on a single landmark vector and on a full window. Hand presence
//! is derived from the fixed `[left(63), right(63)]` layout.

use serde_json::Value;

use crate::error::ValidationError;
use crate::types::{LandmarkFrame, FRAME_SIZE, HAND_SIZE};

/// Check that a vector has exactly `FRAME_SIZE` finite values.
pub fn validate_frame(values: &[f64]) -> Result<(), ValidationError> {
    if values.len() != FRAME_SIZE {
        return Err(ValidationError::WrongLength {
            expected: FRAME_SIZE,
            actual: values.len(),
        });
    }

    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(ValidationError::NonFinite { index }),
        None => Ok(()),
    }
}

/// Validate an untyped payload (e.g. one NDJSON line) and extract its values.
///
/// Accepts either a bare array or an object with a `landmarks` array.
pub fn validate_frame_value(value: &Value) -> Result<Vec<f64>, ValidationError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("landmarks") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(ValidationError::NotASequence(format!(
                    "landmarks is {}",
                    json_kind(other)
                )))
            }
            None => {
                return Err(ValidationError::NotASequence(
                    "object has no landmarks field".to_string(),
                ))
            }
        },
        other => return Err(ValidationError::NotASequence(json_kind(other).to_string())),
    };

    if items.len() != FRAME_SIZE {
        return Err(ValidationError::WrongLength {
            expected: FRAME_SIZE,
            actual: items.len(),
        });
    }

    let mut values = Vec::with_capacity(FRAME_SIZE);
    for (index, item) in items.iter().enumerate() {
        match item.as_f64() {
            Some(v) if v.is_finite() => values.push(v),
            _ => return Err(ValidationError::NonFinite { index }),
        }
    }
    Ok(values)
}

/// Count hands present: a hand is present when its slice has any non-zero value.
pub fn count_hands(values: &[f64]) -> u8 {
    let split = HAND_SIZE.min(values.len());
    let (left, right) = values.split_at(split);
    let has_left = left.iter().any(|v| *v != 0.0);
    let has_right = right.iter().take(HAND_SIZE).any(|v| *v != 0.0);
    has_left as u8 + has_right as u8
}

/// Check window length, then each frame in order, stopping at the first bad one.
pub fn validate_window(
    frames: &[LandmarkFrame],
    required_length: usize,
) -> Result<(), ValidationError> {
    if frames.len() != required_length {
        return Err(ValidationError::WindowLength {
            expected: required_length,
            actual: frames.len(),
        });
    }

    for (index, frame) in frames.iter().enumerate() {
        validate_frame(frame.values()).map_err(|e| ValidationError::InvalidFrame {
            index,
            source: Box::new(e),
        })?;
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
