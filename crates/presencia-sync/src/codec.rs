//! Descriptor transport codec.
//!
//! JSON has no typed float vector, so descriptors cross the wire as plain
//! numeric arrays. Older payloads serialized typed arrays as objects with
//! numeric string keys ({"0": 0.1, "1": -0.2, ...}); hydration accepts
//! both shapes and always re-serializes as array-of-arrays.

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("descriptor element is not a finite number")]
    NotANumber,
    #[error("descriptor key {0:?} is not a numeric index")]
    BadIndex(String),
    #[error("unsupported descriptor shape: {0}")]
    UnsupportedShape(&'static str),
}

fn as_f32(value: &Value) -> Result<f32, CodecError> {
    value.as_f64().map(|v| v as f32).ok_or(CodecError::NotANumber)
}

/// Hydrate one descriptor from either wire shape into a typed vector.
pub fn hydrate_vector(value: &Value) -> Result<Vec<f32>, CodecError> {
    match value {
        Value::Array(items) => items.iter().map(as_f32).collect(),
        Value::Object(map) => {
            let mut indexed: Vec<(usize, f32)> = Vec::with_capacity(map.len());
            for (key, item) in map {
                let idx: usize = key
                    .parse()
                    .map_err(|_| CodecError::BadIndex(key.clone()))?;
                indexed.push((idx, as_f32(item)?));
            }
            indexed.sort_by_key(|(idx, _)| *idx);
            Ok(indexed.into_iter().map(|(_, v)| v).collect())
        }
        _ => Err(CodecError::UnsupportedShape("expected array or object")),
    }
}

/// Hydrate a whole descriptor set. `null`/missing means no samples.
pub fn hydrate_set(value: &Value) -> Result<Vec<Vec<f32>>, CodecError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items.iter().map(hydrate_vector).collect(),
        Value::Object(map) => {
            let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(map.len());
            for (key, item) in map {
                let idx: usize = key
                    .parse()
                    .map_err(|_| CodecError::BadIndex(key.clone()))?;
                indexed.push((idx, hydrate_vector(item)?));
            }
            indexed.sort_by_key(|(idx, _)| *idx);
            Ok(indexed.into_iter().map(|(_, v)| v).collect())
        }
        _ => Err(CodecError::UnsupportedShape("expected array, object or null")),
    }
}

/// Canonical wire form: array of plain numeric arrays.
pub fn serialize_set(set: &[Vec<f32>]) -> Value {
    serde_json::json!(set)
}

/// Bit-exact comparison of two descriptor sets.
///
/// Wire round-trips reproduce f32 values exactly (shortest-round-trip
/// printing), so bit equality is the stable "did remote change anything"
/// check.
pub fn sets_differ(a: &[Vec<f32>], b: &[Vec<f32>]) -> bool {
    if a.len() != b.len() {
        return true;
    }
    for (va, vb) in a.iter().zip(b.iter()) {
        if va.len() != vb.len() {
            return true;
        }
        if va.iter().zip(vb.iter()).any(|(x, y)| x.to_bits() != y.to_bits()) {
            return true;
        }
    }
    false
}
