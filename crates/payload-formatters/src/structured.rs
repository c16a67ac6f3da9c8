//! Conversion between protobuf `Struct` documents and JSON maps.
//!
//! Decoded payloads travel as `prost_types::Struct`; codecs and scripts work
//! on `serde_json::Map`, which is the generic document form.

use prost_types::{ListValue, Struct, Value, value::Kind};
use serde_json::{Map, Number, Value as JsonValue};
use thiserror::Error;

/// Maximum nesting of maps and lists in a document.
pub const MAX_DEPTH: usize = 100;

#[derive(Debug, Error, PartialEq)]
pub enum StructError {
    #[error("value at '{path}' has no kind")]
    MissingKind { path: String },

    #[error("number at '{path}' is not finite")]
    NonFiniteNumber { path: String },

    #[error("value at '{path}' is nested deeper than {limit} levels")]
    TooDeep { path: String, limit: usize },
}

/// Convert a protobuf `Struct` into a JSON map.
///
/// Integral numbers that fit an `i64` become JSON integers.
pub fn to_map(s: &Struct) -> Result<Map<String, JsonValue>, StructError> {
    struct_to_map(s, "", 0)
}

/// Convert a JSON map into a protobuf `Struct`.
pub fn from_map(map: &Map<String, JsonValue>) -> Result<Struct, StructError> {
    map_to_struct(map, "", 0)
}

fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}

fn struct_to_map(
    s: &Struct,
    path: &str,
    depth: usize,
) -> Result<Map<String, JsonValue>, StructError> {
    if depth > MAX_DEPTH {
        return Err(StructError::TooDeep {
            path: path.to_string(),
            limit: MAX_DEPTH,
        });
    }
    let mut map = Map::new();
    for (key, value) in &s.fields {
        let field_path = join_path(path, key);
        let json = prost_value_to_json(value, &field_path, depth + 1)?;
        map.insert(key.clone(), json);
    }
    Ok(map)
}

fn prost_value_to_json(value: &Value, path: &str, depth: usize) -> Result<JsonValue, StructError> {
    let kind = value.kind.as_ref().ok_or_else(|| StructError::MissingKind {
        path: path.to_string(),
    })?;
    let json = match kind {
        Kind::NullValue(_) => JsonValue::Null,
        Kind::BoolValue(b) => JsonValue::Bool(*b),
        Kind::StringValue(s) => JsonValue::String(s.clone()),
        Kind::NumberValue(n) => JsonValue::Number(number_from_f64(*n, path)?),
        Kind::StructValue(s) => JsonValue::Object(struct_to_map(s, path, depth)?),
        Kind::ListValue(list) => {
            if depth > MAX_DEPTH {
                return Err(StructError::TooDeep {
                    path: path.to_string(),
                    limit: MAX_DEPTH,
                });
            }
            let values = list
                .values
                .iter()
                .enumerate()
                .map(|(i, v)| prost_value_to_json(v, &join_path(path, &i.to_string()), depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            JsonValue::Array(values)
        }
    };
    Ok(json)
}

fn number_from_f64(n: f64, path: &str) -> Result<Number, StructError> {
    // i64::MAX is not exactly representable; the bound is exclusive.
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        return Ok(Number::from(n as i64));
    }
    Number::from_f64(n).ok_or_else(|| StructError::NonFiniteNumber {
        path: path.to_string(),
    })
}

fn map_to_struct(
    map: &Map<String, JsonValue>,
    path: &str,
    depth: usize,
) -> Result<Struct, StructError> {
    if depth > MAX_DEPTH {
        return Err(StructError::TooDeep {
            path: path.to_string(),
            limit: MAX_DEPTH,
        });
    }
    let fields = map
        .iter()
        .map(|(k, v)| {
            let value = json_to_prost_value(v, &join_path(path, k), depth + 1)?;
            Ok((k.clone(), value))
        })
        .collect::<Result<_, StructError>>()?;
    Ok(Struct { fields })
}

fn json_to_prost_value(value: &JsonValue, path: &str, depth: usize) -> Result<Value, StructError> {
    let kind = match value {
        JsonValue::Null => Kind::NullValue(0),
        JsonValue::Bool(b) => Kind::BoolValue(*b),
        JsonValue::Number(n) => {
            let f = n.as_f64().ok_or_else(|| StructError::NonFiniteNumber {
                path: path.to_string(),
            })?;
            Kind::NumberValue(f)
        }
        JsonValue::String(s) => Kind::StringValue(s.clone()),
        JsonValue::Array(arr) => {
            if depth > MAX_DEPTH {
                return Err(StructError::TooDeep {
                    path: path.to_string(),
                    limit: MAX_DEPTH,
                });
            }
            let values = arr
                .iter()
                .enumerate()
                .map(|(i, v)| json_to_prost_value(v, &join_path(path, &i.to_string()), depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            Kind::ListValue(ListValue { values })
        }
        JsonValue::Object(map) => Kind::StructValue(map_to_struct(map, path, depth)?),
    };
    Ok(Value { kind: Some(kind) })
}
