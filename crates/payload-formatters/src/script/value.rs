use serde_json::{Map, Number, Value as JsonValue};
use std::collections::BTreeMap;

/// Value exchanged with a script engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<ScriptValue>),
    Map(BTreeMap<String, ScriptValue>),
    Blob(Vec<u8>),
}

impl ScriptValue {
    /// Short name of the variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Unit => "unit",
            ScriptValue::Bool(_) => "bool",
            ScriptValue::Int(_) => "int",
            ScriptValue::Float(_) => "float",
            ScriptValue::String(_) => "string",
            ScriptValue::Array(_) => "array",
            ScriptValue::Map(_) => "map",
            ScriptValue::Blob(_) => "blob",
        }
    }

    /// Integer value of an int, or of a float without fractional part.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ScriptValue::Int(i) => Some(*i),
            ScriptValue::Float(f)
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
            {
                Some(*f as i64)
            }
            _ => None,
        }
    }

    /// JSON form of the value.
    ///
    /// Returns `None` for non-finite floats. Blobs become arrays of byte
    /// values and unit becomes null.
    pub fn to_json(&self) -> Option<JsonValue> {
        let json = match self {
            ScriptValue::Unit => JsonValue::Null,
            ScriptValue::Bool(b) => JsonValue::Bool(*b),
            ScriptValue::Int(i) => JsonValue::Number((*i).into()),
            ScriptValue::Float(f) => JsonValue::Number(Number::from_f64(*f)?),
            ScriptValue::String(s) => JsonValue::String(s.clone()),
            ScriptValue::Array(items) => {
                JsonValue::Array(items.iter().map(ScriptValue::to_json).collect::<Option<_>>()?)
            }
            ScriptValue::Map(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                    .collect::<Option<Map<_, _>>>()?,
            ),
            ScriptValue::Blob(bytes) => {
                JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect())
            }
        };
        Some(json)
    }
}

impl From<&JsonValue> for ScriptValue {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => ScriptValue::Unit,
            JsonValue::Bool(b) => ScriptValue::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => ScriptValue::Int(i),
                None => ScriptValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => ScriptValue::String(s.clone()),
            JsonValue::Array(items) => ScriptValue::Array(items.iter().map(Self::from).collect()),
            JsonValue::Object(map) => ScriptValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&Map<String, JsonValue>> for ScriptValue {
    fn from(map: &Map<String, JsonValue>) -> Self {
        ScriptValue::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), ScriptValue::from(v)))
                .collect(),
        )
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        ScriptValue::String(s.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        ScriptValue::String(s)
    }
}

impl From<i64> for ScriptValue {
    fn from(i: i64) -> Self {
        ScriptValue::Int(i)
    }
}

impl From<Vec<u8>> for ScriptValue {
    fn from(bytes: Vec<u8>) -> Self {
        ScriptValue::Blob(bytes)
    }
}
