use crate::tree::*;
use serde_json::{Map, Number};

/// Convert a JSON document into a value tree.
pub fn from_serde(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::Sequence(items.into_iter().map(from_serde).collect())
        }
        serde_json::Value::Object(map) => Value::Mapping(
            map.into_iter()
                .map(|(key, value)| (key, from_serde(value)))
                .collect(),
        ),
    }
}

/// Convert a value tree to JSON, forcing any thunks on the way.
///
/// Integral numbers are written without a fractional part; non-finite
/// numbers become `null`, as JSON has no spelling for them.
pub fn to_serde(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number_to_serde(*n),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Sequence(items) => serde_json::Value::Array(items.iter().map(to_serde).collect()),
        Value::Mapping(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), to_serde(value)))
                .collect::<Map<_, _>>(),
        ),
        Value::Thunk(thunk) => to_serde(&thunk.call().force()),
    }
}

fn number_to_serde(n: f64) -> serde_json::Value {
    // Integers within 2^53 are exact in f64; keep them integral on output.
    if n.is_finite() && n.fract() == 0.0 && n.abs() < (1u64 << 53) as f64 {
        return serde_json::Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Parse JSON text into a value tree.
pub fn from_json(input: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str::<serde_json::Value>(input).map(from_serde)
}

/// Serialize to compact JSON.
pub fn to_json(value: &Value) -> String {
    to_serde(value).to_string()
}
