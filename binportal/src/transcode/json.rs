//! JSON transcoding through `serde_json` (with `preserve_order`).
//!
//! Non-finite floats have no JSON form and encode as `null`.

use anyhow::{Context, Result};
use libportal::{Mapping, Value};

/// Decode a JSON document.
pub fn decode(input: &str) -> Result<Value> {
    let json: serde_json::Value = serde_json::from_str(input).context("JSON parse error")?;
    Ok(from_json(&json))
}

/// Encode a value as pretty-printed JSON with a trailing newline.
pub fn encode(value: &Value) -> Result<String> {
    let mut text = serde_json::to_string_pretty(&to_json(value)).context("JSON encode error")?;
    text.push('\n');
    Ok(text)
}

pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::Sequence(items.iter().map(from_json).collect()),
        serde_json::Value::Object(obj) => {
            let mut out = Mapping::new();
            for (k, v) in obj {
                out.insert(k.clone(), from_json(v));
            }
            Value::Mapping(out)
        }
    }
}

pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(n) => serde_json::Value::from(*n),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Sequence(seq) => serde_json::Value::Array(seq.iter().map(to_json).collect()),
        Value::Mapping(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), to_json(v))).collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_keeps_key_order() {
        let value = decode(r#"{"b": 1, "a": [true, null, 1.5]}"#).unwrap();
        let keys: Vec<&String> = value.as_mapping().unwrap().keys().collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(value.lookup("a.2"), Some(&Value::Float(1.5)));
    }

    #[test]
    fn test_encode_non_finite_float_as_null() {
        let text = encode(&Value::Sequence(vec![Value::Float(f64::INFINITY)])).unwrap();
        assert_eq!(text, "[\n  null\n]\n");
    }
}
