//! Strict YAML transcoding through `serde_yaml`.
//!
//! Mapping from YAML to Portal values:
//!   - YAML null          -> Value::Null
//!   - YAML bool          -> Value::Bool
//!   - YAML integer       -> Value::Integer (u64 beyond i64 becomes a float)
//!   - YAML float         -> Value::Float
//!   - YAML string        -> Value::String
//!   - YAML sequence      -> Value::Sequence
//!   - YAML mapping       -> Value::Mapping (scalar keys are stringified)
//!   - tagged values      -> the untagged inner value
//!
//! Encoding is the reverse mapping; key order is kept.

use anyhow::{bail, Context, Result};
use libportal::{Mapping, Value};

/// Decode YAML text with a conforming parser.
pub fn decode(input: &str) -> Result<Value> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(input).context("YAML parse error")?;
    yaml_to_value(&yaml)
}

/// Encode a value as conforming YAML.
pub fn encode(value: &Value) -> Result<String> {
    serde_yaml::to_string(&value_to_yaml(value)).context("YAML encode error")
}

fn yaml_to_value(yaml: &serde_yaml::Value) -> Result<Value> {
    Ok(match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(*b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                bail!("unsupported YAML number: {}", n);
            }
        }
        serde_yaml::Value::String(s) => Value::String(s.clone()),
        serde_yaml::Value::Sequence(seq) => {
            Value::Sequence(seq.iter().map(yaml_to_value).collect::<Result<_>>()?)
        }
        serde_yaml::Value::Mapping(map) => {
            let mut out = Mapping::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    serde_yaml::Value::Null => "null".to_string(),
                    _ => bail!("unsupported YAML mapping key: {:?}", k),
                };
                out.insert(key, yaml_to_value(v)?);
            }
            Value::Mapping(out)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_value(&tagged.value)?,
    })
}

fn value_to_yaml(value: &Value) -> serde_yaml::Value {
    match value {
        Value::Null => serde_yaml::Value::Null,
        Value::Bool(b) => serde_yaml::Value::Bool(*b),
        Value::Integer(n) => serde_yaml::Value::Number((*n).into()),
        Value::Float(f) => serde_yaml::Value::Number((*f).into()),
        Value::String(s) => serde_yaml::Value::String(s.clone()),
        Value::Sequence(seq) => serde_yaml::Value::Sequence(seq.iter().map(value_to_yaml).collect()),
        Value::Mapping(map) => {
            let mut out = serde_yaml::Mapping::new();
            for (k, v) in map {
                out.insert(serde_yaml::Value::String(k.clone()), value_to_yaml(v));
            }
            serde_yaml::Value::Mapping(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_stringifies_scalar_keys() {
        let value = decode("1: one\ntrue: yes\n").unwrap();
        assert_eq!(value.get("1"), Some(&Value::from("one")));
        assert_eq!(value.get("true"), Some(&Value::from("yes")));
    }

    #[test]
    fn test_encode_keeps_key_order() {
        let mut map = Mapping::new();
        map.insert("zeta".to_string(), Value::Integer(1));
        map.insert("alpha".to_string(), Value::Bool(true));
        let text = encode(&Value::Mapping(map)).unwrap();
        assert_eq!(text, "zeta: 1\nalpha: true\n");
    }

    #[test]
    fn test_decode_rejects_invalid_yaml() {
        assert!(decode("key: [unclosed").is_err());
    }
}
