//! TOML transcoding through `toml_edit`.
//!
//! Lossy edges:
//!   - TOML has no null; null values are an encode error.
//!   - TOML datetimes decode to strings.
//!   - The top-level value must be a mapping.
//!   - Mappings inside sequences become inline tables.

use anyhow::{bail, Context, Result};
use libportal::{Mapping, Value};
use toml_edit::{DocumentMut, Formatted};

/// Decode a TOML document.
pub fn decode(input: &str) -> Result<Value> {
    let doc: DocumentMut = input.parse().context("TOML parse error")?;
    Ok(table_to_value(doc.as_table()))
}

/// Encode a mapping as a TOML document.
pub fn encode(value: &Value) -> Result<String> {
    let Value::Mapping(map) = value else {
        bail!("TOML requires the top-level value to be a mapping, found {}", value.type_name());
    };
    let mut doc = DocumentMut::new();
    for (key, value) in map {
        doc.insert(key, value_to_item(value, key)?);
    }
    Ok(doc.to_string())
}

fn table_to_value(table: &toml_edit::Table) -> Value {
    let mut out = Mapping::new();
    for (key, item) in table.iter() {
        out.insert(key.to_string(), item_to_value(item));
    }
    Value::Mapping(out)
}

fn item_to_value(item: &toml_edit::Item) -> Value {
    match item {
        toml_edit::Item::Value(v) => toml_value_to_value(v),
        toml_edit::Item::Table(t) => table_to_value(t),
        toml_edit::Item::ArrayOfTables(tables) => {
            Value::Sequence(tables.iter().map(table_to_value).collect())
        }
        toml_edit::Item::None => Value::Null,
    }
}

fn toml_value_to_value(v: &toml_edit::Value) -> Value {
    match v {
        toml_edit::Value::String(s) => Value::String(s.value().clone()),
        toml_edit::Value::Integer(i) => Value::Integer(*i.value()),
        toml_edit::Value::Float(f) => Value::Float(*f.value()),
        toml_edit::Value::Boolean(b) => Value::Bool(*b.value()),
        toml_edit::Value::Datetime(dt) => Value::String(dt.value().to_string()),
        toml_edit::Value::Array(arr) => Value::Sequence(arr.iter().map(toml_value_to_value).collect()),
        toml_edit::Value::InlineTable(table) => {
            let mut out = Mapping::new();
            for (key, val) in table.iter() {
                out.insert(key.to_string(), toml_value_to_value(val));
            }
            Value::Mapping(out)
        }
    }
}

/// Top-level and nested mappings become tables; everything else a value.
fn value_to_item(value: &Value, key: &str) -> Result<toml_edit::Item> {
    match value {
        Value::Mapping(map) => {
            let mut table = toml_edit::Table::new();
            for (k, v) in map {
                table.insert(k, value_to_item(v, k)?);
            }
            Ok(toml_edit::Item::Table(table))
        }
        other => Ok(toml_edit::Item::Value(value_to_toml(other, key)?)),
    }
}

fn value_to_toml(value: &Value, key: &str) -> Result<toml_edit::Value> {
    Ok(match value {
        Value::Null => bail!("TOML has no null type (at key `{}`)", key),
        Value::Bool(b) => toml_edit::Value::Boolean(Formatted::new(*b)),
        Value::Integer(n) => toml_edit::Value::Integer(Formatted::new(*n)),
        Value::Float(f) => toml_edit::Value::Float(Formatted::new(*f)),
        Value::String(s) => toml_edit::Value::String(Formatted::new(s.clone())),
        Value::Sequence(seq) => {
            let mut arr = toml_edit::Array::new();
            for item in seq {
                arr.push(value_to_toml(item, key)?);
            }
            toml_edit::Value::Array(arr)
        }
        Value::Mapping(map) => {
            let mut inline = toml_edit::InlineTable::new();
            for (k, v) in map {
                inline.insert(k.as_str(), value_to_toml(v, k)?);
            }
            toml_edit::Value::InlineTable(inline)
        }
    })
}
