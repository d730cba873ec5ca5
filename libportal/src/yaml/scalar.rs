//! Scalar typing for YAML values.
//!
//! [`to_type`] turns the text on the right of `key:` (or after `- `) into
//! a [`Value`]. Flow collections (`[...]` and `{...}`) are split with
//! [`inline_escape`], which masks quoted strings and nested brackets
//! behind placeholder tokens so that only top-level commas separate items.

use crate::value::{Mapping, Value};

use super::scanner::strip_trailing_comment;

/// Words that load as boolean true. Case matters.
const TRUE_WORDS: &[&str] = &[
    "true", "on", "+", "yes", "y", "True", "TRUE", "On", "ON", "YES", "Yes", "Y",
];

/// Words that load as boolean false, compared case-insensitively.
const FALSE_WORDS: &[&str] = &["false", "off", "-", "no", "n"];

/// Upper bound on masking and restoring passes over malformed input.
const MAX_PASSES: usize = 10;

const TOKEN_OPEN: char = '\u{E000}';
const TOKEN_CLOSE: char = '\u{E001}';

/// Type a scalar or flow collection.
pub fn to_type(value: &str) -> Value {
    if value.is_empty() {
        return Value::Null;
    }

    if let Some(inner) = quoted_inner(value) {
        return Value::String(unescape_quoted(inner));
    }

    let value = if value.contains(" #") {
        let stripped = strip_trailing_comment(value);
        if let Some(inner) = quoted_inner(stripped) {
            return Value::String(unescape_quoted(inner));
        }
        stripped
    } else {
        value
    };
    let value = value.replace("\\n", "\n");
    let value = value.as_str();

    if value.starts_with('[') && value.ends_with(']') && value.len() >= 2 {
        let inner = value[1..value.len() - 1].trim();
        if inner.is_empty() {
            return Value::Sequence(Vec::new());
        }
        return Value::Sequence(inline_escape(inner).iter().map(|item| to_type(item)).collect());
    }

    if !value.starts_with('{') {
        if let Some(pos) = value.find(": ") {
            let key = value[..pos].trim();
            let rest = value[pos + 2..].trim();
            let mut map = Mapping::new();
            map.insert(key.to_string(), to_type(rest));
            return Value::Mapping(map);
        }
    }

    if value.starts_with('{') && value.ends_with('}') && value.len() >= 2 {
        let inner = value[1..value.len() - 1].trim();
        if inner.is_empty() {
            return Value::Mapping(Mapping::new());
        }
        return flow_mapping(inline_escape(inner));
    }

    if matches!(value, "null" | "NULL" | "Null" | "~") {
        return Value::Null;
    }

    if is_integer_pattern(value) {
        // Out-of-range and boundary integers stay strings rather than saturate.
        return match value.parse::<i64>() {
            Ok(n) if n != i64::MAX => Value::Integer(n),
            _ => Value::String(value.to_string()),
        };
    }

    if TRUE_WORDS.contains(&value) {
        return Value::Bool(true);
    }
    let lower = value.to_ascii_lowercase();
    if FALSE_WORDS.contains(&lower.as_str()) {
        return Value::Bool(false);
    }

    if is_numeric(value) {
        if value == "0" {
            return Value::Integer(0);
        }
        if let Ok(f) = value.trim().parse::<f64>() {
            return Value::Float(f);
        }
    }

    Value::String(value.to_string())
}

/// Contents between matching outer quotes, if the value is quoted.
fn quoted_inner(value: &str) -> Option<&str> {
    let first = value.chars().next()?;
    if (first == '"' || first == '\'') && value.len() >= 2 && value.ends_with(first) {
        Some(&value[1..value.len() - 1])
    } else {
        None
    }
}

/// Apply the quoted-string unescapes: `\"` to `"`, `''` and `\'` to `'`.
fn unescape_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(c) = rest.chars().next() {
        if rest.starts_with("\\\"") {
            out.push('"');
            rest = &rest[2..];
        } else if rest.starts_with("''") || rest.starts_with("\\'") {
            out.push('\'');
            rest = &rest[2..];
        } else {
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    out
}

/// Build a flow mapping from its comma-separated pieces.
///
/// `key: value` pieces become entries; other truthy pieces are appended
/// under the next free integer key. Falsy pieces are dropped.
fn flow_mapping(pieces: Vec<String>) -> Value {
    let mut map = Mapping::new();
    let mut next_index: i64 = 0;
    for piece in pieces {
        match to_type(&piece) {
            Value::Mapping(entry) => {
                for (k, v) in entry {
                    if let Ok(n) = k.parse::<i64>() {
                        next_index = next_index.max(n + 1);
                    }
                    map.insert(k, v);
                }
            }
            other if other.is_truthy() => {
                map.insert(next_index.to_string(), other);
                next_index += 1;
            }
            _ => {}
        }
    }
    Value::Mapping(map)
}

// ============================================================================
// Inline Escape
// ============================================================================

/// Split the inside of a flow collection on its top-level commas.
///
/// Quoted strings are masked first, then the innermost `[...]` and `{...}`
/// spans, repeatedly, so nested collections survive the split. Items are
/// restored sequences first, then mappings, then strings.
pub fn inline_escape(inline: &str) -> Vec<String> {
    let mut strings = Vec::new();
    let mut inline = mask_quoted(inline, &mut strings);

    let mut sequences = Vec::new();
    let mut mappings = Vec::new();
    for _ in 0..MAX_PASSES {
        while let Some((start, end)) = innermost_span(&inline, '[', ']') {
            inline = mask_span(&inline, start, end, 'S', &mut sequences);
        }
        while let Some((start, end)) = innermost_span(&inline, '{', '}') {
            inline = mask_span(&inline, start, end, 'M', &mut mappings);
        }
        if !inline.contains('[') && !inline.contains('{') {
            break;
        }
    }

    let mut pieces: Vec<String> = inline.split(',').map(|p| p.trim().to_string()).collect();

    for _ in 0..MAX_PASSES {
        for piece in pieces.iter_mut() {
            *piece = restore(piece, 'S', &sequences);
            *piece = restore(piece, 'M', &mappings);
            *piece = restore(piece, 'Q', &strings);
        }
        if !pieces.iter().any(|p| p.contains(TOKEN_OPEN)) {
            break;
        }
    }
    pieces
}

fn token(kind: char, index: usize) -> String {
    format!("{}{}{}{}", TOKEN_OPEN, kind, index, TOKEN_CLOSE)
}

/// Replace each quoted substring (including empty `""` and `''`) with a token.
fn mask_quoted(s: &str, saved: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(c) = rest.chars().next() {
        if c == '"' || c == '\'' {
            if let Some(close) = rest[1..].find(c) {
                let quoted = &rest[..close + 2];
                out.push_str(&token('Q', saved.len()));
                saved.push(quoted.to_string());
                rest = &rest[close + 2..];
                continue;
            }
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

/// Leftmost `open ... close` span containing no other bracket of either kind.
fn innermost_span(s: &str, open: char, close: char) -> Option<(usize, usize)> {
    let mut start = None;
    for (i, c) in s.char_indices() {
        match c {
            '[' | ']' | '{' | '}' => {
                if c == open {
                    start = Some(i);
                } else if c == close {
                    if let Some(start) = start {
                        return Some((start, i));
                    }
                } else {
                    start = None;
                }
            }
            _ => {}
        }
    }
    None
}

fn mask_span(s: &str, start: usize, end: usize, kind: char, saved: &mut Vec<String>) -> String {
    let tok = token(kind, saved.len());
    saved.push(s[start..=end].to_string());
    format!("{}{}{}", &s[..start], tok, &s[end + 1..])
}

/// Substitute the saved text back for every token of one kind.
fn restore(s: &str, kind: char, saved: &[String]) -> String {
    let prefix = format!("{}{}", TOKEN_OPEN, kind);
    if !s.contains(&prefix) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find(&prefix) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + prefix.len()..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        let index = after[..digits].parse::<usize>().ok();
        match (index.and_then(|i| saved.get(i)), after[digits..].strip_prefix(TOKEN_CLOSE)) {
            (Some(text), Some(tail)) => {
                out.push_str(text);
                rest = tail;
            }
            _ => {
                out.push_str(&prefix);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

// ============================================================================
// Number Patterns
// ============================================================================

/// Optional `-`, a non-zero digit, then digits.
pub fn is_integer_pattern(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let mut bytes = digits.bytes();
    match bytes.next() {
        Some(b'1'..=b'9') => bytes.all(|b| b.is_ascii_digit()),
        _ => false,
    }
}

/// Loose numeric test: optional surrounding whitespace, optional sign,
/// digits with an optional fraction (or a bare fraction), optional exponent.
pub fn is_numeric(s: &str) -> bool {
    let s = s.trim_start_matches([' ', '\t', '\n', '\r', '\x0b', '\x0c']);
    let s = s.trim_end_matches([' ', '\t', '\n', '\r', '\x0b', '\x0c']);
    let bytes = s.as_bytes();
    let mut i = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - int_start;

    let mut frac_digits = 0;
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        frac_digits = i - frac_start;
    }
    if int_digits == 0 && frac_digits == 0 {
        return false;
    }

    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }

    i == bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, Value)]) -> Value {
        entries.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(to_type("42"), Value::Integer(42));
        assert_eq!(to_type("-7"), Value::Integer(-7));
        assert_eq!(to_type("42.5"), Value::Float(42.5));
        assert_eq!(to_type("0"), Value::Integer(0));
        assert_eq!(to_type("1e3"), Value::Float(1000.0));
        assert_eq!(to_type("007"), Value::Float(7.0));
    }

    #[test]
    fn test_integer_boundary_stays_string() {
        assert_eq!(
            to_type("9223372036854775807"),
            Value::from("9223372036854775807")
        );
        assert_eq!(
            to_type("99999999999999999999"),
            Value::from("99999999999999999999")
        );
    }

    #[test]
    fn test_booleans_and_null() {
        assert_eq!(to_type("yes"), Value::Bool(true));
        assert_eq!(to_type("ON"), Value::Bool(true));
        assert_eq!(to_type("no"), Value::Bool(false));
        assert_eq!(to_type("OFF"), Value::Bool(false));
        assert_eq!(to_type("-"), Value::Bool(false));
        assert_eq!(to_type("yEs"), Value::from("yEs"));
        assert_eq!(to_type("null"), Value::Null);
        assert_eq!(to_type("~"), Value::Null);
        assert_eq!(to_type(""), Value::Null);
    }

    #[test]
    fn test_quoted_strings() {
        assert_eq!(to_type("'42'"), Value::from("42"));
        assert_eq!(to_type("\"yes\""), Value::from("yes"));
        assert_eq!(to_type("'it''s'"), Value::from("it's"));
        assert_eq!(to_type("\"say \\\"hi\\\"\""), Value::from("say \"hi\""));
        assert_eq!(to_type("'a # b'"), Value::from("a # b"));
    }

    #[test]
    fn test_plain_strings() {
        assert_eq!(to_type("hello world"), Value::from("hello world"));
        assert_eq!(to_type("value # note"), Value::from("value"));
        assert_eq!(to_type("line\\nbreak"), Value::from("line\nbreak"));
    }

    #[test]
    fn test_flow_sequence() {
        assert_eq!(
            to_type("[1, 2, 3]"),
            Value::from(vec![Value::from(1), Value::from(2), Value::from(3)])
        );
        assert_eq!(to_type("[]"), Value::Sequence(vec![]));
        assert_eq!(
            to_type("[a, [b, c], 'd, e']"),
            Value::from(vec![
                Value::from("a"),
                Value::from(vec![Value::from("b"), Value::from("c")]),
                Value::from("d, e"),
            ])
        );
    }

    #[test]
    fn test_flow_mapping() {
        assert_eq!(
            to_type("{a: 1, b: 2}"),
            map(&[("a", Value::from(1)), ("b", Value::from(2))])
        );
        assert_eq!(
            to_type("{name: x, tags: [a, b]}"),
            map(&[
                ("name", Value::from("x")),
                ("tags", Value::from(vec![Value::from("a"), Value::from("b")])),
            ])
        );
        assert_eq!(to_type("{}"), Value::Mapping(Mapping::new()));
    }

    #[test]
    fn test_flow_mapping_appends_bare_items() {
        assert_eq!(
            to_type("{a: 1, loose, 0}"),
            map(&[("a", Value::from(1)), ("0", Value::from("loose"))])
        );
    }

    #[test]
    fn test_colon_space_makes_single_entry_mapping() {
        assert_eq!(to_type("k: v"), map(&[("k", Value::from("v"))]));
    }

    #[test]
    fn test_nested_flow_collections() {
        assert_eq!(
            to_type("[{a: [1, 2]}, {b: 'x, y'}]"),
            Value::from(vec![
                map(&[("a", Value::from(vec![Value::from(1), Value::from(2)]))]),
                map(&[("b", Value::from("x, y"))]),
            ])
        );
    }

    #[test]
    fn test_inline_escape_keeps_empty_quotes() {
        assert_eq!(inline_escape("'', \"\", x"), vec!["''", "\"\"", "x"]);
    }

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric("1"));
        assert!(is_numeric("-1.5"));
        assert!(is_numeric(".5"));
        assert!(is_numeric("5."));
        assert!(is_numeric("1e10"));
        assert!(!is_numeric("1e"));
        assert!(!is_numeric("."));
        assert!(!is_numeric("abc"));
        assert!(!is_numeric("0x1A"));
    }
}
