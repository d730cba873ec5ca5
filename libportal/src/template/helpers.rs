//! Built-in functions callable from template expressions.
//!
//! `isset` and `empty` need unevaluated arguments and live in the
//! evaluator; everything else is dispatched here by name.

use chrono::{Datelike, Local};

use super::expr::{text, EvalResult};
use crate::value::Value;

/// Characters removed by `trim` when no character list is given.
const DEFAULT_TRIM: &str = " \t\n\r\0\u{0B}";

/// Call a builtin with evaluated arguments.
pub fn call(name: &str, args: Vec<Value>) -> EvalResult<Value> {
    match name {
        "count" => count(&one(name, &args)?),
        "keys" => keys(&one(name, &args)?),
        "strtolower" => Ok(text(&one(name, &args)?)?.to_lowercase().into()),
        "strtoupper" => Ok(text(&one(name, &args)?)?.to_uppercase().into()),
        "trim" | "ltrim" | "rtrim" => trim(name, &args),
        "implode" | "join" => implode(name, &args),
        "explode" => explode(&args),
        "htmlspecialchars" | "escape" => Ok(escape_html(&text(&one(name, &args)?)?).into()),
        "strip_tags" => Ok(strip_tags(&text(&one(name, &args)?)?).into()),
        "indent" => {
            let [s, n] = exactly::<2>(name, args)?;
            Ok(indent(&text(&s)?, integer(name, &n)?).into())
        }
        "str_repeat" => {
            let [s, n] = exactly::<2>(name, args)?;
            let n = usize::try_from(integer(name, &n)?)
                .map_err(|_| "str_repeat(): count must be non-negative".to_string())?;
            Ok(text(&s)?.repeat(n).into())
        }
        "str_replace" => {
            let [search, replace, subject] = exactly::<3>(name, args)?;
            let search = text(&search)?;
            let subject = text(&subject)?;
            if search.is_empty() {
                return Ok(subject.into());
            }
            Ok(subject.replace(&search, &text(&replace)?).into())
        }
        "copyright_year" => copyright_year(&args),
        _ => Err(format!("Call to undefined function {}()", name)),
    }
}

fn one(name: &str, args: &[Value]) -> EvalResult<Value> {
    match args {
        [arg] => Ok(arg.clone()),
        _ => Err(format!("{}() expects exactly 1 argument, {} given", name, args.len())),
    }
}

fn exactly<const N: usize>(name: &str, args: Vec<Value>) -> EvalResult<[Value; N]> {
    let given = args.len();
    args.try_into()
        .map_err(|_| format!("{}() expects exactly {} arguments, {} given", name, N, given))
}

fn integer(name: &str, value: &Value) -> EvalResult<i64> {
    match value {
        Value::Integer(n) => Ok(*n),
        Value::Float(f) => Ok(f.trunc() as i64),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("{}() expects an integer, got \"{}\"", name, s)),
        other => Err(format!("{}() expects an integer, got a {}", name, other.type_name())),
    }
}

fn count(value: &Value) -> EvalResult<Value> {
    let n = match value {
        Value::Sequence(seq) => seq.len(),
        Value::Mapping(map) => map.len(),
        other => {
            return Err(format!(
                "count() expects a sequence or mapping, got a {}",
                other.type_name()
            ))
        }
    };
    Ok(Value::Integer(n as i64))
}

fn keys(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Sequence(seq) => Ok((0..seq.len() as i64).map(Value::Integer).collect::<Vec<_>>().into()),
        Value::Mapping(map) => Ok(map.keys().map(|k| Value::from(k.as_str())).collect::<Vec<_>>().into()),
        other => Err(format!("keys() expects a sequence or mapping, got a {}", other.type_name())),
    }
}

fn trim(name: &str, args: &[Value]) -> EvalResult<Value> {
    let (s, chars) = match args {
        [s] => (text(s)?, DEFAULT_TRIM.to_string()),
        [s, chars] => (text(s)?, text(chars)?),
        _ => return Err(format!("{}() expects 1 or 2 arguments, {} given", name, args.len())),
    };
    let strip = |c: char| chars.contains(c);
    let trimmed = match name {
        "ltrim" => s.trim_start_matches(strip),
        "rtrim" => s.trim_end_matches(strip),
        _ => s.trim_matches(strip),
    };
    Ok(trimmed.into())
}

/// `implode(glue, pieces)`; the pieces may come first, and the glue may be omitted.
fn implode(name: &str, args: &[Value]) -> EvalResult<Value> {
    let (glue, pieces) = match args {
        [pieces] => (String::new(), pieces),
        [glue, pieces] if pieces.is_container() => (text(glue)?, pieces),
        [pieces, glue] if pieces.is_container() => (text(glue)?, pieces),
        _ => return Err(format!("{}() expects a glue string and a sequence", name)),
    };
    let items: Vec<&Value> = match pieces {
        Value::Sequence(seq) => seq.iter().collect(),
        Value::Mapping(map) => map.values().collect(),
        other => return Err(format!("{}() expects a sequence, got a {}", name, other.type_name())),
    };
    let parts = items
        .into_iter()
        .map(text)
        .collect::<EvalResult<Vec<_>>>()?;
    Ok(parts.join(&glue).into())
}

fn explode(args: &[Value]) -> EvalResult<Value> {
    let (sep, s) = match args {
        [sep, s] => (text(sep)?, text(s)?),
        _ => return Err(format!("explode() expects exactly 2 arguments, {} given", args.len())),
    };
    if sep.is_empty() {
        return Err("explode(): separator cannot be empty".to_string());
    }
    Ok(s.split(sep.as_str()).map(Value::from).collect::<Vec<_>>().into())
}

/// Year range like `2011-2024`. Missing or falsy bounds default to the
/// current year; equal bounds collapse to a single year.
fn copyright_year(args: &[Value]) -> EvalResult<Value> {
    if args.len() > 3 {
        return Err(format!("copyright_year() expects at most 3 arguments, {} given", args.len()));
    }
    let this_year = Value::Integer(i64::from(Local::now().year()));
    let arg = |i: usize| args.get(i).filter(|v| v.is_truthy()).cloned();
    let start = arg(0).unwrap_or_else(|| this_year.clone());
    let end = arg(1).unwrap_or(this_year);
    let sep = arg(2).map_or(Ok("-".to_string()), |v| text(&v))?;

    if super::expr::loose_eq(&start, &end) {
        return Ok(start);
    }
    Ok(format!("{}{}{}", text(&start)?, sep, text(&end)?).into())
}

/// Escape `& < > " '` as HTML entities.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Remove `<...>` tags, keeping the text between them.
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Prefix every line with `n` spaces.
pub fn indent(s: &str, n: i64) -> String {
    let pad = " ".repeat(usize::try_from(n).unwrap_or(0));
    s.split('\n')
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_str(name: &str, args: Vec<Value>) -> String {
        call(name, args).unwrap().to_string()
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#039;Jerry&#039;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<b>bold</b> and <i>it</i>"), "bold and it");
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("a\nb", 2), "  a\n  b");
        assert_eq!(call_str("indent", vec!["x".into(), "3".into()]), "   x");
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(call_str("strtoupper", vec!["abc".into()]), "ABC");
        assert_eq!(call_str("trim", vec!["  hi \n".into()]), "hi");
        assert_eq!(call_str("rtrim", vec!["path///".into(), "/".into()]), "path");
        assert_eq!(call_str("ltrim", vec!["--x-".into(), "-".into()]), "x-");
        assert_eq!(call_str("str_repeat", vec!["ab".into(), 3.into()]), "ababab");
        assert_eq!(
            call_str("str_replace", vec!["a".into(), "o".into(), "banana".into()]),
            "bonono"
        );
    }

    #[test]
    fn test_implode_and_explode() {
        let list = Value::from(vec![Value::from("a"), Value::from(1), Value::from("c")]);
        assert_eq!(call_str("implode", vec![", ".into(), list.clone()]), "a, 1, c");
        assert_eq!(call_str("implode", vec![list.clone(), "-".into()]), "a-1-c");
        assert_eq!(call_str("implode", vec![list]), "a1c");

        let parts = call("explode", vec![",".into(), "x,y".into()]).unwrap();
        assert_eq!(parts, Value::from(vec![Value::from("x"), Value::from("y")]));
        assert!(call("explode", vec!["".into(), "x".into()]).is_err());
    }

    #[test]
    fn test_count_and_keys() {
        let map: Value = [("a", Value::from(1)), ("b", Value::from(2))].into_iter().collect();
        assert_eq!(call("count", vec![map.clone()]), Ok(Value::Integer(2)));
        assert_eq!(
            call("keys", vec![map]),
            Ok(Value::from(vec![Value::from("a"), Value::from("b")]))
        );
        assert!(call("count", vec!["abc".into()]).is_err());
    }

    #[test]
    fn test_copyright_year() {
        assert_eq!(call_str("copyright_year", vec![2011.into(), 2024.into()]), "2011-2024");
        assert_eq!(
            call_str("copyright_year", vec![2011.into(), 2024.into(), "–".into()]),
            "2011–2024"
        );
        assert_eq!(call_str("copyright_year", vec![2020.into(), "2020".into()]), "2020");

        let this_year = Local::now().year().to_string();
        assert_eq!(call_str("copyright_year", vec![]), this_year);
        assert_eq!(
            call_str("copyright_year", vec![2000.into()]),
            format!("2000-{}", this_year)
        );
    }

    #[test]
    fn test_unknown_function_and_arity() {
        assert_eq!(
            call("frobnicate", vec![]),
            Err("Call to undefined function frobnicate()".to_string())
        );
        assert!(call("strtolower", vec![]).is_err());
        assert!(call("indent", vec!["x".into()]).is_err());
    }
}
