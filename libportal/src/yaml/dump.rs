//! Serialize value trees back to YAML text.
//!
//! Output is always block style: one `key: value` or `- value` per line,
//! containers opened by a bare header line. Scalars that would not load
//! back as the same value are quoted, or written as literal blocks when
//! they span lines.

use crate::value::Value;

use super::scalar::is_numeric;
use super::scanner::block_style;

/// Characters and sequences that force a string out of plain style.
const SPECIAL_SEQUENCES: &[&str] = &[
    "\n", ": ", "- ", "*", "#", "<", ">", "  ", "[", "]", "{", "}", "&", "'", "\\",
];

/// Plain words the loader would turn into booleans or null.
///
/// `on`, `off`, `yes`, `no`, `~` and friends are left out so that dumping
/// existing documents keeps producing the same text.
const TRANSLATION_WORDS: &[&str] = &[
    "true", "TRUE", "false", "FALSE", "y", "Y", "n", "N", "null", "NULL",
];

/// Layout settings for [`dump_with_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpOptions {
    /// Columns added per nesting level.
    pub indent: usize,
    /// Plain strings longer than this are folded with `>`. Zero disables folding.
    pub wrap: usize,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            wrap: 40,
        }
    }
}

impl DumpOptions {
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_wrap(mut self, wrap: usize) -> Self {
        self.wrap = wrap;
        self
    }
}

/// Dump with the default layout (indent 2, wrap at 40 columns).
pub fn dump(value: &Value) -> String {
    dump_with_options(value, &DumpOptions::default())
}

/// Dump a value tree as a YAML document starting with `---`.
///
/// A scalar root is written as a one-item sequence.
pub fn dump_with_options(value: &Value, options: &DumpOptions) -> String {
    let dumper = Dumper { options: *options };
    let mut out = String::from("---\n");
    match value {
        Value::Mapping(map) => {
            for (key, item) in map {
                dumper.entry(&mut out, Some(key), item, 0);
            }
        }
        Value::Sequence(items) => {
            for item in items {
                dumper.entry(&mut out, None, item, 0);
            }
        }
        Value::Null => {}
        scalar => dumper.entry(&mut out, None, scalar, 0),
    }
    out
}

struct Dumper {
    options: DumpOptions,
}

impl Dumper {
    /// Write one sequence item (`key` is `None`) or mapping entry.
    fn entry(&self, out: &mut String, key: Option<&str>, value: &Value, indent: usize) {
        let child_indent = indent + self.options.indent;
        match value {
            Value::Sequence(items) if !items.is_empty() => {
                self.line(out, key, "", indent);
                for item in items {
                    self.entry(out, None, item, child_indent);
                }
            }
            Value::Mapping(map) if !map.is_empty() => {
                self.line(out, key, "", indent);
                for (k, v) in map {
                    self.entry(out, Some(k), v, child_indent);
                }
            }
            Value::Sequence(_) | Value::Mapping(_) => self.line(out, key, "[ ]", indent),
            scalar => {
                let text = self.scalar(scalar, indent);
                self.line(out, key, &text, indent);
            }
        }
    }

    fn line(&self, out: &mut String, key: Option<&str>, text: &str, indent: usize) {
        out.push_str(&" ".repeat(indent));
        match key {
            Some(key) => {
                out.push_str(&render_key(key));
                out.push(':');
            }
            None => out.push('-'),
        }
        if !text.is_empty() {
            out.push(' ');
            out.push_str(text);
        }
        out.push('\n');
    }

    fn scalar(&self, value: &Value, indent: usize) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Bool(true) => "true".to_string(),
            Value::Bool(false) => "false".to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(f) => format_float(*f),
            Value::String(s) => self.string(s, indent),
            Value::Sequence(_) | Value::Mapping(_) => "[ ]".to_string(),
        }
    }

    fn string(&self, s: &str, indent: usize) -> String {
        if s.is_empty() {
            return "\"\"".to_string();
        }
        if needs_quoting(s) {
            return self.literal(s, indent);
        }
        if self.options.wrap > 0 && s.chars().count() > self.options.wrap {
            return self.fold(s, indent);
        }
        if is_numeric(s) {
            return format!("\"{}\"", s);
        }
        s.to_string()
    }

    /// Quote a string, or write it as a literal block if quoting cannot hold it.
    fn literal(&self, s: &str, indent: usize) -> String {
        if s == "\n" {
            return "\\n".to_string();
        }
        let has_escape_pair = s.contains("\\\"") || s.contains("''") || s.contains("\\'");
        if !s.contains('\n') && !has_escape_pair {
            if !s.contains('\'') {
                return format!("'{}'", s);
            }
            if !s.contains('"') {
                return format!("\"{}\"", s);
            }
        }

        let trailing = s.len() - s.trim_end_matches('\n').len();
        let (indicator, content) = match trailing {
            0 => ("|-", s),
            1 => ("|", &s[..s.len() - 1]),
            _ => ("|+", &s[..s.len() - 1]),
        };
        let pad = " ".repeat(indent + self.options.indent);
        let mut block = String::from(indicator);
        for line in content.split('\n') {
            block.push('\n');
            if !line.is_empty() {
                block.push_str(&pad);
                block.push_str(line);
            }
        }
        block
    }

    /// Fold a long plain string into a `>` block wrapped at word boundaries.
    fn fold(&self, s: &str, indent: usize) -> String {
        let pad = " ".repeat(indent + self.options.indent);
        let mut block = String::from(">");
        for line in word_wrap(s, self.options.wrap) {
            block.push('\n');
            block.push_str(&pad);
            block.push_str(&line);
        }
        block
    }
}

/// Whether a plain rendering of `s` would load back differently.
fn needs_quoting(s: &str) -> bool {
    SPECIAL_SEQUENCES.iter().any(|seq| s.contains(seq))
        || s.starts_with('!')
        || s.starts_with('"')
        || s.ends_with(':')
        || s.trim() != s
        || TRANSLATION_WORDS.contains(&s)
        || block_style(s).is_some()
}

fn render_key(key: &str) -> String {
    let needs_quotes = key.is_empty()
        || key.contains(':')
        || key.contains('#')
        || key.trim() != key
        || key.starts_with(['-', '[', '{', '&', '*', '!', '"', '\'']);
    if !needs_quotes {
        key.to_string()
    } else if key.contains('"') && !key.contains('\'') {
        format!("'{}'", key)
    } else {
        format!("\"{}\"", key)
    }
}

/// Break at single spaces so no line exceeds `width` unless one word does.
fn word_wrap(s: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in s.split(' ') {
        if !current.is_empty() {
            if current.chars().count() + 1 + word.chars().count() > width {
                lines.push(std::mem::take(&mut current));
            } else {
                current.push(' ');
            }
        }
        current.push_str(word);
    }
    lines.push(current);
    lines
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        ".nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 {
            ".inf".to_string()
        } else {
            "-.inf".to_string()
        }
    } else {
        let s = format!("{}", f);
        if s.contains('.') || s.contains('e') {
            s
        } else {
            format!("{}.0", s)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Mapping;
    use crate::yaml::parse;

    fn map(entries: &[(&str, Value)]) -> Value {
        entries.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    fn seq(items: &[Value]) -> Value {
        Value::Sequence(items.to_vec())
    }

    fn round_trip(value: &Value) {
        let text = dump(value);
        assert_eq!(&parse(&text), value, "dumped as:\n{}", text);
    }

    #[test]
    fn test_dump_layout() {
        let doc = map(&[
            ("title", Value::from("Portal")),
            (
                "links",
                seq(&[
                    map(&[("name", Value::from("Mail")), ("count", Value::from(2))]),
                    Value::from("plain"),
                ]),
            ),
            ("empty", Value::Sequence(vec![])),
        ]);
        assert_eq!(
            dump(&doc),
            "---\ntitle: Portal\nlinks:\n  -\n    name: Mail\n    count: 2\n  - plain\nempty: [ ]\n"
        );
    }

    #[test]
    fn test_dump_custom_indent() {
        let doc = map(&[("a", map(&[("b", Value::from(1))]))]);
        let opts = DumpOptions::default().with_indent(4);
        assert_eq!(dump_with_options(&doc, &opts), "---\na:\n    b: 1\n");
    }

    #[test]
    fn test_dump_scalars() {
        let doc = map(&[
            ("null", Value::Null),
            ("yes", Value::from(true)),
            ("int", Value::from(-3)),
            ("float", Value::from(2.0)),
            ("empty", Value::from("")),
        ]);
        assert_eq!(
            dump(&doc),
            "---\nnull: null\nyes: true\nint: -3\nfloat: 2.0\nempty: \"\"\n"
        );
    }

    #[test]
    fn test_quoting_styles() {
        let dumper = Dumper {
            options: DumpOptions::default(),
        };
        assert_eq!(dumper.string("a: b", 0), "'a: b'");
        assert_eq!(dumper.string("it's", 0), "\"it's\"");
        assert_eq!(dumper.string("true", 0), "'true'");
        assert_eq!(dumper.string("NULL", 0), "'NULL'");
        assert_eq!(dumper.string("42", 0), "\"42\"");
        assert_eq!(dumper.string("ends with:", 0), "'ends with:'");
        assert_eq!(dumper.string("a\nb\n", 0), "|\n  a\n  b");
    }

    #[test]
    fn test_keys_with_colon_or_hash_are_quoted() {
        let doc = map(&[("a:b", Value::from(1)), ("#c", Value::from(2))]);
        assert_eq!(dump(&doc), "---\n\"a:b\": 1\n\"#c\": 2\n");
    }

    #[test]
    fn test_long_strings_fold() {
        let text = "the quick brown fox jumps over the lazy dog again and again";
        let doc = map(&[("text", Value::from(text))]);
        assert_eq!(
            dump(&doc),
            "---\ntext: >\n  the quick brown fox jumps over the lazy\n  dog again and again\n"
        );
        let unfolded = dump_with_options(&doc, &DumpOptions::default().with_wrap(0));
        assert_eq!(unfolded, format!("---\ntext: {}\n", text));
    }

    #[test]
    fn test_scalar_root_dumps_as_item() {
        assert_eq!(dump(&Value::from("x")), "---\n- x\n");
    }

    #[test]
    fn test_round_trip_nested() {
        round_trip(&map(&[
            (
                "site",
                map(&[
                    ("title", Value::from("My Portal")),
                    ("theme", Value::from("dark")),
                    ("ratio", Value::from(1.5)),
                    ("debug", Value::from(false)),
                    ("nothing", Value::Null),
                ]),
            ),
            (
                "links",
                seq(&[
                    map(&[
                        ("name", Value::from("Mail")),
                        ("tags", seq(&[Value::from("a"), Value::from("b")])),
                    ]),
                    seq(&[Value::from(1), seq(&[Value::from(2)])]),
                    Value::Sequence(vec![]),
                ]),
            ),
        ]));
    }

    #[test]
    fn test_round_trip_empty_containers() {
        round_trip(&Value::Mapping(Mapping::new()));
        round_trip(&map(&[("list", Value::Sequence(vec![]))]));
    }

    #[test]
    fn test_round_trip_quoting_branches() {
        let strings = [
            "key: value",
            "- dash",
            "*star",
            "#hash",
            "<b>bold</b>",
            "two  spaces",
            "[bracket]",
            "{brace}",
            "a & b",
            "it's",
            "both ' and \"",
            "!bang",
            "colon:",
            " padded ",
            "true",
            "null",
            "42",
            "3.14",
            "back\\slash",
            "line\\nbreak",
            "\"quoted\"",
            "pipe |",
            "",
            "\n",
            "one\ntwo",
            "one\ntwo\n",
            "one\n\n",
            "a very long sentence that goes well past the folding width of forty",
        ];
        for s in strings {
            round_trip(&map(&[("value", Value::from(s))]));
            round_trip(&seq(&[Value::from(s)]));
        }
    }

    #[test]
    fn test_known_quirk_on_off_yes_no_are_not_quoted() {
        let doc = map(&[("a", Value::from("yes")), ("b", Value::from("off"))]);
        let text = dump(&doc);
        assert_eq!(text, "---\na: yes\nb: off\n");
        assert_eq!(
            parse(&text),
            map(&[("a", Value::from(true)), ("b", Value::from(false))])
        );
    }

    #[test]
    fn test_single_letter_booleans_are_quoted() {
        let doc = map(&[
            ("a", Value::from("y")),
            ("b", Value::from("N")),
            ("c", Value::from("n")),
        ]);
        let text = dump(&doc);
        assert_eq!(text, "---\na: 'y'\nb: 'N'\nc: 'n'\n");
        round_trip(&doc);
    }
}
