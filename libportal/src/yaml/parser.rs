//! Line-oriented YAML loader.
//!
//! The loader makes a single pass over the document. Each line is
//! classified on its own and its entries are inserted at the current
//! *path*: the chain of keys leading from the root to the parent of the
//! line, indexed by the column each key was introduced at. A shallower
//! line pops the path back to its parent before insertion.
//!
//! The tree is built in place as [`Node`]s so that integer-keyed tables
//! can keep growing while the pass is running; it is converted to a
//! [`Value`] once the pass is done.

use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::{trace, warn};

use crate::value::{Mapping, Value};

use super::scalar::to_type;
use super::scanner::{
    block_style, count_indent, first_content_indent, is_comment, join_continuation,
    literal_block_continues, needs_next_line, source_lines, strip_trailing_comment, BlockScalar,
};

/// Stands in for block scalar text while the opening line is parsed.
const LITERAL_PLACEHOLDER: &str = "\u{E000}literal\u{E001}";

/// Parse YAML text into a value tree.
pub fn load_str(source: &str) -> Value {
    let lines = source_lines(source);
    let mut loader = Loader::default();
    loader.load_lines(&lines);
    loader.finish()
}

// ============================================================================
// Tree
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Key {
    Index(i64),
    Name(String),
}

impl Key {
    fn into_name(self) -> String {
        match self {
            Key::Index(n) => n.to_string(),
            Key::Name(s) => s,
        }
    }
}

#[derive(Clone, Debug)]
enum Node {
    Leaf(Value),
    Table(Table),
}

impl Default for Node {
    fn default() -> Self {
        Node::Table(Table::default())
    }
}

/// Ordered table with both integer and string keys.
///
/// Becomes a sequence when its keys are exactly `0..n` in order, a mapping
/// otherwise. `mapping` marks tables that came from a mapping so that they
/// stay mappings when empty.
#[derive(Clone, Debug, Default)]
struct Table {
    entries: IndexMap<Key, Node>,
    next_index: i64,
    mapping: bool,
}

impl Node {
    fn from_value(value: Value) -> Node {
        match value {
            Value::Sequence(items) => {
                let mut table = Table::default();
                for item in items {
                    table.push(Node::from_value(item));
                }
                Node::Table(table)
            }
            Value::Mapping(map) => {
                let mut table = Table {
                    mapping: true,
                    ..Table::default()
                };
                for (k, v) in map {
                    table.insert(Key::Name(k), Node::from_value(v));
                }
                Node::Table(table)
            }
            scalar => Node::Leaf(scalar),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Node::Leaf(value) => value,
            Node::Table(table) => table.into_value(),
        }
    }

    /// View this node as a table, replacing a scalar with an empty one.
    fn make_table(&mut self) -> &mut Table {
        match self {
            Node::Table(table) => table,
            Node::Leaf(_) => {
                *self = Node::Table(Table::default());
                self.make_table()
            }
        }
    }
}

impl Table {
    /// Append under the next free integer key.
    fn push(&mut self, node: Node) -> Key {
        let key = Key::Index(self.next_index);
        self.insert(key.clone(), node);
        key
    }

    /// Insert or overwrite in place.
    fn insert(&mut self, key: Key, node: Node) {
        self.note_key(&key);
        self.entries.insert(key, node);
    }

    /// Child under `key`, created as null when missing.
    fn child_mut(&mut self, key: &Key) -> &mut Node {
        self.note_key(key);
        self.entries
            .entry(key.clone())
            .or_insert_with(|| Node::Leaf(Value::Null))
    }

    fn note_key(&mut self, key: &Key) {
        match key {
            Key::Index(n) => self.next_index = self.next_index.max(n + 1),
            Key::Name(_) => self.mapping = true,
        }
    }

    fn is_sequence(&self) -> bool {
        !self.mapping
            && self
                .entries
                .keys()
                .enumerate()
                .all(|(i, key)| *key == Key::Index(i as i64))
    }

    fn into_value(self) -> Value {
        if self.is_sequence() {
            Value::Sequence(self.entries.into_values().map(Node::into_value).collect())
        } else {
            Value::Mapping(
                self.entries
                    .into_iter()
                    .map(|(k, v)| (k.into_name(), v.into_value()))
                    .collect::<Mapping>(),
            )
        }
    }
}

// ============================================================================
// Line Entries
// ============================================================================

/// Where a parsed line puts its value in the parent container.
#[derive(Debug, PartialEq)]
enum Slot {
    Append,
    Named(String),
}

type Entry = (Slot, Value);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupKind {
    Anchor,
    Alias,
}

/// An `&anchor` or `*alias` marker found on a line.
#[derive(Debug, PartialEq)]
struct Group {
    kind: GroupKind,
    name: String,
    start: usize,
    end: usize,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Marker starting at byte `at`, if the text there reads `&name` or `*name`.
fn group_at(line: &str, at: usize) -> Option<Group> {
    let kind = match line[at..].chars().next()? {
        '&' => GroupKind::Anchor,
        '*' => GroupKind::Alias,
        _ => return None,
    };
    let name: String = line[at + 1..].chars().take_while(|&c| is_name_char(c)).collect();
    if name.is_empty() {
        return None;
    }
    let end = at + 1 + name.len();
    Some(Group {
        kind,
        name,
        start: at,
        end,
    })
}

/// Find the one anchor or alias marker on a line.
///
/// Recognized as a line prefix, as a whitespace-separated line suffix,
/// after a `<<:` merge key, or at the start of the value after `- ` or
/// `key: `.
fn find_group(line: &str) -> Option<Group> {
    if !line.contains('&') && !line.contains('*') {
        return None;
    }

    if let Some(group) = group_at(line, 0) {
        return Some(group);
    }

    if let Some((ws, c)) = line.char_indices().rev().find(|(_, c)| c.is_whitespace()) {
        if let Some(group) = group_at(line, ws + c.len_utf8()) {
            if group.end == line.len() {
                return Some(group);
            }
        }
    }

    if let Some(rest) = line.strip_prefix("<<") {
        let rest = rest.trim_start();
        if let Some(value) = rest.strip_prefix(':') {
            let value = value.trim_start();
            if let Some(name) = value.strip_prefix('*') {
                let name: String = name.chars().take_while(|c| !c.is_whitespace()).collect();
                if !name.is_empty() {
                    let start = line.len() - value.len();
                    return Some(Group {
                        kind: GroupKind::Alias,
                        end: start + 1 + name.len(),
                        name,
                        start,
                    });
                }
            }
        }
    }

    let value_start = if line.starts_with("- ") {
        Some(2)
    } else {
        line.find(": ").map(|pos| pos + 2)
    };
    if let Some(start) = value_start {
        let skipped = line[start..].len() - line[start..].trim_start().len();
        if let Some(group) = group_at(line, start + skipped) {
            let followed_by_space = line[group.end..]
                .chars()
                .next()
                .map_or(true, char::is_whitespace);
            if followed_by_space {
                return Some(group);
            }
        }
    }

    None
}

/// Remove a marker and the whitespace around it.
fn strip_group(line: &str, group: &Group) -> String {
    let before = line[..group.start].trim_end();
    let after = line[group.end..].trim_start();
    format!("{} {}", before, after).trim().to_string()
}

/// Strip surrounding quotes from a key.
fn unquote(key: &str) -> String {
    if key.starts_with('"') || key.starts_with('\'') {
        key.trim_matches(['"', '\'']).to_string()
    } else {
        key.to_string()
    }
}

/// `- key:` with nothing after the colon.
fn is_mapped_sequence(line: &str) -> bool {
    line.starts_with('-') && line.ends_with(':')
}

fn is_mapped_value(line: &str) -> bool {
    line.ends_with(':')
}

fn is_array_element(line: &str) -> bool {
    line.starts_with('-') && !(line.len() > 3 && line.starts_with("---"))
}

fn is_plain_array(line: &str) -> bool {
    line.starts_with('[') && line.ends_with(']')
}

/// Value of a `- ...` line. A nested `- - x` produces a nested sequence.
fn array_element(line: &str) -> Value {
    if line.len() <= 1 {
        return Value::Sequence(Vec::new());
    }
    let rest = line[1..].trim();
    if rest.starts_with("- ") {
        return Value::Sequence(vec![array_element(rest)]);
    }
    to_type(rest)
}

/// `"quoted key": value`, matching the rightmost quote followed by `:`.
fn split_quoted_key(line: &str) -> Option<(String, &str)> {
    let first = line.chars().next()?;
    if first != '"' && first != '\'' {
        return None;
    }
    for (end, c) in line.char_indices().rev() {
        if end == 0 {
            break;
        }
        if c != '"' && c != '\'' {
            continue;
        }
        if let Some(value) = line[end + 1..].trim_start().strip_prefix(':') {
            return Some((line[1..end].to_string(), value.trim()));
        }
    }
    None
}

fn key_value_pair(line: &str) -> Vec<Entry> {
    if let Some((key, value)) = split_quoted_key(line) {
        return vec![(Slot::Named(key), to_type(value))];
    }
    match line.find(": ") {
        Some(pos) if pos > 0 => {
            let key = line[..pos].trim().to_string();
            let value = line[pos + 2..].trim();
            vec![(Slot::Named(key), to_type(value))]
        }
        _ => vec![(Slot::Append, Value::String(line.to_string()))],
    }
}

/// Put block scalar text back where the placeholder ended up.
fn revert_literal(value: &mut Value, text: &str) {
    match value {
        Value::String(s) => {
            if let Some(prefix) = s.strip_suffix(LITERAL_PLACEHOLDER) {
                *s = format!("{}{}", prefix.trim_end(), text);
            }
        }
        Value::Sequence(items) => items.iter_mut().for_each(|v| revert_literal(v, text)),
        Value::Mapping(map) => map.values_mut().for_each(|v| revert_literal(v, text)),
        _ => {}
    }
}

// ============================================================================
// Loader
// ============================================================================

/// State of one load call.
#[derive(Default)]
struct Loader {
    result: Node,
    /// Keys from the root to the current parent, with the column each was set at.
    path: Vec<(usize, Key)>,
    /// Anchor name to the path of the anchored node.
    groups: HashMap<String, Vec<Key>>,
    anchor: Option<String>,
    alias: Option<String>,
    /// Path segment to add once the current line is committed.
    delayed_path: Option<(usize, Key)>,
    indent: usize,
}

impl Loader {
    fn load_lines(&mut self, lines: &[String]) {
        let mut i = 0;
        while i < lines.len() {
            let raw = &lines[i];
            let indent = count_indent(raw);
            let content = &raw[indent..];
            let mut next = i + 1;

            if content.trim().is_empty() || is_comment(content) {
                i = next;
                continue;
            }

            self.indent = indent;
            self.path = self.parent_path(indent);

            let mut line = content.to_string();
            let mut literal = None;
            if let Some(style) = block_style(&line) {
                let head_len = line.trim_end().len() - style.len;
                line.truncate(head_len);
                line = format!("{} {}", line.trim_end(), LITERAL_PLACEHOLDER);

                let mut block = BlockScalar::new(style, first_content_indent(lines, next));
                while next < lines.len() && literal_block_continues(&lines[next], indent) {
                    block.push_line(&lines[next]);
                    next += 1;
                }
                literal = Some(block.finish());
            }

            while next < lines.len() && needs_next_line(&line) {
                line = join_continuation(&line, &lines[next]);
                next += 1;
            }
            if needs_next_line(&line) {
                warn!(line = i + 1, "Unterminated flow sequence at end of YAML input");
            }

            if line.contains('#') && !line.contains('"') && !line.contains('\'') {
                line = strip_trailing_comment(&line).to_string();
            }

            trace!(line = i + 1, indent, text = %line, "yaml line");

            let mut entries = self.parse_line(&line);
            if let Some(text) = &literal {
                for (_, value) in entries.iter_mut() {
                    revert_literal(value, text);
                }
            }
            self.add_entries(entries, indent);

            if let Some((column, key)) = self.delayed_path.take() {
                self.set_path(column, key);
            }

            i = next;
        }
    }

    fn finish(self) -> Value {
        match self.result {
            Node::Table(table) if table.entries.is_empty() => Value::Mapping(Mapping::new()),
            node => node.into_value(),
        }
    }

    /// The path with every segment at or beyond `indent` removed.
    fn parent_path(&self, indent: usize) -> Vec<(usize, Key)> {
        if indent == 0 {
            return Vec::new();
        }
        let mut path = self.path.clone();
        while path.last().is_some_and(|(column, _)| indent <= *column) {
            path.pop();
        }
        path
    }

    fn set_path(&mut self, column: usize, key: Key) {
        match self.path.iter_mut().find(|(c, _)| *c == column) {
            Some(segment) => segment.1 = key,
            None => self.path.push((column, key)),
        }
    }

    fn path_keys(&self) -> Vec<Key> {
        self.path.iter().map(|(_, key)| key.clone()).collect()
    }

    fn parse_line(&mut self, line: &str) -> Vec<Entry> {
        self.anchor = None;
        self.alias = None;

        let mut line = line.trim().to_string();
        if line.is_empty() {
            return Vec::new();
        }

        if let Some(group) = find_group(&line) {
            match group.kind {
                GroupKind::Anchor => self.anchor = Some(group.name.clone()),
                GroupKind::Alias => self.alias = Some(group.name.clone()),
            }
            line = strip_group(&line, &group);
            if line.is_empty() {
                return vec![(Slot::Append, Value::Null)];
            }
        }

        if is_mapped_sequence(&line) {
            let key = unquote(line[1..line.len() - 1].trim());
            let column = line.find(key.as_str()).unwrap_or(0) + self.indent;
            self.delayed_path = Some((column, Key::Name(key.clone())));
            let mut item = Mapping::new();
            item.insert(key, Value::Mapping(Mapping::new()));
            return vec![(Slot::Append, Value::Mapping(item))];
        }

        if is_mapped_value(&line) {
            let key = unquote(line[..line.len() - 1].trim());
            return vec![(Slot::Named(key), Value::String(String::new()))];
        }

        if is_array_element(&line) {
            return vec![(Slot::Append, array_element(&line))];
        }

        if is_plain_array(&line) {
            return match to_type(&line) {
                Value::Sequence(items) => items.into_iter().map(|v| (Slot::Append, v)).collect(),
                other => vec![(Slot::Append, other)],
            };
        }

        key_value_pair(&line)
    }

    fn add_entries(&mut self, mut entries: Vec<Entry>, indent: usize) {
        if entries.len() > 1 {
            let common = self.path.clone();
            for entry in entries {
                self.add_entry(entry, indent);
                self.path = common.clone();
            }
        } else if let Some(entry) = entries.pop() {
            self.add_entry(entry, indent);
        }
    }

    fn add_entry(&mut self, (slot, value): Entry, indent: usize) {
        let mut node = Node::from_value(value);

        if let Some(alias) = self.alias.take() {
            match self.resolve_alias(&alias) {
                Some(aliased) => node = aliased,
                None => warn!(alias = %alias, "YAML alias refers to an unknown anchor"),
            }
        }

        let keys = self.path_keys();
        let target = keys
            .iter()
            .fold(&mut self.result, |node, key| node.make_table().child_mut(key));

        let key = match slot {
            Slot::Named(name) if name == "<<" => {
                let table = target.make_table();
                if let Node::Table(source) = node {
                    for (k, v) in source.entries {
                        match k {
                            Key::Index(_) => {
                                table.push(v);
                            }
                            Key::Name(_) => {
                                if !table.entries.contains_key(&k) {
                                    table.insert(k, v);
                                }
                            }
                        }
                    }
                }
                Key::Name(name)
            }
            Slot::Named(name) => {
                let key = Key::Name(name);
                target.make_table().insert(key.clone(), node);
                key
            }
            Slot::Append => target.make_table().push(node),
        };

        self.set_path(indent, key);

        if let Some(anchor) = self.anchor.take() {
            self.groups.insert(anchor, self.path_keys());
        }
    }

    /// Deep copy of the subtree an anchor points at.
    fn resolve_alias(&self, name: &str) -> Option<Node> {
        let keys = self.groups.get(name)?;
        keys.iter()
            .try_fold(&self.result, |node, key| match node {
                Node::Table(table) => table.entries.get(key),
                Node::Leaf(_) => None,
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, Value)]) -> Value {
        entries.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    fn seq(items: &[Value]) -> Value {
        Value::Sequence(items.to_vec())
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(load_str(""), Value::Mapping(Mapping::new()));
        assert_eq!(load_str("  \n\n# only a comment\n"), Value::Mapping(Mapping::new()));
    }

    #[test]
    fn test_flat_mapping() {
        let doc = load_str("title: Portal\ncount: 3\nratio: 0.5\nenabled: yes\n");
        assert_eq!(
            doc,
            map(&[
                ("title", Value::from("Portal")),
                ("count", Value::from(3)),
                ("ratio", Value::from(0.5)),
                ("enabled", Value::from(true)),
            ])
        );
    }

    #[test]
    fn test_nested_mapping_with_irregular_indent() {
        let doc = load_str("a:\n   b:\n        c: 1\n   d: 2\ne: 3\n");
        assert_eq!(
            doc,
            map(&[
                (
                    "a",
                    map(&[("b", map(&[("c", Value::from(1))])), ("d", Value::from(2))])
                ),
                ("e", Value::from(3)),
            ])
        );
    }

    #[test]
    fn test_sequence_of_mappings() {
        let doc = load_str("links:\n  - name: Mail\n    url: /mail\n  - name: News\n    url: /news\n");
        assert_eq!(
            doc,
            map(&[(
                "links",
                seq(&[
                    map(&[("name", Value::from("Mail")), ("url", Value::from("/mail"))]),
                    map(&[("name", Value::from("News")), ("url", Value::from("/news"))]),
                ])
            )])
        );
    }

    #[test]
    fn test_mapped_sequence_entry() {
        let doc = load_str("- item:\n    a: 1\n    b: 2\n- other\n");
        assert_eq!(
            doc,
            seq(&[
                map(&[("item", map(&[("a", Value::from(1)), ("b", Value::from(2))]))]),
                Value::from("other"),
            ])
        );
    }

    #[test]
    fn test_root_sequence_and_nested_dash() {
        let doc = load_str("- a\n- - b\n-\n  - c\n");
        assert_eq!(
            doc,
            seq(&[
                Value::from("a"),
                seq(&[Value::from("b")]),
                seq(&[Value::from("c")]),
            ])
        );
    }

    #[test]
    fn test_literal_block() {
        let doc = load_str("text: |\n  hello\n  world\nnext: 1\n");
        assert_eq!(doc.get("text"), Some(&Value::from("hello\nworld\n")));
        assert_eq!(doc.get("next"), Some(&Value::from(1)));
    }

    #[test]
    fn test_literal_block_keeps_inner_indent_and_blank_lines() {
        let doc = load_str("code: |\n  if x:\n      y\n\n  z\n");
        assert_eq!(doc.get("code"), Some(&Value::from("if x:\n    y\n\nz\n")));
    }

    #[test]
    fn test_folded_block() {
        let doc = load_str("text: >\n  hello\n  world\n");
        assert_eq!(doc.get("text"), Some(&Value::from("hello world")));
    }

    #[test]
    fn test_chomping_indicators() {
        let doc = load_str("strip: |-\n  a\n\nkeep: |+\n  a\n\nend: 1\n");
        assert_eq!(doc.get("strip"), Some(&Value::from("a")));
        assert_eq!(doc.get("keep"), Some(&Value::from("a\n\n")));
    }

    #[test]
    fn test_block_in_sequence() {
        let doc = load_str("- |\n  one\n  two\n- three\n");
        assert_eq!(doc, seq(&[Value::from("one\ntwo\n"), Value::from("three")]));
    }

    #[test]
    fn test_html_tag_is_not_a_folded_block() {
        let doc = load_str("banner: <b>Hi</b>\n");
        assert_eq!(doc.get("banner"), Some(&Value::from("<b>Hi</b>")));
    }

    #[test]
    fn test_comments() {
        let doc = load_str("# header\n---\nkey: value # trailing\ncolor: '#fff' # kept quoted\n");
        assert_eq!(
            doc,
            map(&[("key", Value::from("value")), ("color", Value::from("#fff"))])
        );
    }

    #[test]
    fn test_flow_sequence_spanning_lines() {
        let doc = load_str("list: [a, b,\n  c, d]\nafter: 1\n");
        assert_eq!(
            doc,
            map(&[
                (
                    "list",
                    seq(&[
                        Value::from("a"),
                        Value::from("b"),
                        Value::from("c"),
                        Value::from("d"),
                    ])
                ),
                ("after", Value::from(1)),
            ])
        );
    }

    #[test]
    fn test_plain_array_line() {
        let doc = load_str("[1, 2]\n");
        assert_eq!(doc, seq(&[Value::from(1), Value::from(2)]));
    }

    #[test]
    fn test_quoted_keys() {
        let doc = load_str("\"a: b\": 1\n'#tag': two\n");
        assert_eq!(
            doc,
            map(&[("a: b", Value::from(1)), ("#tag", Value::from("two"))])
        );
    }

    #[test]
    fn test_duplicate_key_last_write_wins() {
        let doc = load_str("a: 1\nb: 2\na: 3\n");
        assert_eq!(doc, map(&[("a", Value::from(3)), ("b", Value::from(2))]));
    }

    #[test]
    fn test_key_without_value_is_empty_string() {
        let doc = load_str("empty:\nnull: ~\n");
        assert_eq!(
            doc,
            map(&[("empty", Value::from("")), ("null", Value::Null)])
        );
    }

    #[test]
    fn test_anchor_and_alias_copy_by_value() {
        let mut doc = load_str("a: &x {k: 1}\nb: *x\n");
        let expected = map(&[("k", Value::from(1))]);
        assert_eq!(doc.get("b"), Some(&expected));

        if let Some(a) = doc.as_mapping_mut().and_then(|m| m.get_mut("a")) {
            *a = map(&[("k", Value::from(2))]);
        }
        assert_eq!(doc.get("b"), Some(&expected));
    }

    #[test]
    fn test_block_anchor_and_merge_key() {
        let doc = load_str(
            "base: &base\n  host: localhost\n  port: 80\nsite:\n  port: 8080\n  <<: *base\n",
        );
        assert_eq!(
            doc.get("site"),
            Some(&map(&[
                ("port", Value::from(8080)),
                ("host", Value::from("localhost")),
            ]))
        );
    }

    #[test]
    fn test_sequence_item_anchor() {
        let doc = load_str("items:\n  - &first one\n  - two\ncopy: *first\n");
        assert_eq!(doc.get("copy"), Some(&Value::from("one")));
    }

    #[test]
    fn test_unknown_alias_keeps_line_value() {
        let doc = load_str("a: *missing\n");
        assert_eq!(doc.get("a"), Some(&Value::from("")));
    }

    #[test]
    fn test_find_group() {
        let group = find_group("a: &x {k: 1}").unwrap();
        assert_eq!((group.kind, group.name.as_str()), (GroupKind::Anchor, "x"));
        let group = find_group("b: *x").unwrap();
        assert_eq!((group.kind, group.name.as_str()), (GroupKind::Alias, "x"));
        assert_eq!(find_group("title: AT&T"), None);
        assert_eq!(find_group("note: a * b"), None);
    }

    #[test]
    fn test_markers_next_to_multibyte_whitespace() {
        assert_eq!(find_group("title: AT&T\u{a0}Labs"), None);
        assert_eq!(find_group("note: 5 *\u{3000}3"), None);
        let group = find_group("a:\u{3000}&x").unwrap();
        assert_eq!((group.kind, group.name.as_str()), (GroupKind::Anchor, "x"));

        let doc = load_str("title: AT&T\u{a0}Labs\nnote: 5 *\u{3000}3\n");
        assert_eq!(doc.get("title"), Some(&Value::from("AT&T\u{a0}Labs")));
        assert_eq!(doc.get("note"), Some(&Value::from("5 *\u{3000}3")));
    }

    #[test]
    fn test_crlf_input() {
        let doc = load_str("a: 1\r\nb: 2\r\n");
        assert_eq!(doc, map(&[("a", Value::from(1)), ("b", Value::from(2))]));
    }
}
