//! Line scanning for the YAML loader.
//!
//! The loader works one physical line at a time. This module owns the
//! line-level concerns that do not depend on the tree being built:
//! - Newline normalization and splitting
//! - Indentation counting
//! - Comment and blank line detection
//! - Literal (`|`) and folded (`>`) block collection
//! - Greedy joining of flow sequences that span several lines

/// Convert `\r\n` and lone `\r` line endings to `\n`.
pub fn normalize_newlines(source: &str) -> String {
    source.replace("\r\n", "\n").replace('\r', "\n")
}

/// Split normalized source into physical lines. A final newline does not
/// start an extra empty line.
pub fn source_lines(source: &str) -> Vec<String> {
    normalize_newlines(source)
        .lines()
        .map(String::from)
        .collect()
}

/// Count the leading whitespace of a line. Tabs count as one column.
pub fn count_indent(line: &str) -> usize {
    line.bytes().take_while(|&b| b == b' ' || b == b'\t').count()
}

/// A line (with its indentation already stripped) that carries no data.
pub fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.trim() == "---"
}

/// Strip a trailing ` #comment`: whitespace, `#`, then at least one character.
///
/// The leftmost such comment wins, so `a #b #c` becomes `a`.
pub fn strip_trailing_comment(s: &str) -> &str {
    let bytes = s.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'#' && i > 0 && i + 1 < bytes.len() && bytes[i - 1].is_ascii_whitespace() {
            return s[..i].trim_end();
        }
    }
    s
}

// ============================================================================
// Block Scalars
// ============================================================================

/// Literal (`|`) keeps newlines, folded (`>`) joins lines with spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Literal,
    Folded,
}

/// Trailing newline handling of a block scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chomp {
    /// Exactly one trailing newline.
    Clip,
    /// No trailing newline (`-`).
    Strip,
    /// Every trailing newline (`+`).
    Keep,
}

/// Header of a block scalar found at the end of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStyle {
    pub kind: BlockKind,
    pub chomp: Chomp,
    /// Byte length of the indicator (`|`, `|-`, `>+`, ...).
    pub len: usize,
}

/// Detect a block scalar indicator at the end of a line.
///
/// A bare `>` that closes something looking like an HTML tag (`<b>`) is
/// treated as text. Chomping indicators must stand apart from the text
/// before them.
pub fn block_style(line: &str) -> Option<BlockStyle> {
    let trimmed = line.trim_end();
    let bytes = trimmed.as_bytes();
    let last = *bytes.last()?;

    if last == b'-' || last == b'+' {
        if bytes.len() < 2 {
            return None;
        }
        let kind = match bytes[bytes.len() - 2] {
            b'|' => BlockKind::Literal,
            b'>' => BlockKind::Folded,
            _ => return None,
        };
        let standalone = bytes.len() == 2 || bytes[bytes.len() - 3].is_ascii_whitespace();
        if !standalone {
            return None;
        }
        let chomp = if last == b'-' { Chomp::Strip } else { Chomp::Keep };
        return Some(BlockStyle { kind, chomp, len: 2 });
    }

    match last {
        b'|' => Some(BlockStyle {
            kind: BlockKind::Literal,
            chomp: Chomp::Clip,
            len: 1,
        }),
        b'>' if !looks_like_html_tag(trimmed) => Some(BlockStyle {
            kind: BlockKind::Folded,
            chomp: Chomp::Strip,
            len: 1,
        }),
        _ => None,
    }
}

/// `<...>` at the end of the line.
fn looks_like_html_tag(line: &str) -> bool {
    line[..line.len() - 1].contains('<')
}

/// Block content continues while lines are blank or indented deeper than
/// the line that opened the block.
pub fn literal_block_continues(line: &str, opener_indent: usize) -> bool {
    line.trim().is_empty() || count_indent(line) > opener_indent
}

/// Accumulator for the body of a block scalar.
#[derive(Debug)]
pub struct BlockScalar {
    style: BlockStyle,
    indent: usize,
    text: String,
}

impl BlockScalar {
    /// Start a block whose content is indented by `indent` columns.
    pub fn new(style: BlockStyle, indent: usize) -> Self {
        Self {
            style,
            indent,
            text: String::new(),
        }
    }

    /// Append one physical line of block content.
    pub fn push_line(&mut self, line: &str) {
        let strip = count_indent(line).min(self.indent);
        let line = &line[strip..];

        match self.style.kind {
            BlockKind::Literal => {
                self.text.push_str(line.trim_end());
                self.text.push('\n');
            }
            BlockKind::Folded => {
                let line = line.trim();
                if line.is_empty() {
                    // Blank lines survive folding as newlines
                    let kept = self.text.trim_end_matches([' ', '\t']).len();
                    self.text.truncate(kept);
                    self.text.push('\n');
                } else {
                    self.text.push_str(line);
                    self.text.push(' ');
                }
            }
        }
    }

    /// Apply chomping and return the scalar text.
    pub fn finish(self) -> String {
        let body = match self.style.kind {
            BlockKind::Literal => self.text,
            BlockKind::Folded => self.text.trim_end_matches(' ').to_string(),
        };
        let content = body.trim_end_matches([' ', '\n']);
        match self.style.chomp {
            Chomp::Strip => content.to_string(),
            Chomp::Clip if content.is_empty() => String::new(),
            Chomp::Clip => format!("{}\n", content),
            Chomp::Keep if self.style.kind == BlockKind::Folded => format!("{}\n", content),
            Chomp::Keep => body,
        }
    }
}

/// Indentation of the first non-blank line at or after `start`.
pub fn first_content_indent(lines: &[String], start: usize) -> usize {
    lines
        .iter()
        .skip(start)
        .find(|l| !l.trim().is_empty())
        .map(|l| count_indent(l))
        .unwrap_or(0)
}

// ============================================================================
// Flow Continuation
// ============================================================================

/// Whether a line opens a flow sequence that is not closed on the same line.
///
/// Applies to lines starting with `[` and to `key: [` mapping values.
pub fn needs_next_line(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() || line.ends_with(']') {
        return false;
    }
    let start = if line.starts_with('[') {
        0
    } else {
        match opening_bracket_after_key(line) {
            Some(pos) => pos,
            None => return false,
        }
    };
    bracket_depth(&line[start..]) > 0
}

/// Position of `[` when the line reads `key:` followed only by spaces and `[`.
fn opening_bracket_after_key(line: &str) -> Option<usize> {
    let colon = line.find(':')?;
    if colon == 0 {
        return None;
    }
    let rest = &line[colon + 1..];
    let skipped = rest.len() - rest.trim_start().len();
    let pos = colon + 1 + skipped;
    (line.as_bytes().get(pos) == Some(&b'[')).then_some(pos)
}

/// Net count of unclosed `[` outside quoted strings.
fn bracket_depth(s: &str) -> i32 {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    for c in s.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '[' => depth += 1,
                ']' => depth -= 1,
                _ => {}
            },
        }
    }
    depth
}

/// Join a continuation line onto a flow line.
pub fn join_continuation(line: &str, next: &str) -> String {
    format!(
        "{} {}",
        line.trim_end_matches([' ', '\n', '\t', '\r']),
        next.trim_start_matches([' ', '\t'])
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_indent() {
        assert_eq!(count_indent(""), 0);
        assert_eq!(count_indent("hello"), 0);
        assert_eq!(count_indent("  hello"), 2);
        assert_eq!(count_indent("   - item"), 3);
    }

    #[test]
    fn test_source_lines_normalizes_newlines() {
        assert_eq!(source_lines("a\r\nb\rc\n"), vec!["a", "b", "c"]);
        assert_eq!(source_lines("a\n\n"), vec!["a", ""]);
    }

    #[test]
    fn test_is_comment() {
        assert!(is_comment("# note"));
        assert!(is_comment("---"));
        assert!(!is_comment("key: value # note"));
    }

    #[test]
    fn test_strip_trailing_comment() {
        assert_eq!(strip_trailing_comment("key: value # note"), "key: value");
        assert_eq!(strip_trailing_comment("color: #fff"), "color: #fff");
        assert_eq!(strip_trailing_comment("a#b"), "a#b");
        assert_eq!(strip_trailing_comment("a #"), "a #");
    }

    #[test]
    fn test_block_style() {
        assert_eq!(block_style("text: |").map(|s| s.kind), Some(BlockKind::Literal));
        assert_eq!(block_style("text: >").map(|s| s.kind), Some(BlockKind::Folded));
        assert_eq!(block_style("text: |-").map(|s| s.chomp), Some(Chomp::Strip));
        assert_eq!(block_style("text: >+").map(|s| s.chomp), Some(Chomp::Keep));
        assert_eq!(block_style("html: <b>"), None);
        assert_eq!(block_style("range: a-"), None);
        assert_eq!(block_style("plain"), None);
    }

    #[test]
    fn test_literal_block_clips_to_one_newline() {
        let style = block_style("|").unwrap();
        let mut block = BlockScalar::new(style, 2);
        block.push_line("  hello");
        block.push_line("  world");
        block.push_line("");
        assert_eq!(block.finish(), "hello\nworld\n");
    }

    #[test]
    fn test_folded_block_joins_lines() {
        let style = block_style(">").unwrap();
        let mut block = BlockScalar::new(style, 2);
        block.push_line("  hello");
        block.push_line("  world");
        block.push_line("");
        block.push_line("  again");
        assert_eq!(block.finish(), "hello world\nagain");
    }

    #[test]
    fn test_needs_next_line() {
        assert!(needs_next_line("[a, b,"));
        assert!(needs_next_line("list: [a,"));
        assert!(needs_next_line("list: [a, [b, c],"));
        assert!(!needs_next_line("list: [a, b]"));
        assert!(!needs_next_line("name: value"));
        assert!(!needs_next_line("title: '[draft'"));
    }

    #[test]
    fn test_join_continuation() {
        assert_eq!(join_continuation("list: [a, ", "   b]"), "list: [a, b]");
    }
}
