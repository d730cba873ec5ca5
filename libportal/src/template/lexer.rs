//! Template lexer.
//!
//! Splits template source into literal text and directives, and tokenizes
//! the code inside directives. The result is one flat token stream:
//!
//! - `Text` for literal output
//! - `EmitStart` / `EmitEnd` around the expression of `{{ ... }}`
//! - code tokens for `[[ ... ]]` and `@` lines, each segment closed by `Semi`
//! - `BlockStart` / `BlockEnd` for `[: block NAME :]` and `[: endblock :]`
//!
//! Whitespace rules: an `@` line produces no output at all, and a newline
//! directly after `]]` or `:]` is swallowed. A newline after `}}` is kept.

use crate::error::{SourceContext, TemplateError, TemplateResult};

/// Operators and punctuation, longest first.
const OPERATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "??", "=>", ".=", "+=", "-=", "<", ">",
    "!", "+", "-", "*", "/", "%", ".", "=", "(", ")", "[", "]", "{", "}", ",", ":", "?",
];

/// Piece of a double-quoted string.
#[derive(Debug, Clone, PartialEq)]
pub enum StrPart {
    Lit(String),
    Var(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Text(String),
    EmitStart,
    EmitEnd,
    BlockStart(String),
    BlockEnd,
    Var(String),
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Interp(Vec<StrPart>),
    Op(&'static str),
    Semi,
}

impl Tok {
    /// Short description for syntax errors.
    pub fn describe(&self) -> String {
        match self {
            Tok::Text(_) => "template text".to_string(),
            Tok::EmitStart => "\"{{\"".to_string(),
            Tok::EmitEnd => "\"}}\"".to_string(),
            Tok::BlockStart(name) => format!("block {}", name),
            Tok::BlockEnd => "endblock".to_string(),
            Tok::Var(name) => format!("${}", name),
            Tok::Ident(name) => format!("\"{}\"", name),
            Tok::Int(n) => n.to_string(),
            Tok::Float(f) => f.to_string(),
            Tok::Str(_) | Tok::Interp(_) => "string".to_string(),
            Tok::Op(op) => format!("\"{}\"", op),
            Tok::Semi => "end of statement".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

/// Tokenize a whole template.
pub fn tokenize(source: &str, ctx: &SourceContext) -> TemplateResult<Vec<Token>> {
    let source = source.replace("\r\n", "\n");
    let mut lexer = Lexer {
        src: &source,
        ctx,
        tokens: Vec::new(),
        text: String::new(),
        text_line: 1,
        line: 1,
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

/// Block marker at the start of `rest`, with the offset of its closing `:]`.
/// Any other `[:` is plain text.
fn block_marker(rest: &str) -> Option<(Tok, usize)> {
    let inner_start = "[:".len();
    let close = inner_start + rest.strip_prefix("[:")?.find(":]")?;
    let inner = rest[inner_start..close].trim();
    if inner.contains('\n') {
        return None;
    }
    if inner == "endblock" {
        return Some((Tok::BlockEnd, close));
    }
    let name = inner.strip_prefix("block")?;
    if !name.starts_with(char::is_whitespace) {
        return None;
    }
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some((Tok::BlockStart(name.to_string()), close))
}

struct Lexer<'a> {
    src: &'a str,
    ctx: &'a SourceContext,
    tokens: Vec<Token>,
    text: String,
    text_line: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn run(&mut self) -> TemplateResult<()> {
        let src = self.src;
        let mut i = 0;
        let mut line_start = true;

        while i < src.len() {
            if line_start {
                let end = src[i..].find('\n').map_or(src.len(), |p| i + p);
                let content = src[i..end].trim_start_matches([' ', '\t']);
                if let Some(code) = content.strip_prefix('@') {
                    self.flush_text();
                    let line = self.line;
                    self.code(code, line)?;
                    self.push(Tok::Semi, line);
                    self.line += 1;
                    i = end + 1;
                    continue;
                }
                line_start = false;
            }

            let rest = &src[i..];
            if rest.starts_with("{{") {
                let close = self.find_close(i + 2, "}}", "{{")?;
                self.flush_text();
                let line = self.line;
                self.push(Tok::EmitStart, line);
                self.code(&src[i + 2..close], line)?;
                self.push(Tok::EmitEnd, self.line);
                i = close + 2;
            } else if rest.starts_with("[[") {
                let close = self.find_close(i + 2, "]]", "[[")?;
                self.flush_text();
                let line = self.line;
                self.code(&src[i + 2..close], line)?;
                self.push(Tok::Semi, self.line);
                i = close + 2;
                if src[i..].starts_with('\n') {
                    i += 1;
                    self.line += 1;
                    line_start = true;
                }
            } else if let Some((tok, close)) = block_marker(rest) {
                self.flush_text();
                let line = self.line;
                self.push(tok, line);
                i += close + 2;
                if src[i..].starts_with('\n') {
                    i += 1;
                    self.line += 1;
                    line_start = true;
                }
            } else if let Some(c) = rest.chars().next() {
                if self.text.is_empty() {
                    self.text_line = self.line;
                }
                self.text.push(c);
                if c == '\n' {
                    self.line += 1;
                    line_start = true;
                }
                i += c.len_utf8();
            }
        }

        self.flush_text();
        Ok(())
    }

    fn push(&mut self, tok: Tok, line: usize) {
        self.tokens.push(Token { tok, line });
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.push(Tok::Text(text), self.text_line);
        }
    }

    fn find_close(&self, from: usize, close: &str, open: &str) -> TemplateResult<usize> {
        self.src[from..]
            .find(close)
            .map(|p| from + p)
            .ok_or_else(|| {
                TemplateError::syntax(format!("Unterminated \"{}\"", open), self.ctx, self.line)
            })
    }

    /// Tokenize one code segment, advancing the line counter over it.
    fn code(&mut self, code: &str, line: usize) -> TemplateResult<()> {
        let mut scanner = CodeScanner {
            chars: code.chars().collect(),
            pos: 0,
            line,
            ctx: self.ctx,
        };
        while let Some(token) = scanner.next_token()? {
            self.tokens.push(token);
        }
        self.line = scanner.line;
        Ok(())
    }
}

// ============================================================================
// Code Tokens
// ============================================================================

struct CodeScanner<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    ctx: &'a SourceContext,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl<'a> CodeScanner<'a> {
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::syntax(message, self.ctx, self.line)
    }

    fn token(&self, tok: Tok, line: usize) -> Option<Token> {
        Some(Token { tok, line })
    }

    fn next_token(&mut self) -> TemplateResult<Option<Token>> {
        loop {
            let Some(c) = self.peek(0) else {
                return Ok(None);
            };
            match c {
                '\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                c if c.is_whitespace() => self.pos += 1,
                '#' => self.skip_line_comment(),
                '/' if self.peek(1) == Some('/') => self.skip_line_comment(),
                '/' if self.peek(1) == Some('*') => self.skip_block_comment()?,
                _ => break,
            }
        }

        let line = self.line;
        let c = self.chars[self.pos];

        if c == ';' {
            self.pos += 1;
            return Ok(self.token(Tok::Semi, line));
        }
        if c == '$' {
            self.pos += 1;
            let name = self.ident();
            if name.is_empty() {
                return Err(self.error("Expected variable name after \"$\""));
            }
            return Ok(self.token(Tok::Var(name), line));
        }
        if is_ident_start(c) {
            let name = self.ident();
            return Ok(self.token(Tok::Ident(name), line));
        }
        if c.is_ascii_digit() {
            return self.number().map(|tok| self.token(tok, line));
        }
        if c == '\'' {
            return self.single_quoted().map(|tok| self.token(tok, line));
        }
        if c == '"' {
            return self.double_quoted().map(|tok| self.token(tok, line));
        }
        for op in OPERATORS {
            let matches = op
                .chars()
                .enumerate()
                .all(|(k, oc)| self.peek(k) == Some(oc));
            if matches {
                self.pos += op.len();
                return Ok(self.token(Tok::Op(op), line));
            }
        }
        Err(self.error(format!("Unexpected character '{}'", c)))
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) -> TemplateResult<()> {
        let start_line = self.line;
        self.pos += 2;
        while let Some(c) = self.peek(0) {
            if c == '*' && self.peek(1) == Some('/') {
                self.pos += 2;
                return Ok(());
            }
            if c == '\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
        Err(TemplateError::syntax(
            "Unterminated comment",
            self.ctx,
            start_line,
        ))
    }

    fn ident(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek(0).filter(|&c| is_ident_char(c)) {
            name.push(c);
            self.pos += 1;
        }
        name
    }

    fn number(&mut self) -> TemplateResult<Tok> {
        let mut text = String::new();
        while let Some(c) = self.peek(0).filter(char::is_ascii_digit) {
            text.push(c);
            self.pos += 1;
        }
        let fraction = self.peek(0) == Some('.') && self.peek(1).is_some_and(|c| c.is_ascii_digit());
        if fraction {
            text.push('.');
            self.pos += 1;
            while let Some(c) = self.peek(0).filter(char::is_ascii_digit) {
                text.push(c);
                self.pos += 1;
            }
            return text
                .parse::<f64>()
                .map(Tok::Float)
                .map_err(|_| self.error(format!("Invalid number {}", text)));
        }
        text.parse::<i64>()
            .map(Tok::Int)
            .map_err(|_| self.error(format!("Integer {} is out of range", text)))
    }

    fn single_quoted(&mut self) -> TemplateResult<Tok> {
        let start_line = self.line;
        self.pos += 1;
        let mut s = String::new();
        while let Some(c) = self.peek(0) {
            self.pos += 1;
            match c {
                '\'' => return Ok(Tok::Str(s)),
                '\\' if matches!(self.peek(0), Some('\'') | Some('\\')) => {
                    s.extend(self.peek(0));
                    self.pos += 1;
                }
                '\n' => {
                    self.line += 1;
                    s.push(c);
                }
                _ => s.push(c),
            }
        }
        Err(TemplateError::syntax("Unterminated string", self.ctx, start_line))
    }

    /// Double-quoted string with escapes and `$name` / `{$name}` interpolation.
    fn double_quoted(&mut self) -> TemplateResult<Tok> {
        let start_line = self.line;
        self.pos += 1;
        let mut parts = Vec::new();
        let mut lit = String::new();
        while let Some(c) = self.peek(0) {
            self.pos += 1;
            match c {
                '"' => {
                    if !lit.is_empty() || parts.is_empty() {
                        parts.push(StrPart::Lit(lit));
                    }
                    return Ok(match parts.as_slice() {
                        [StrPart::Lit(s)] => Tok::Str(s.clone()),
                        _ => Tok::Interp(parts),
                    });
                }
                '\\' => {
                    let escaped = match self.peek(0) {
                        Some('n') => Some('\n'),
                        Some('t') => Some('\t'),
                        Some('r') => Some('\r'),
                        Some('"') => Some('"'),
                        Some('\\') => Some('\\'),
                        Some('$') => Some('$'),
                        _ => None,
                    };
                    match escaped {
                        Some(e) => {
                            lit.push(e);
                            self.pos += 1;
                        }
                        None => lit.push('\\'),
                    }
                }
                '$' if self.peek(0).is_some_and(is_ident_start) => {
                    if !lit.is_empty() {
                        parts.push(StrPart::Lit(std::mem::take(&mut lit)));
                    }
                    parts.push(StrPart::Var(self.ident()));
                }
                '{' if self.peek(0) == Some('$') && self.peek(1).is_some_and(is_ident_start) => {
                    self.pos += 1;
                    let name = self.ident();
                    if self.peek(0) != Some('}') {
                        return Err(self.error("Expected \"}\" after interpolated variable"));
                    }
                    self.pos += 1;
                    if !lit.is_empty() {
                        parts.push(StrPart::Lit(std::mem::take(&mut lit)));
                    }
                    parts.push(StrPart::Var(name));
                }
                '\n' => {
                    self.line += 1;
                    lit.push(c);
                }
                _ => lit.push(c),
            }
        }
        Err(TemplateError::syntax("Unterminated string", self.ctx, start_line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(source: &str) -> Vec<Tok> {
        tokenize(source, &SourceContext::Inline)
            .unwrap()
            .into_iter()
            .map(|t| t.tok)
            .collect()
    }

    #[test]
    fn test_text_and_emit() {
        assert_eq!(
            toks("Hi {{ $name }}!\n"),
            vec![
                Tok::Text("Hi ".into()),
                Tok::EmitStart,
                Tok::Var("name".into()),
                Tok::EmitEnd,
                Tok::Text("!\n".into()),
            ]
        );
    }

    #[test]
    fn test_directive_line_swallows_its_newline() {
        assert_eq!(
            toks("a\n  @if $x:\nb\n@endif // done\n"),
            vec![
                Tok::Text("a\n".into()),
                Tok::Ident("if".into()),
                Tok::Var("x".into()),
                Tok::Op(":"),
                Tok::Semi,
                Tok::Text("b\n".into()),
                Tok::Ident("endif".into()),
                Tok::Semi,
            ]
        );
    }

    #[test]
    fn test_code_block_swallows_following_newline() {
        assert_eq!(
            toks("[[ $a = 1; ]]\nx"),
            vec![
                Tok::Var("a".into()),
                Tok::Op("="),
                Tok::Int(1),
                Tok::Semi,
                Tok::Semi,
                Tok::Text("x".into()),
            ]
        );
    }

    #[test]
    fn test_block_markers() {
        assert_eq!(
            toks("<h1>[: block title :]Default[: endblock :]</h1>"),
            vec![
                Tok::Text("<h1>".into()),
                Tok::BlockStart("title".into()),
                Tok::Text("Default".into()),
                Tok::BlockEnd,
                Tok::Text("</h1>".into()),
            ]
        );
    }

    #[test]
    fn test_other_bracket_colon_is_text() {
        assert_eq!(
            toks("a [:-) b [: not a block :] c [: block"),
            vec![Tok::Text("a [:-) b [: not a block :] c [: block".into())]
        );
        assert_eq!(
            toks("[:blockname:]x"),
            vec![Tok::Text("[:blockname:]x".into())]
        );
    }

    #[test]
    fn test_strings_and_interpolation() {
        assert_eq!(
            toks("{{ 'it\\'s' . \"device_$device {$x}\\n\" }}"),
            vec![
                Tok::EmitStart,
                Tok::Str("it's".into()),
                Tok::Op("."),
                Tok::Interp(vec![
                    StrPart::Lit("device_".into()),
                    StrPart::Var("device".into()),
                    StrPart::Lit(" ".into()),
                    StrPart::Var("x".into()),
                    StrPart::Lit("\n".into()),
                ]),
                Tok::EmitEnd,
            ]
        );
    }

    #[test]
    fn test_numbers_and_operators() {
        assert_eq!(
            toks("[[ 1.5 + 2 . 'x' !== $y ?? null ]]"),
            vec![
                Tok::Float(1.5),
                Tok::Op("+"),
                Tok::Int(2),
                Tok::Op("."),
                Tok::Str("x".into()),
                Tok::Op("!=="),
                Tok::Var("y".into()),
                Tok::Op("??"),
                Tok::Ident("null".into()),
                Tok::Semi,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            toks("[[ /* a\nb */ # c\n// d\n]]"),
            vec![Tok::Semi]
        );
    }

    #[test]
    fn test_line_numbers() {
        let tokens = tokenize("a\nb\n{{ $x }}\n@if $y:\n", &SourceContext::Inline).unwrap();
        let var_lines: Vec<usize> = tokens
            .iter()
            .filter(|t| matches!(t.tok, Tok::Var(_)))
            .map(|t| t.line)
            .collect();
        assert_eq!(var_lines, vec![3, 4]);
    }

    #[test]
    fn test_unterminated_directive() {
        let err = tokenize("ok\n{{ $x", &SourceContext::Inline).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Syntax error: Unterminated \"{{\" at line 2 of <string>"
        );
    }

    #[test]
    fn test_unknown_block_directive_is_text() {
        assert_eq!(toks("[: blocky :]"), vec![Tok::Text("[: blocky :]".into())]);
    }
}
