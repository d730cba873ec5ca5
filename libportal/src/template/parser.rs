//! Template parser.
//!
//! Builds the compiled node tree from the token stream produced by
//! [`super::lexer`]. Statements may span several directives: the body of
//! an `if` opened in one `[[ ... ]]` segment can contain template text and
//! other directives until the matching `endif` or `}`.

use super::expr::{BinaryOp, Expr, UnaryOp};
use super::lexer::{Tok, Token};
use crate::error::{SourceContext, TemplateError, TemplateResult};
use crate::value::Value;

/// Compiled template instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal template text.
    Text(String),
    /// `{{ expr }}`; `escape` is fixed when the template is compiled.
    Emit { expr: Expr, escape: bool, line: usize },
    /// `echo a, b`, never escaped.
    Echo { exprs: Vec<Expr>, line: usize },
    /// `$name = expr`, or a compound form when `op` is set.
    Set {
        name: String,
        op: Option<BinaryOp>,
        expr: Expr,
        line: usize,
    },
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        otherwise: Vec<Node>,
        line: usize,
    },
    Foreach {
        subject: Expr,
        key: Option<String>,
        value: String,
        body: Vec<Node>,
        line: usize,
    },
    Include {
        path: Expr,
        locals: Option<Expr>,
        line: usize,
    },
    Inherit { path: Expr, line: usize },
    Block {
        name: String,
        body: Vec<Node>,
        line: usize,
    },
}

/// Parse a token stream into nodes.
pub fn parse(tokens: Vec<Token>, ctx: &SourceContext, escape: bool) -> TemplateResult<Vec<Node>> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        ctx,
        escape,
    };
    let nodes = parser.statements()?;
    match parser.peek() {
        None => Ok(nodes),
        Some(tok) => Err(parser.error(format!("Unexpected {}", tok.describe()))),
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    ctx: &'a SourceContext,
    escape: bool,
}

impl<'a> Parser<'a> {
    // ========================================================================
    // Token Access
    // ========================================================================

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::syntax(message, self.ctx, self.line())
    }

    fn unexpected(&self, expected: &str) -> TemplateError {
        match self.peek() {
            Some(tok) => self.error(format!("Expected {}, found {}", expected, tok.describe())),
            None => self.error(format!("Expected {}, found end of template", expected)),
        }
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(self.peek(), Some(Tok::Op(o)) if *o == op)
    }

    fn is_ident(&self, name: &str) -> bool {
        matches!(self.peek(), Some(Tok::Ident(i)) if i.eq_ignore_ascii_case(name))
    }

    fn eat_op(&mut self, op: &str) -> bool {
        let found = self.is_op(op);
        if found {
            self.pos += 1;
        }
        found
    }

    fn eat_ident(&mut self, name: &str) -> bool {
        let found = self.is_ident(name);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_op(&mut self, op: &str) -> TemplateResult<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("\"{}\"", op)))
        }
    }

    fn expect_ident(&mut self, name: &str) -> TemplateResult<()> {
        if self.eat_ident(name) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("\"{}\"", name)))
        }
    }

    fn expect_var(&mut self) -> TemplateResult<String> {
        match self.peek() {
            Some(Tok::Var(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("a variable")),
        }
    }

    fn skip_semis(&mut self) {
        while matches!(self.peek(), Some(Tok::Semi)) {
            self.pos += 1;
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Parse statements up to a terminator, which is left unconsumed.
    fn statements(&mut self) -> TemplateResult<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            match self.peek() {
                None | Some(Tok::BlockEnd) | Some(Tok::EmitEnd) => break,
                Some(Tok::Op("}")) => break,
                Some(Tok::Ident(word))
                    if ["elseif", "else", "endif", "endforeach"]
                        .iter()
                        .any(|k| word.eq_ignore_ascii_case(k)) =>
                {
                    break
                }
                Some(Tok::Semi) => self.pos += 1,
                Some(_) => nodes.push(self.statement()?),
            }
        }
        Ok(nodes)
    }

    fn statement(&mut self) -> TemplateResult<Node> {
        let line = self.line();
        let Some(token) = self.advance() else {
            return Err(self.unexpected("a statement"));
        };

        match token.tok {
            Tok::Text(text) => Ok(Node::Text(text)),
            Tok::EmitStart => {
                let expr = self.expression()?;
                if !matches!(self.peek(), Some(Tok::EmitEnd)) {
                    return Err(self.unexpected("\"}}\""));
                }
                self.pos += 1;
                Ok(Node::Emit {
                    expr,
                    escape: self.escape,
                    line,
                })
            }
            Tok::BlockStart(name) => {
                let body = self.statements()?;
                if !matches!(self.peek(), Some(Tok::BlockEnd)) {
                    return Err(self.unexpected(&format!("endblock for block {}", name)));
                }
                self.pos += 1;
                Ok(Node::Block { name, body, line })
            }
            Tok::Ident(word) => match word.to_ascii_lowercase().as_str() {
                "if" => self.if_statement(line),
                "foreach" => self.foreach_statement(line),
                "echo" | "print" => {
                    let mut exprs = vec![self.expression()?];
                    while self.eat_op(",") {
                        exprs.push(self.expression()?);
                    }
                    Ok(Node::Echo { exprs, line })
                }
                "include" => {
                    self.expect_op("(")?;
                    let path = self.expression()?;
                    let locals = if self.eat_op(",") {
                        Some(self.expression()?)
                    } else {
                        None
                    };
                    self.expect_op(")")?;
                    Ok(Node::Include { path, locals, line })
                }
                "inherit" => {
                    self.expect_op("(")?;
                    let path = self.expression()?;
                    self.expect_op(")")?;
                    Ok(Node::Inherit { path, line })
                }
                _ => {
                    self.pos -= 1;
                    Err(self.error(format!("Unknown statement \"{}\"", word)))
                }
            },
            Tok::Var(name) => {
                let op = match self.peek() {
                    Some(Tok::Op("=")) => None,
                    Some(Tok::Op(".=")) => Some(BinaryOp::Concat),
                    Some(Tok::Op("+=")) => Some(BinaryOp::Add),
                    Some(Tok::Op("-=")) => Some(BinaryOp::Sub),
                    _ => return Err(self.unexpected(&format!("an assignment to ${}", name))),
                };
                self.pos += 1;
                let expr = self.expression()?;
                Ok(Node::Set {
                    name,
                    op,
                    expr,
                    line,
                })
            }
            other => {
                self.pos -= 1;
                Err(self.error(format!("Unexpected {}", other.describe())))
            }
        }
    }

    fn if_statement(&mut self, line: usize) -> TemplateResult<Node> {
        let cond = self.expression()?;
        if self.eat_op(":") {
            return self.if_alternative(cond, line);
        }

        let mut branches = vec![(cond, self.branch_body()?)];
        let mut otherwise = Vec::new();
        loop {
            let save = self.pos;
            self.skip_semis();
            if self.eat_ident("elseif") {
                let cond = self.expression()?;
                branches.push((cond, self.branch_body()?));
                continue;
            }
            if self.eat_ident("else") {
                if self.eat_ident("if") {
                    let cond = self.expression()?;
                    branches.push((cond, self.branch_body()?));
                    continue;
                }
                otherwise = self.branch_body()?;
                break;
            }
            self.pos = save;
            break;
        }
        Ok(Node::If {
            branches,
            otherwise,
            line,
        })
    }

    /// `if cond: ... elseif cond: ... else: ... endif`
    fn if_alternative(&mut self, cond: Expr, line: usize) -> TemplateResult<Node> {
        let mut branches = vec![(cond, self.statements()?)];
        let mut otherwise = Vec::new();
        loop {
            if self.eat_ident("elseif") {
                let cond = self.expression()?;
                self.expect_op(":")?;
                branches.push((cond, self.statements()?));
                continue;
            }
            if self.eat_ident("else") {
                if self.eat_ident("if") {
                    let cond = self.expression()?;
                    self.expect_op(":")?;
                    branches.push((cond, self.statements()?));
                    continue;
                }
                self.expect_op(":")?;
                otherwise = self.statements()?;
            }
            self.expect_ident("endif")?;
            break;
        }
        Ok(Node::If {
            branches,
            otherwise,
            line,
        })
    }

    /// `{ statements }` or a single statement.
    fn branch_body(&mut self) -> TemplateResult<Vec<Node>> {
        if self.eat_op("{") {
            let body = self.statements()?;
            self.expect_op("}")?;
            return Ok(body);
        }
        if matches!(self.peek(), None | Some(Tok::Semi)) {
            return Err(self.unexpected("a statement"));
        }
        Ok(vec![self.statement()?])
    }

    fn foreach_statement(&mut self, line: usize) -> TemplateResult<Node> {
        let parenthesized = self.eat_op("(");
        let subject = self.expression()?;
        self.expect_ident("as")?;
        let first = self.expect_var()?;
        let (key, value) = if self.eat_op("=>") {
            (Some(first), self.expect_var()?)
        } else {
            (None, first)
        };
        if parenthesized {
            self.expect_op(")")?;
        }

        let body = if self.eat_op(":") {
            let body = self.statements()?;
            self.expect_ident("endforeach")?;
            body
        } else {
            self.branch_body()?
        };
        Ok(Node::Foreach {
            subject,
            key,
            value,
            body,
            line,
        })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn expression(&mut self) -> TemplateResult<Expr> {
        let cond = self.coalesce()?;
        if !self.eat_op("?") {
            return Ok(cond);
        }
        let then = self.expression()?;
        self.expect_op(":")?;
        let otherwise = self.expression()?;
        Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)))
    }

    fn coalesce(&mut self) -> TemplateResult<Expr> {
        let left = self.or()?;
        if self.eat_op("??") {
            let right = self.coalesce()?;
            return Ok(Expr::Coalesce(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn or(&mut self) -> TemplateResult<Expr> {
        let mut left = self.and()?;
        while self.eat_op("||") || self.eat_ident("or") {
            let right = self.and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> TemplateResult<Expr> {
        let mut left = self.equality()?;
        while self.eat_op("&&") || self.eat_ident("and") {
            let right = self.equality()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Left-associative level over a table of operators.
    fn binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> TemplateResult<Expr>,
    ) -> TemplateResult<Expr> {
        let mut left = next(self)?;
        'outer: loop {
            for (symbol, op) in ops {
                if self.eat_op(symbol) {
                    let right = next(self)?;
                    left = Expr::Binary(*op, Box::new(left), Box::new(right));
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn equality(&mut self) -> TemplateResult<Expr> {
        self.binary_level(
            &[
                ("===", BinaryOp::Identical),
                ("!==", BinaryOp::NotIdentical),
                ("==", BinaryOp::Eq),
                ("!=", BinaryOp::NotEq),
            ],
            Self::relational,
        )
    }

    fn relational(&mut self) -> TemplateResult<Expr> {
        self.binary_level(
            &[
                ("<=", BinaryOp::Le),
                (">=", BinaryOp::Ge),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            Self::concat,
        )
    }

    fn concat(&mut self) -> TemplateResult<Expr> {
        self.binary_level(&[(".", BinaryOp::Concat)], Self::additive)
    }

    fn additive(&mut self) -> TemplateResult<Expr> {
        self.binary_level(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> TemplateResult<Expr> {
        self.binary_level(
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Mod)],
            Self::unary,
        )
    }

    fn unary(&mut self) -> TemplateResult<Expr> {
        if self.eat_op("!") {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        if self.eat_op("-") {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        if self.eat_op("+") {
            return self.unary();
        }
        self.postfix()
    }

    fn postfix(&mut self) -> TemplateResult<Expr> {
        let mut expr = self.primary()?;
        while self.eat_op("[") {
            let key = self.expression()?;
            self.expect_op("]")?;
            expr = Expr::Index(Box::new(expr), Box::new(key));
        }
        Ok(expr)
    }

    fn primary(&mut self) -> TemplateResult<Expr> {
        let tok = match self.peek() {
            Some(tok) => tok.clone(),
            None => return Err(self.unexpected("an expression")),
        };
        let expr = match tok {
            Tok::Int(n) => Expr::Literal(Value::Integer(n)),
            Tok::Float(f) => Expr::Literal(Value::Float(f)),
            Tok::Str(s) => Expr::Literal(Value::String(s)),
            Tok::Interp(parts) => Expr::Interp(parts),
            Tok::Var(name) => Expr::Var(name),
            Tok::Op("(") => {
                self.pos += 1;
                let inner = self.expression()?;
                self.expect_op(")")?;
                return Ok(inner);
            }
            Tok::Op("[") => {
                self.pos += 1;
                return self.array_literal();
            }
            Tok::Ident(name) => {
                self.pos += 1;
                match name.to_ascii_lowercase().as_str() {
                    "true" => return Ok(Expr::Literal(Value::Bool(true))),
                    "false" => return Ok(Expr::Literal(Value::Bool(false))),
                    "null" => return Ok(Expr::Literal(Value::Null)),
                    _ => {}
                }
                if !self.eat_op("(") {
                    self.pos -= 1;
                    return Err(self.error(format!("Unknown name \"{}\"", name)));
                }
                let mut args = Vec::new();
                if !self.eat_op(")") {
                    loop {
                        args.push(self.expression()?);
                        if self.eat_op(")") {
                            break;
                        }
                        self.expect_op(",")?;
                    }
                }
                return Ok(Expr::Call(name.to_ascii_lowercase(), args));
            }
            _ => return Err(self.unexpected("an expression")),
        };
        self.pos += 1;
        Ok(expr)
    }

    /// Items after `[`: `a, b` or `"k" => v, ...`, with an optional trailing comma.
    fn array_literal(&mut self) -> TemplateResult<Expr> {
        let mut items = Vec::new();
        while !self.eat_op("]") {
            let first = self.expression()?;
            let item = if self.eat_op("=>") {
                (Some(first), self.expression()?)
            } else {
                (None, first)
            };
            items.push(item);
            if !self.eat_op(",") {
                self.expect_op("]")?;
                break;
            }
        }
        Ok(Expr::Array(items))
    }
}
