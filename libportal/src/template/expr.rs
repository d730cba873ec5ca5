//! Expression tree and evaluator for template directives.
//!
//! Evaluation is loose in the way web templates expect: numeric strings
//! take part in arithmetic, `==` compares across types, and truthiness
//! follows [`Value::is_truthy`]. Faults are reported as plain messages;
//! the renderer attaches the template identity and line.

use std::cmp::Ordering;

use super::helpers;
use super::lexer::StrPart;
use crate::value::{Mapping, Value};

/// Evaluation fault message.
pub type EvalResult<T> = Result<T, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    Eq,
    NotEq,
    Identical,
    NotIdentical,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Concat => ".",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Identical => "===",
            BinaryOp::NotIdentical => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Interp(Vec<StrPart>),
    Var(String),
    Index(Box<Expr>, Box<Expr>),
    /// `[a, "k" => b]`: all entries unkeyed builds a sequence, any key a mapping.
    Array(Vec<(Option<Expr>, Expr)>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Coalesce(Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

impl Expr {
    pub fn eval(&self, scope: &Mapping) -> EvalResult<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Interp(parts) => {
                let mut s = String::new();
                for part in parts {
                    match part {
                        StrPart::Lit(lit) => s.push_str(lit),
                        StrPart::Var(name) => s.push_str(&text(&lookup_var(scope, name)?)?),
                    }
                }
                Ok(Value::String(s))
            }
            Expr::Var(name) => lookup_var(scope, name),
            Expr::Index(base, key) => {
                let base = base.eval(scope)?;
                let key = key.eval(scope)?;
                match index(&base, &key)? {
                    Some(value) => Ok(value),
                    None if base.is_null() => Err(format!("Cannot index null with \"{}\"", key)),
                    None => Err(format!("Undefined key \"{}\"", key)),
                }
            }
            Expr::Array(items) => build_array(items, scope),
            Expr::Unary(UnaryOp::Not, operand) => Ok(Value::Bool(!operand.eval(scope)?.is_truthy())),
            Expr::Unary(UnaryOp::Neg, operand) => {
                arithmetic(BinaryOp::Sub, &Value::Integer(0), &operand.eval(scope)?)
            }
            Expr::Binary(BinaryOp::And, left, right) => {
                Ok(Value::Bool(left.eval(scope)?.is_truthy() && right.eval(scope)?.is_truthy()))
            }
            Expr::Binary(BinaryOp::Or, left, right) => {
                Ok(Value::Bool(left.eval(scope)?.is_truthy() || right.eval(scope)?.is_truthy()))
            }
            Expr::Binary(op, left, right) => binary(*op, &left.eval(scope)?, &right.eval(scope)?),
            Expr::Coalesce(left, right) => match left.eval_opt(scope)? {
                Some(value) if !value.is_null() => Ok(value),
                _ => right.eval(scope),
            },
            Expr::Ternary(cond, then, otherwise) => {
                if cond.eval(scope)?.is_truthy() {
                    then.eval(scope)
                } else {
                    otherwise.eval(scope)
                }
            }
            Expr::Call(name, args) => call(name, args, scope),
        }
    }

    /// Like [`Expr::eval`], but a missing variable or key yields `None`.
    pub fn eval_opt(&self, scope: &Mapping) -> EvalResult<Option<Value>> {
        match self {
            Expr::Var(name) => Ok(scope.get(name).cloned()),
            Expr::Index(base, key) => match base.eval_opt(scope)? {
                Some(base) => index(&base, &key.eval(scope)?),
                None => Ok(None),
            },
            _ => self.eval(scope).map(Some),
        }
    }
}

fn lookup_var(scope: &Mapping, name: &str) -> EvalResult<Value> {
    scope
        .get(name)
        .cloned()
        .ok_or_else(|| format!("Undefined variable ${}", name))
}

fn call(name: &str, args: &[Expr], scope: &Mapping) -> EvalResult<Value> {
    match name {
        "isset" => {
            if args.is_empty() {
                return Err("isset() expects at least 1 argument".to_string());
            }
            for arg in args {
                match arg.eval_opt(scope)? {
                    Some(value) if !value.is_null() => {}
                    _ => return Ok(Value::Bool(false)),
                }
            }
            Ok(Value::Bool(true))
        }
        "empty" => match args {
            [arg] => Ok(Value::Bool(
                !arg.eval_opt(scope)?.is_some_and(|value| value.is_truthy()),
            )),
            _ => Err("empty() expects exactly 1 argument".to_string()),
        },
        _ => {
            let values = args
                .iter()
                .map(|arg| arg.eval(scope))
                .collect::<EvalResult<Vec<_>>>()?;
            helpers::call(name, values)
        }
    }
}

fn build_array(items: &[(Option<Expr>, Expr)], scope: &Mapping) -> EvalResult<Value> {
    if items.iter().all(|(key, _)| key.is_none()) {
        let seq = items
            .iter()
            .map(|(_, item)| item.eval(scope))
            .collect::<EvalResult<Vec<_>>>()?;
        return Ok(Value::Sequence(seq));
    }
    let mut map = Mapping::new();
    let mut next = 0i64;
    for (key, item) in items {
        let key = match key {
            Some(key) => key_string(&key.eval(scope)?)?,
            None => next.to_string(),
        };
        if let Ok(n) = key.parse::<i64>() {
            next = next.max(n.saturating_add(1));
        }
        map.insert(key, item.eval(scope)?);
    }
    Ok(Value::Mapping(map))
}

// ============================================================================
// Value Semantics
// ============================================================================

/// String form of a scalar; containers cannot be converted.
pub fn text(value: &Value) -> EvalResult<String> {
    if value.is_container() {
        return Err(format!("Cannot convert a {} to a string", value.type_name()));
    }
    Ok(value.to_string())
}

fn key_string(key: &Value) -> EvalResult<String> {
    match key {
        Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        Value::Float(f) => Ok((f.trunc() as i64).to_string()),
        Value::Sequence(_) | Value::Mapping(_) => {
            Err(format!("Cannot use a {} as a key", key.type_name()))
        }
        _ => Ok(key.to_string()),
    }
}

/// `base[key]`. `Ok(None)` means the key is absent or the base is null.
pub fn index(base: &Value, key: &Value) -> EvalResult<Option<Value>> {
    match base {
        Value::Null => Ok(None),
        Value::Mapping(map) => Ok(map.get(&key_string(key)?).cloned()),
        Value::Sequence(seq) => Ok(position(key).and_then(|i| seq.get(i)).cloned()),
        Value::String(s) => Ok(position(key)
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string()))),
        other => Err(format!("Cannot index a {}", other.type_name())),
    }
}

fn position(key: &Value) -> Option<usize> {
    match key {
        Value::Integer(n) => usize::try_from(*n).ok(),
        Value::String(s) => s.parse().ok(),
        Value::Bool(b) => Some(usize::from(*b)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn float(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(f) => f,
        }
    }

    fn value(self) -> Value {
        match self {
            Num::Int(n) => Value::Integer(n),
            Num::Float(f) => Value::Float(f),
        }
    }
}

/// Parse a numeric string, allowing surrounding whitespace.
fn numeric_str(s: &str) -> Option<Num> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit() || b"+-.eE".contains(&b)) {
        return None;
    }
    if let Ok(n) = s.parse::<i64>() {
        return Some(Num::Int(n));
    }
    s.parse::<f64>().ok().map(Num::Float)
}

fn number(value: &Value) -> Option<Num> {
    match value {
        Value::Null => Some(Num::Int(0)),
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        Value::Integer(n) => Some(Num::Int(*n)),
        Value::Float(f) => Some(Num::Float(*f)),
        Value::String(s) => numeric_str(s),
        _ => None,
    }
}

fn operand(value: &Value, op: BinaryOp) -> EvalResult<Num> {
    number(value).ok_or_else(|| match value {
        Value::String(s) => format!("Unsupported operand for {}: non-numeric string \"{}\"", op.symbol(), s),
        other => format!("Unsupported operand for {}: {}", op.symbol(), other.type_name()),
    })
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let a = operand(left, op)?;
    let b = operand(right, op)?;

    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Div if y == 0 => return Err("Division by zero".to_string()),
            BinaryOp::Div if x.checked_rem(y) == Some(0) => x.checked_div(y),
            BinaryOp::Div => None,
            BinaryOp::Mod if y == 0 => return Err("Modulo by zero".to_string()),
            BinaryOp::Mod => x.checked_rem(y),
            _ => None,
        };
        if let Some(n) = exact {
            return Ok(Value::Integer(n));
        }
    }

    let (x, y) = (a.float(), b.float());
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div if y == 0.0 => return Err("Division by zero".to_string()),
        BinaryOp::Div => x / y,
        BinaryOp::Mod => {
            let divisor = y.trunc() as i64;
            if divisor == 0 {
                return Err("Modulo by zero".to_string());
            }
            return Ok(Value::Integer((x.trunc() as i64).wrapping_rem(divisor)));
        }
        _ => return Err(format!("{} is not an arithmetic operator", op.symbol())),
    };
    Ok(Num::Float(result).value())
}

/// Loose equality: numbers and numeric strings compare by value, null and
/// booleans compare by truthiness.
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Bool(_), _) | (_, Value::Bool(_)) => left.is_truthy() == right.is_truthy(),
        (Value::Null, Value::Null) => true,
        (Value::Null, Value::String(s)) | (Value::String(s), Value::Null) => s.is_empty(),
        (Value::Null, other) | (other, Value::Null) => !other.is_truthy(),
        (Value::String(a), Value::String(b)) => match (numeric_str(a), numeric_str(b)) {
            (Some(x), Some(y)) => x.float() == y.float(),
            _ => a == b,
        },
        (Value::String(s), n @ (Value::Integer(_) | Value::Float(_)))
        | (n @ (Value::Integer(_) | Value::Float(_)), Value::String(s)) => match numeric_str(s) {
            Some(x) => number(n).is_some_and(|y| x.float() == y.float()),
            None => *s == n.to_string(),
        },
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            number(left).map(Num::float) == number(right).map(Num::float)
        }
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> EvalResult<Ordering> {
    if left.is_container() || right.is_container() {
        return Err(format!(
            "Cannot compare a {} with a {}",
            left.type_name(),
            right.type_name()
        ));
    }
    if let (Value::String(a), Value::String(b)) = (left, right) {
        if numeric_str(a).is_none() || numeric_str(b).is_none() {
            return Ok(a.cmp(b));
        }
    }
    if matches!(left, Value::Bool(_)) || matches!(right, Value::Bool(_)) {
        return Ok(left.is_truthy().cmp(&right.is_truthy()));
    }
    match (number(left), number(right)) {
        (Some(a), Some(b)) => a
            .float()
            .partial_cmp(&b.float())
            .ok_or_else(|| "Cannot compare NaN".to_string()),
        _ => Ok(text(left)?.cmp(&text(right)?)),
    }
}

/// Apply a binary operator to evaluated operands.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let result = match op {
        BinaryOp::Concat => Value::String(text(left)? + &text(right)?),
        BinaryOp::Eq => Value::Bool(loose_eq(left, right)),
        BinaryOp::NotEq => Value::Bool(!loose_eq(left, right)),
        BinaryOp::Identical => Value::Bool(left == right),
        BinaryOp::NotIdentical => Value::Bool(left != right),
        BinaryOp::Lt => Value::Bool(compare(left, right)? == Ordering::Less),
        BinaryOp::Le => Value::Bool(compare(left, right)? != Ordering::Greater),
        BinaryOp::Gt => Value::Bool(compare(left, right)? == Ordering::Greater),
        BinaryOp::Ge => Value::Bool(compare(left, right)? != Ordering::Less),
        BinaryOp::And => Value::Bool(left.is_truthy() && right.is_truthy()),
        BinaryOp::Or => Value::Bool(left.is_truthy() || right.is_truthy()),
        _ => return arithmetic(op, left, right),
    };
    Ok(result)
}
