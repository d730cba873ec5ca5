//! Compiled templates and the renderer.
//!
//! A [`Template`] is immutable and cheap to clone: the compiled program is
//! shared, and everything a render call mutates (output buffer, variable
//! scope, captured blocks, inheritance target) lives in a [`Renderer`]
//! created for that call. The same template can therefore be rendered
//! concurrently from several threads.
//!
//! # Inheritance
//!
//! `inherit("base")` marks the rendering template as a child. From then on
//! every `[: block NAME :]` it reaches is captured instead of emitted. When
//! the child body finishes, the parent is rendered with the captured
//! blocks as overrides and its output becomes the result. A parent that
//! itself inherits repeats the protocol, so the overrides of the most
//! derived template win at every level.

use std::collections::HashMap;
use std::sync::Arc;

use super::engine::Engine;
use super::expr::{binary, text, Expr};
use super::helpers::escape_html;
use super::parser::Node;
use crate::error::{SourceContext, TemplateError, TemplateResult};
use crate::value::{Mapping, Value};

/// Include and inherit chains deeper than this are reported as errors.
const MAX_DEPTH: usize = 64;

/// Block name to rendered content.
type Blocks = HashMap<String, String>;

/// Compiled form of one template source.
#[derive(Debug)]
pub(crate) struct Program {
    pub nodes: Vec<Node>,
    pub source: SourceContext,
    pub escape: bool,
}

/// A compiled template with its global bindings.
#[derive(Debug, Clone)]
pub struct Template {
    pub(crate) program: Arc<Program>,
    pub(crate) globals: Mapping,
    pub(crate) engine: Option<Engine>,
}

impl Template {
    /// Identity used in diagnostics.
    pub fn source(&self) -> &SourceContext {
        &self.program.source
    }

    /// Whether `{{ }}` output is HTML-escaped.
    pub fn auto_escape(&self) -> bool {
        self.program.escape
    }

    /// Global bindings visible to every render.
    pub fn globals(&self) -> &Mapping {
        &self.globals
    }

    /// Render with `locals` layered over the global bindings.
    ///
    /// Returns the complete output, or the first error; no partial output
    /// escapes a failed render.
    pub fn render(&self, locals: &Mapping) -> TemplateResult<String> {
        self.render_with(locals, Blocks::new(), 0)
    }

    fn render_with(&self, locals: &Mapping, overrides: Blocks, depth: usize) -> TemplateResult<String> {
        let mut scope = self.globals.clone();
        scope.extend(locals.iter().map(|(k, v)| (k.clone(), v.clone())));
        let inherited = scope.clone();

        let mut renderer = Renderer {
            template: self,
            scope,
            captured: overrides.clone(),
            overrides,
            parent: None,
            depth,
        };
        let mut out = String::new();
        renderer.exec(&self.program.nodes, &mut out)?;

        match renderer.parent {
            Some(parent) => parent.render_with(&inherited, renderer.captured, depth + 1),
            None => Ok(out),
        }
    }
}

/// Per-call render state.
struct Renderer<'t> {
    template: &'t Template,
    scope: Mapping,
    /// Blocks supplied by a child template.
    overrides: Blocks,
    /// Blocks handed on to the parent once this template has inherited.
    captured: Blocks,
    parent: Option<Template>,
    depth: usize,
}

impl<'t> Renderer<'t> {
    fn fault(&self, message: impl Into<String>, line: usize) -> TemplateError {
        TemplateError::render(message, &self.template.program.source, line)
    }

    fn eval(&self, expr: &Expr, line: usize) -> TemplateResult<Value> {
        expr.eval(&self.scope).map_err(|message| self.fault(message, line))
    }

    fn text(&self, value: &Value, line: usize) -> TemplateResult<String> {
        text(value).map_err(|message| self.fault(message, line))
    }

    fn exec(&mut self, nodes: &[Node], out: &mut String) -> TemplateResult<()> {
        for node in nodes {
            self.exec_node(node, out)?;
        }
        Ok(())
    }

    fn exec_node(&mut self, node: &Node, out: &mut String) -> TemplateResult<()> {
        match node {
            Node::Text(literal) => out.push_str(literal),
            Node::Emit { expr, escape, line } => {
                let value = self.eval(expr, *line)?;
                let s = self.text(&value, *line)?;
                if *escape {
                    out.push_str(&escape_html(&s));
                } else {
                    out.push_str(&s);
                }
            }
            Node::Echo { exprs, line } => {
                for expr in exprs {
                    let value = self.eval(expr, *line)?;
                    out.push_str(&self.text(&value, *line)?);
                }
            }
            Node::Set { name, op, expr, line } => {
                let value = self.eval(expr, *line)?;
                let value = match op {
                    None => value,
                    Some(op) => {
                        let current = self
                            .scope
                            .get(name)
                            .ok_or_else(|| self.fault(format!("Undefined variable ${}", name), *line))?;
                        binary(*op, current, &value).map_err(|message| self.fault(message, *line))?
                    }
                };
                self.scope.insert(name.clone(), value);
            }
            Node::If { branches, otherwise, line } => {
                for (cond, body) in branches {
                    if self.eval(cond, *line)?.is_truthy() {
                        return self.exec(body, out);
                    }
                }
                self.exec(otherwise, out)?;
            }
            Node::Foreach { subject, key, value, body, line } => {
                let pairs: Vec<(Value, Value)> = match self.eval(subject, *line)? {
                    Value::Sequence(items) => items
                        .into_iter()
                        .enumerate()
                        .map(|(i, item)| (Value::Integer(i as i64), item))
                        .collect(),
                    Value::Mapping(map) => map.into_iter().map(|(k, v)| (Value::String(k), v)).collect(),
                    other => {
                        return Err(self.fault(
                            format!("foreach expects a sequence or mapping, got a {}", other.type_name()),
                            *line,
                        ))
                    }
                };
                for (k, v) in pairs {
                    if let Some(key) = key {
                        self.scope.insert(key.clone(), k);
                    }
                    self.scope.insert(value.clone(), v);
                    self.exec(body, out)?;
                }
            }
            Node::Include { path, locals, line } => {
                let template = self.lookup("include", path, *line)?;
                let locals = match locals {
                    None => Mapping::new(),
                    Some(expr) => match self.eval(expr, *line)? {
                        Value::Mapping(map) => map,
                        Value::Null => Mapping::new(),
                        Value::Sequence(seq) if seq.is_empty() => Mapping::new(),
                        other => {
                            return Err(self.fault(
                                format!("include() locals must be a mapping, got a {}", other.type_name()),
                                *line,
                            ))
                        }
                    },
                };
                out.push_str(&template.render_with(&locals, Blocks::new(), self.depth + 1)?);
            }
            Node::Inherit { path, line } => {
                self.parent = Some(self.lookup("inherit", path, *line)?);
            }
            Node::Block { name, body, .. } => {
                let content = match self.overrides.get(name) {
                    Some(content) => content.clone(),
                    None => {
                        let mut buf = String::new();
                        self.exec(body, &mut buf)?;
                        buf
                    }
                };
                if self.parent.is_some() {
                    self.captured.entry(name.clone()).or_insert(content);
                } else {
                    out.push_str(&content);
                }
            }
        }
        Ok(())
    }

    /// Resolve the template named by an `include` or `inherit` argument.
    fn lookup(&self, directive: &str, path: &Expr, line: usize) -> TemplateResult<Template> {
        let Some(engine) = &self.template.engine else {
            return Err(self.fault(
                format!("{}() is not available in a template compiled from a string", directive),
                line,
            ));
        };
        if self.depth >= MAX_DEPTH {
            return Err(self.fault(
                format!("{}() nested more than {} levels deep", directive, MAX_DEPTH),
                line,
            ));
        }
        let path = self.eval(path, line)?;
        let path = self.text(&path, line)?;
        engine.get_template(&path, &Mapping::new(), Some(self.template.program.escape))
    }
}
