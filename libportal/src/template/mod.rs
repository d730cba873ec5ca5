//! Template engine.
//!
//! Templates are text with four kinds of directives:
//!
//! | Directive | Meaning |
//! |-----------|---------|
//! | `{{ expr }}` | output, HTML-escaped unless auto-escape is off |
//! | `[[ statements ]]` | code; a newline right after `]]` is dropped |
//! | `@statement` | a whole line of code, producing no output |
//! | `[: block NAME :]` ... `[: endblock :]` | overridable region |
//!
//! Statements are `if`/`elseif`/`else`/`endif` (or brace form), `foreach`,
//! `echo`, `$var = expr`, `include(path, locals)` and `inherit(path)`.
//! Templates are compiled to a node tree once and rendered many times.
//!
//! ```
//! use libportal::template::compile_from_string;
//! use libportal::{Mapping, Value};
//!
//! let template = compile_from_string("Hello {{ $name }}!", true).unwrap();
//! let mut locals = Mapping::new();
//! locals.insert("name".to_string(), Value::from("<you>"));
//! assert_eq!(template.render(&locals).unwrap(), "Hello &lt;you&gt;!");
//! ```

mod engine;
mod expr;
mod helpers;
mod lexer;
mod parser;
mod render;

pub use engine::{compile_from_string, Engine};
pub use helpers::escape_html;
pub use render::Template;
