//! Portal core: a lenient YAML engine and a small inheriting template engine.
//!
//! The two engines share the [`Value`] tree but never call each other. A
//! host typically loads its configuration with [`yaml::load`] and hands
//! the resulting mapping to a [`template::Template`] as its variables.
//!
//! # YAML Pipeline
//!
//! 1. **Scanner**: Normalizes newlines, splits lines, measures indentation
//!    and collects literal (`|`) and folded (`>`) block scalars.
//!
//! 2. **Line Parser**: Classifies each line (mapping entry, sequence item,
//!    mapped sequence, plain array) and attaches it to the tree under the
//!    path implied by its indentation.
//!
//! 3. **Scalar Typing**: Turns scalar text into nulls, booleans, numbers,
//!    strings, and inline `[...]` / `{...}` collections.
//!
//! Loading is lenient: malformed input yields a best-effort tree.
//!
//! # Template Pipeline
//!
//! 1. **Lexer**: Splits source into text and directives (`{{ }}`, `[[ ]]`,
//!    `@` lines, `[: block :]`) and tokenizes the code inside them.
//!
//! 2. **Parser**: Builds a node tree of text, output, control flow,
//!    blocks, `include` and `inherit`.
//!
//! 3. **Renderer**: Walks the tree against a variable scope. Compiled
//!    templates are cached per engine and safe to render concurrently.

mod error;
pub mod template;
mod value;
pub mod yaml;

pub use error::{SourceContext, TemplateError, TemplateResult, YamlError, YamlResult};
pub use template::{compile_from_string, Engine, Template};
pub use value::{Mapping, Value};

/// Parse a YAML document from a string.
///
/// # Example
///
/// ```
/// use libportal::{parse_yaml, Value};
///
/// let value = parse_yaml("answer: 42");
/// assert_eq!(value.get("answer"), Some(&Value::Integer(42)));
/// ```
pub fn parse_yaml(input: &str) -> Value {
    yaml::parse(input)
}

/// Serialize a value tree as YAML with default options.
///
/// # Example
///
/// ```
/// use libportal::{dump_yaml, parse_yaml};
///
/// let value = parse_yaml("name: Portal");
/// assert_eq!(dump_yaml(&value), "---\nname: Portal\n");
/// ```
pub fn dump_yaml(value: &Value) -> String {
    yaml::dump(value)
}
