//! Lenient YAML engine.
//!
//! Loads the practical YAML subset used by configuration files (block and
//! flow collections, anchors and aliases, comments, literal and folded
//! block scalars) into a [`Value`] tree, and dumps trees back to text.
//!
//! Loading never fails on malformed structure: the loader always returns
//! a best-effort tree. Only reading a file can fail.
//!
//! ```
//! use libportal::{yaml, Value};
//!
//! let doc = yaml::parse("title: Portal\nlinks: [mail, news]\n");
//! assert_eq!(doc.lookup("links.1"), Some(&Value::from("news")));
//! ```

mod dump;
mod parser;
mod scalar;
mod scanner;

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{YamlError, YamlResult};
use crate::value::Value;

pub use dump::{dump, dump_with_options, DumpOptions};
pub use scalar::to_type;

/// Parse YAML text. Empty input yields an empty mapping.
pub fn parse(text: &str) -> Value {
    parser::load_str(text)
}

/// Read and parse a YAML file.
pub fn parse_file(path: impl AsRef<Path>) -> YamlResult<Value> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| YamlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse(&text))
}

/// Parse `input` as a file path when it has no newline and names an
/// existing file, otherwise as YAML text.
pub fn load(input: &str) -> YamlResult<Value> {
    if !input.is_empty() && !input.contains('\n') && Path::new(input).is_file() {
        debug!(path = input, "loading YAML from file");
        return parse_file(input);
    }
    Ok(parse(input))
}
