//! Error types for YAML loading and template rendering.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for YAML engine operations.
pub type YamlResult<T> = std::result::Result<T, YamlError>;

/// Result type for template engine operations.
pub type TemplateResult<T> = std::result::Result<T, TemplateError>;

/// The YAML loader is lenient: malformed structure still yields a
/// best-effort tree, so only I/O can fail.
#[derive(Error, Debug)]
pub enum YamlError {
    /// The document file could not be read.
    #[error("Cannot read YAML file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Identity of a template, used in diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SourceContext {
    /// Template compiled from a file under an engine root.
    File(PathBuf),
    /// Template compiled directly from a string.
    Inline,
}

impl SourceContext {
    /// Format a location suffix for error messages.
    pub fn loc_suffix(&self, line: usize) -> String {
        format!(" at line {} of {}", line, self)
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceContext::File(path) => write!(f, "<{}>", path.display()),
            SourceContext::Inline => write!(f, "<string>"),
        }
    }
}

/// Error type for the template engine.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// The engine's template root does not exist or is not a directory.
    #[error("Template root {} not found or not a directory", .0.display())]
    RootNotFound(PathBuf),

    /// No template file exists for the requested path.
    #[error("Template {0} not found")]
    NotFound(String),

    /// The template file exists but could not be read.
    #[error("Template {path} could not be read: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The template source could not be compiled.
    #[error("Syntax error: {message}{location}")]
    Syntax { message: String, location: String },

    /// Evaluation failed while rendering.
    #[error("Render error: {message}{location}")]
    Render { message: String, location: String },
}

impl TemplateError {
    /// Create a compile error located in a template.
    pub fn syntax(message: impl Into<String>, ctx: &SourceContext, line: usize) -> Self {
        TemplateError::Syntax {
            message: message.into(),
            location: ctx.loc_suffix(line),
        }
    }

    /// Create a render error located in a template.
    pub fn render(message: impl Into<String>, ctx: &SourceContext, line: usize) -> Self {
        TemplateError::Render {
            message: message.into(),
            location: ctx.loc_suffix(line),
        }
    }

    /// Returns `true` for faults raised while evaluating a compiled template.
    pub fn is_render_error(&self) -> bool {
        matches!(self, TemplateError::Render { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_names_template_and_line() {
        let ctx = SourceContext::File(PathBuf::from("/srv/tpl/page.html"));
        let err = TemplateError::render("Undefined variable $name", &ctx, 12);
        assert_eq!(
            err.to_string(),
            "Render error: Undefined variable $name at line 12 of </srv/tpl/page.html>"
        );
    }

    #[test]
    fn test_inline_context_display() {
        let err = TemplateError::syntax("Unterminated \"{{\"", &SourceContext::Inline, 1);
        assert_eq!(
            err.to_string(),
            "Syntax error: Unterminated \"{{\" at line 1 of <string>"
        );
    }
}
