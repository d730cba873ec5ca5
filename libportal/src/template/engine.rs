//! Template lookup, compilation and caching.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use super::lexer::tokenize;
use super::parser::parse;
use super::render::{Program, Template};
use crate::error::{SourceContext, TemplateError, TemplateResult};
use crate::value::Mapping;

/// Compiled programs keyed by canonical path and escaping mode.
type Cache = RwLock<HashMap<(PathBuf, bool), Arc<Program>>>;

/// Loads templates from a root directory.
///
/// Cloning an engine is cheap; clones share the compiled-template cache.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
    auto_escape: bool,
}

struct Shared {
    root: PathBuf,
    globals: Mapping,
    locale: Option<String>,
    cache: Cache,
}

impl Engine {
    /// Create an engine for templates under `root`.
    ///
    /// `globals` are visible to every template; with a `locale`, a lookup of
    /// `page.html` prefers `page.html.<locale>` when that file exists.
    pub fn new(root: impl AsRef<Path>, globals: Mapping, locale: Option<&str>) -> TemplateResult<Self> {
        let root = root.as_ref();
        let not_found = || TemplateError::RootNotFound(root.to_path_buf());
        if !root.is_dir() {
            return Err(not_found());
        }
        let root = root.canonicalize().map_err(|_| not_found())?;

        Ok(Engine {
            shared: Arc::new(Shared {
                root,
                globals,
                locale: locale.filter(|l| !l.is_empty()).map(String::from),
                cache: RwLock::new(HashMap::new()),
            }),
            auto_escape: true,
        })
    }

    /// Set the default escaping mode for `{{ }}` output.
    pub fn with_auto_escape(mut self, auto_escape: bool) -> Self {
        self.auto_escape = auto_escape;
        self
    }

    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    pub fn locale(&self) -> Option<&str> {
        self.shared.locale.as_deref()
    }

    pub fn auto_escape(&self) -> bool {
        self.auto_escape
    }

    /// Look up a template relative to the root, compiling it on first use.
    ///
    /// `extra_globals` are layered over the engine globals for this
    /// template; `auto_escape` overrides the engine default.
    pub fn get_template(
        &self,
        path: &str,
        extra_globals: &Mapping,
        auto_escape: Option<bool>,
    ) -> TemplateResult<Template> {
        let escape = auto_escape.unwrap_or(self.auto_escape);
        let resolved = self.resolve(path)?;
        let program = self.program(path, resolved, escape)?;

        let mut globals = self.shared.globals.clone();
        globals.extend(extra_globals.iter().map(|(k, v)| (k.clone(), v.clone())));

        Ok(Template {
            program,
            globals,
            engine: Some(self.clone()),
        })
    }

    /// Shorthand for [`Engine::get_template`] with no extra globals.
    pub fn template(&self, path: &str) -> TemplateResult<Template> {
        self.get_template(path, &Mapping::new(), None)
    }

    /// Number of compiled programs held in the cache.
    pub fn cached(&self) -> usize {
        self.shared
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Find the file for `path`, preferring the localized variant.
    ///
    /// Files that resolve outside the root are treated as missing.
    fn resolve(&self, path: &str) -> TemplateResult<PathBuf> {
        let relative = path.trim_start_matches('/');
        let not_found = || TemplateError::NotFound(path.to_string());
        if relative.is_empty() {
            return Err(not_found());
        }

        if let Some(locale) = &self.shared.locale {
            if let Some(file) = self.within_root(&format!("{}.{}", relative, locale)) {
                return Ok(file);
            }
            debug!(path, locale = locale.as_str(), "no localized template, using default");
        }

        self.within_root(relative).ok_or_else(not_found)
    }

    fn within_root(&self, relative: &str) -> Option<PathBuf> {
        let file = self.shared.root.join(relative);
        if !file.is_file() {
            return None;
        }
        let file = file.canonicalize().ok()?;
        if !file.starts_with(&self.shared.root) {
            warn!(path = relative, "template path escapes the template root");
            return None;
        }
        Some(file)
    }

    fn program(&self, path: &str, file: PathBuf, escape: bool) -> TemplateResult<Arc<Program>> {
        let key = (file, escape);
        if let Some(program) = self
            .shared
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            debug!(path, "template cache hit");
            return Ok(Arc::clone(program));
        }

        debug!(path, file = %key.0.display(), "template cache miss");
        let text = fs::read_to_string(&key.0).map_err(|source| TemplateError::Unreadable {
            path: path.to_string(),
            source,
        })?;
        let program = Arc::new(compile(&text, SourceContext::File(key.0.clone()), escape)?);

        let mut cache = self.shared.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(key).or_insert(program)))
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("root", &self.shared.root)
            .field("locale", &self.shared.locale)
            .field("auto_escape", &self.auto_escape)
            .finish()
    }
}

pub(crate) fn compile(text: &str, source: SourceContext, escape: bool) -> TemplateResult<Program> {
    let tokens = tokenize(text, &source)?;
    let nodes = parse(tokens, &source, escape)?;
    Ok(Program {
        nodes,
        source,
        escape,
    })
}

/// Compile a template directly from text.
///
/// The result has no engine behind it: it is never cached, and `include`
/// or `inherit` inside it fail at render time.
pub fn compile_from_string(text: &str, auto_escape: bool) -> TemplateResult<Template> {
    Ok(Template {
        program: Arc::new(compile(text, SourceContext::Inline, auto_escape)?),
        globals: Mapping::new(),
        engine: None,
    })
}
