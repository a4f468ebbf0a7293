//! Render options, value preparation and output post-processing.

use qweb_expr::{Map, Value};
use qweb_template::{CALLER_CONTENT, CompileOptions, QWebError};
use qweb_traits::TemplateLoader;
use regex::Regex;
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, LazyLock};

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("BUG: invalid BLANK_LINES regex literal"));

/// Options for one render call.
#[derive(Clone, Default)]
pub struct RenderOptions {
    /// Merged over the engine's defaults: language and developer mode from the
    /// engine apply unless set here.
    pub compile: CompileOptions,
    /// Keep runs of blank lines instead of collapsing them.
    pub keep_empty_lines: bool,
    /// Loader used instead of the engine's for this render and its calls.
    pub load: Option<Arc<dyn TemplateLoader>>,
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("compile", &self.compile)
            .field("keep_empty_lines", &self.keep_empty_lines)
            .field("load", &self.load.as_ref().map(|l| l.name()))
            .finish()
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compile(mut self, compile: CompileOptions) -> Self {
        self.compile = compile;
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.compile.lang = Some(lang.into());
        self
    }

    pub fn with_keep_empty_lines(mut self, keep: bool) -> Self {
        self.keep_empty_lines = keep;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn TemplateLoader>) -> Self {
        self.load = Some(loader);
        self
    }
}

/// Checks caller values and seeds the ambient names.
///
/// # Errors
///
/// `QWebError::Values` when the caller defines the caller-content slot `0`, or
/// passes a module-like mapping (one with `__`-prefixed keys, which templates can
/// never reach).
pub fn prepare_values(mut values: Map, request: &Value) -> Result<Map, QWebError> {
    if values.contains_key(CALLER_CONTENT) {
        return Err(QWebError::values(
            "values must not define '0', it is reserved for the content of t-call",
        ));
    }
    for (name, value) in &values {
        if let Value::Map(inner) = value {
            if inner.keys().any(|key| key.starts_with("__")) {
                return Err(QWebError::values(format!(
                    "'{}' looks like a module; pass the values templates need instead",
                    name
                )));
            }
        }
    }
    values.entry("true".to_string()).or_insert(Value::Bool(true));
    values.entry("false".to_string()).or_insert(Value::Bool(false));
    values
        .entry("request".to_string())
        .or_insert_with(|| request.clone());
    Ok(values)
}

/// Collapses runs of blank lines to a single newline.
pub fn collapse_blank_lines(text: &str) -> Cow<'_, str> {
    BLANK_LINES.replace_all(text, "\n")
}

/// Applies the final output normalization of a render.
pub fn finish_output(text: String, keep_empty_lines: bool) -> String {
    if keep_empty_lines {
        return text;
    }
    match collapse_blank_lines(&text) {
        Cow::Borrowed(_) => text,
        Cow::Owned(collapsed) => collapsed,
    }
}
