//! Options that influence how a template is compiled.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Developer-mode token enabling `t-debug`.
pub const DEV_QWEB: &str = "qweb";
/// Developer-mode token disabling the compiled template cache.
pub const DEV_XML: &str = "xml";

/// Compile options, frozen once compilation of a template starts.
///
/// Directive handlers only read these. The namespace map is copied into the
/// compiler's own namespace stack rather than mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    pub lang: Option<String>,
    pub inherit_branding: bool,
    pub inherit_branding_auto: bool,
    pub editable: bool,
    pub translatable: bool,
    pub edit_translations: bool,
    pub dev_mode: BTreeSet<String>,
    /// Fail as soon as a template needs anything but static output.
    pub raise_on_code: bool,
    /// Namespace prefixes declared outside the template.
    pub nsmap: BTreeMap<String, String>,
    /// Reference of the template whose `t-call` triggered this compilation.
    pub caller_template: Option<String>,
    pub website_id: Option<i64>,
    pub profile: bool,
    /// Undefined variables raise instead of reading as `None`.
    pub strict: bool,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lang(&self, lang: Option<String>) -> Self {
        Self {
            lang,
            ..self.clone()
        }
    }

    pub fn has_dev_mode(&self, token: &str) -> bool {
        self.dev_mode.contains(token)
    }

    /// `t-debug` is only compiled in `qweb` developer mode.
    pub fn debug_enabled(&self) -> bool {
        self.has_dev_mode(DEV_QWEB)
    }

    /// In `xml` developer mode every render recompiles from source.
    pub fn bypass_cache(&self) -> bool {
        self.has_dev_mode(DEV_XML)
    }

    /// Branding attributes are added to every `t-field`.
    pub fn branding(&self) -> bool {
        self.inherit_branding || self.inherit_branding_auto
    }
}
