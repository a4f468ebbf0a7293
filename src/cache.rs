//! Compiled template cache.
//!
//! Compiled templates are shared by every render through an `Arc`. Inserting the
//! same key twice simply replaces the entry, so concurrent misses on one key are
//! harmless duplicate work.

use qweb_template::{CompileOptions, CompiledTemplate};
use qweb_traits::TemplateKey;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The template plus the compile options that change its compiled form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub template: TemplateKey,
    pub lang: Option<String>,
    pub inherit_branding: bool,
    pub inherit_branding_auto: bool,
    pub editable: bool,
    pub translatable: bool,
    pub edit_translations: bool,
    pub website_id: Option<i64>,
    pub profile: bool,
    pub raise_on_code: bool,
    pub strict: bool,
    pub debug: bool,
}

impl CacheKey {
    pub fn new(template: TemplateKey, options: &CompileOptions) -> Self {
        Self {
            template,
            lang: options.lang.clone(),
            inherit_branding: options.inherit_branding,
            inherit_branding_auto: options.inherit_branding_auto,
            editable: options.editable,
            translatable: options.translatable,
            edit_translations: options.edit_translations,
            website_id: options.website_id,
            profile: options.profile,
            raise_on_code: options.raise_on_code,
            strict: options.strict,
            debug: options.debug_enabled(),
        }
    }
}

#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: RwLock<HashMap<CacheKey, Arc<CompiledTemplate>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` on a miss or if the lock is poisoned.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CompiledTemplate>> {
        self.entries.read().ok()?.get(key).cloned()
    }

    /// Stores `template` under `key`. A poisoned lock leaves the cache unchanged.
    pub fn insert(&self, key: CacheKey, template: Arc<CompiledTemplate>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key, template);
        }
    }

    /// Drops every compiled template.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            log::debug!("clearing {} compiled templates", entries.len());
            entries.clear();
        }
    }

    /// Returns 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns `true` if the lock is poisoned (safe default).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qweb_template::compile_str;

    fn compiled() -> Arc<CompiledTemplate> {
        Arc::new(compile_str("<p>x</p>", "t", &CompileOptions::default()).unwrap())
    }

    #[test]
    fn test_key_ignores_options_that_do_not_change_output() {
        let name = TemplateKey::Name("t".into());
        let base = CompileOptions::default();
        let mut called = base.clone();
        called.caller_template = Some("caller".into());
        called.dev_mode.insert("assets".into());
        assert_eq!(CacheKey::new(name.clone(), &base), CacheKey::new(name.clone(), &called));
        assert_ne!(
            CacheKey::new(name.clone(), &base),
            CacheKey::new(name, &base.with_lang(Some("fr_FR".into())))
        );
    }

    #[test]
    fn test_qweb_dev_mode_is_part_of_the_key() {
        let name = TemplateKey::Name("t".into());
        let base = CompileOptions::default();
        let mut debug = base.clone();
        debug.dev_mode.insert("qweb".into());
        assert_ne!(CacheKey::new(name.clone(), &base), CacheKey::new(name, &debug));
    }

    #[test]
    fn test_insert_is_idempotent() {
        let cache = TemplateCache::new();
        let key = CacheKey::new(TemplateKey::Id(1), &CompileOptions::default());
        cache.insert(key.clone(), compiled());
        cache.insert(key.clone(), compiled());
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key).is_some());
        cache.clear();
        assert!(cache.is_empty());
    }
}
