//! The rendering engine: collaborators, configuration and the compiled cache.

use crate::cache::{CacheKey, TemplateCache};
use crate::config::EngineConfig;
use crate::loader::{TemplateId, load_template};
use crate::render::{RenderOptions, finish_output, prepare_values};
use crate::stream::{ChannelSink, RenderStream};
use qweb_expr::Map;
use qweb_template::{
    CompileOptions, CompiledTemplate, QWebError, RenderEnvironment, StringSink, compile, render,
};
use qweb_traits::{
    AllowAll, AssetResolver, AttributeHook, Converter, ConverterRegistry, InMemoryLoader,
    NoopHook, PermissionChecker, StaticAssetResolver, TemplateLoader,
};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Compiles and renders templates.
///
/// An engine is shared by concurrent renders: the cache and the developer-mode
/// set are behind locks, everything else is read-only after [`EngineBuilder::build`].
pub struct Engine {
    loader: Arc<dyn TemplateLoader>,
    converters: ConverterRegistry,
    assets: Arc<dyn AssetResolver>,
    permissions: Arc<dyn PermissionChecker>,
    hook: Arc<dyn AttributeHook>,
    config: EngineConfig,
    dev_mode: RwLock<BTreeSet<String>>,
    cache: TemplateCache,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("loader", &self.loader.name())
            .field("converters", &self.converters.len())
            .field("config", &self.config)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    pub fn dev_mode(&self) -> BTreeSet<String> {
        self.dev_mode.read().map(|d| d.clone()).unwrap_or_default()
    }

    /// Replaces the developer-mode tokens. A change drops every compiled template.
    pub fn set_dev_mode<I, S>(&self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: BTreeSet<String> = tokens.into_iter().map(Into::into).collect();
        let Ok(mut current) = self.dev_mode.write() else {
            return;
        };
        if *current != tokens {
            log::info!("developer mode changed to {:?}", tokens);
            *current = tokens;
            self.cache.clear();
        }
    }

    /// `requested` completed with the engine defaults.
    pub fn compile_options(&self, requested: &CompileOptions) -> CompileOptions {
        let mut options = requested.clone();
        if options.lang.is_none() {
            options.lang = self.config.default_lang.clone();
        }
        options.dev_mode.extend(self.dev_mode());
        options.strict |= self.config.strict;
        options
    }

    /// Returns the compiled template for `id`, from the cache when possible.
    ///
    /// Inline trees, renders with a loader override and `xml` developer mode
    /// always compile from source.
    pub fn compiled(
        &self,
        id: &TemplateId,
        options: &CompileOptions,
        load: Option<&dyn TemplateLoader>,
    ) -> Result<Arc<CompiledTemplate>, QWebError> {
        let cache_key = match id.key() {
            Some(key) if load.is_none() && !options.bypass_cache() => {
                Some(CacheKey::new(key, options))
            }
            _ => None,
        };
        if let Some(key) = &cache_key {
            if let Some(template) = self.cache.get(key) {
                log::trace!("cache hit for template '{}'", id);
                return Ok(template);
            }
        }

        let loader = match load {
            Some(loader) => loader,
            None => self.loader.as_ref(),
        };
        let loaded = load_template(loader, id, options.lang.as_deref())?;
        log::debug!("compiling template '{}' ({})", id, loaded.reference);
        let template = Arc::new(compile(&loaded.root, &loaded.reference, options)?);
        if let Some(key) = cache_key {
            self.cache.insert(key, Arc::clone(&template));
        }
        Ok(template)
    }

    /// Renders `id` with `values` and returns the whole output.
    ///
    /// # Errors
    ///
    /// `QWebError::Values` before any work when `values` defines `0`. Compile and
    /// render failures come back wrapped with the template reference and node path.
    pub fn render(
        &self,
        id: impl Into<TemplateId>,
        values: Map,
        options: &RenderOptions,
    ) -> Result<String, QWebError> {
        let id = id.into();
        let values = prepare_values(values, &self.config.request)?;
        let session = RenderSession::new(self, options.load.as_deref());
        let template = self.compiled(&id, &self.compile_options(&options.compile), session.load)?;

        let mut sink = StringSink::new();
        render(template, values, &session, &mut sink)?;
        Ok(finish_output(sink.into_string(), options.keep_empty_lines))
    }

    /// Starts rendering `id` on a blocking thread and returns its chunk stream.
    ///
    /// Must be called from within a tokio runtime. Value errors are returned
    /// immediately; compile and render errors come out of [`RenderStream::finish`]
    /// or [`RenderStream::collect`].
    pub fn render_stream(
        self: &Arc<Self>,
        id: impl Into<TemplateId>,
        values: Map,
        options: RenderOptions,
    ) -> Result<RenderStream, QWebError> {
        let id = id.into();
        let values = prepare_values(values, &self.config.request)?;
        let compile_options = self.compile_options(&options.compile);
        let keep_empty_lines = options.keep_empty_lines;
        let (tx, rx) = async_channel::bounded(self.config.stream_capacity);

        let engine = Arc::clone(self);
        let task = tokio::task::spawn_blocking(move || {
            let session = RenderSession::new(&engine, options.load.as_deref());
            let template = engine.compiled(&id, &compile_options, session.load)?;
            let mut sink = ChannelSink::new(tx);
            render(template, values, &session, &mut sink)
        });
        Ok(RenderStream::new(rx, task, keep_empty_lines))
    }
}

/// The engine as seen by one render: calls resolve through the render's loader
/// override when there is one.
struct RenderSession<'e> {
    engine: &'e Engine,
    load: Option<&'e dyn TemplateLoader>,
}

impl<'e> RenderSession<'e> {
    fn new(engine: &'e Engine, load: Option<&'e dyn TemplateLoader>) -> Self {
        Self { engine, load }
    }
}

impl RenderEnvironment for RenderSession<'_> {
    fn template(
        &self,
        name: &str,
        options: &CompileOptions,
    ) -> Result<Arc<CompiledTemplate>, QWebError> {
        self.engine
            .compiled(&TemplateId::parse(name), options, self.load)
    }

    fn converters(&self) -> &ConverterRegistry {
        &self.engine.converters
    }

    fn permissions(&self) -> &dyn PermissionChecker {
        self.engine.permissions.as_ref()
    }

    fn assets(&self) -> &dyn AssetResolver {
        self.engine.assets.as_ref()
    }

    fn attribute_hook(&self) -> &dyn AttributeHook {
        self.engine.hook.as_ref()
    }
}

/// Wires the collaborators of an [`Engine`].
///
/// Anything not set falls back to an empty in-memory loader, the builtin
/// converters, an empty asset resolver, [`AllowAll`] permissions and no
/// attribute hook.
pub struct EngineBuilder {
    loader: Option<Arc<dyn TemplateLoader>>,
    converters: ConverterRegistry,
    assets: Option<Arc<dyn AssetResolver>>,
    permissions: Option<Arc<dyn PermissionChecker>>,
    hook: Option<Arc<dyn AttributeHook>>,
    config: EngineConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            loader: None,
            converters: ConverterRegistry::with_builtins(),
            assets: None,
            permissions: None,
            hook: None,
            config: EngineConfig::default(),
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loader(mut self, loader: Arc<dyn TemplateLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Replaces the whole converter registry.
    pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = converters;
        self
    }

    /// Adds (or replaces) one converter, registered under `type_name`.
    pub fn with_converter(
        mut self,
        type_name: impl Into<String>,
        converter: Arc<dyn Converter>,
    ) -> Self {
        self.converters.register(type_name, converter);
        self
    }

    pub fn with_assets(mut self, assets: Arc<dyn AssetResolver>) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionChecker>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn with_attribute_hook(mut self, hook: Arc<dyn AttributeHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Engine {
        let dev_mode = RwLock::new(self.config.dev_mode.clone());
        Engine {
            loader: self
                .loader
                .unwrap_or_else(|| Arc::new(InMemoryLoader::new())),
            converters: self.converters,
            assets: self
                .assets
                .unwrap_or_else(|| Arc::new(StaticAssetResolver::new())),
            permissions: self.permissions.unwrap_or_else(|| Arc::new(AllowAll)),
            hook: self.hook.unwrap_or_else(|| Arc::new(NoopHook)),
            config: self.config,
            dev_mode,
            cache: TemplateCache::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qweb_expr::Value;

    fn engine_with(templates: &[(&str, &str)]) -> Engine {
        let loader = InMemoryLoader::new();
        for (name, source) in templates {
            loader.add(*name, *source).unwrap();
        }
        Engine::builder().with_loader(Arc::new(loader)).build()
    }

    #[test]
    fn test_compiled_templates_are_cached_per_language() {
        let engine = engine_with(&[("t", "<p>x</p>")]);
        let options = CompileOptions::default();
        let first = engine.compiled(&"t".into(), &options, None).unwrap();
        let second = engine.compiled(&"t".into(), &options, None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        engine
            .compiled(&"t".into(), &options.with_lang(Some("fr_FR".into())), None)
            .unwrap();
        assert_eq!(engine.cache().len(), 2);
    }

    #[test]
    fn test_xml_dev_mode_bypasses_the_cache() {
        let engine = engine_with(&[("t", "<p>x</p>")]);
        engine.compiled(&"t".into(), &CompileOptions::default(), None).unwrap();
        assert_eq!(engine.cache().len(), 1);

        engine.set_dev_mode(["xml"]);
        assert!(engine.cache().is_empty());
        let options = engine.compile_options(&CompileOptions::default());
        engine.compiled(&"t".into(), &options, None).unwrap();
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn test_per_render_qweb_dev_mode_compiles_debug_nodes() {
        use qweb_template::Instruction;

        let engine = engine_with(&[("t", r#"<p t-debug=""/>"#)]);
        let has_debug = |template: &CompiledTemplate| {
            template
                .body
                .iter()
                .any(|i| matches!(i, Instruction::Debug { .. }))
        };
        let plain = engine.compiled(&"t".into(), &CompileOptions::default(), None).unwrap();
        assert!(!has_debug(&plain));

        let mut debug = CompileOptions::default();
        debug.dev_mode.insert("qweb".into());
        let debugged = engine.compiled(&"t".into(), &debug, None).unwrap();
        assert!(has_debug(&debugged));
        assert_eq!(engine.cache().len(), 2);
    }

    #[test]
    fn test_engine_defaults_fill_compile_options() {
        let config = EngineConfig {
            default_lang: Some("nl_NL".into()),
            strict: true,
            ..Default::default()
        };
        let engine = Engine::builder().with_config(config).build();
        let options = engine.compile_options(&CompileOptions::default());
        assert_eq!(options.lang.as_deref(), Some("nl_NL"));
        assert!(options.strict);
        let explicit = engine.compile_options(&CompileOptions::default().with_lang(Some("de_DE".into())));
        assert_eq!(explicit.lang.as_deref(), Some("de_DE"));
    }

    #[test]
    fn test_request_is_seeded_from_config() {
        let config = EngineConfig {
            request: Value::from("req"),
            ..Default::default()
        };
        let loader = InMemoryLoader::new();
        loader.add("t", r#"<t t-esc="request"/>"#).unwrap();
        let engine = Engine::builder()
            .with_loader(Arc::new(loader))
            .with_config(config)
            .build();
        assert_eq!(engine.render("t", Map::new(), &RenderOptions::new()).unwrap(), "req");
    }
}
