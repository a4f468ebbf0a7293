//! # qweb-template
//!
//! Directive compiler and interpreter for QWeb templates.
//!
//! A template is an XML tree whose `t-*` attributes (directives) drive rendering:
//! conditionals, loops, variable assignment, escaped or raw output, record fields,
//! dynamic attributes and calls to other templates.
//!
//! ## Architecture
//!
//! The crate follows a **Compiler-Executor** architecture:
//!
//! 1. **Compilation** ([`Compiler`]): walks the parsed tree once and produces a
//!    [`CompiledTemplate`], a typed instruction list. Every expression is rewritten
//!    and safety-checked here, so a template that compiles never evaluates
//!    anything outside its values container.
//! 2. **Execution** ([`Executor`]): interprets the instructions against render values
//!    and writes text chunks into an [`OutputSink`], asking a [`RenderEnvironment`]
//!    for called templates and collaborators.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use qweb_template::{compile_str, render, CompileOptions, StringSink};
//!
//! let template = compile_str(r#"<p t-esc="name"/>"#, "hello", &CompileOptions::default())?;
//! let mut sink = StringSink::new();
//! render(Arc::new(template), values, &env, &mut sink)?;
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CompileOptions`] | Frozen options a template is compiled with |
//! | [`Instruction`] | One step of a compiled template |
//! | [`Directive`] | The closed set of directives, in evaluation order |
//! | [`QWebError`] | Structured compile and render errors |

pub mod ast;
pub mod compiler;
pub mod error;
pub mod executor;
pub mod options;
pub mod output;
pub mod xml;

mod compiler_handlers;
mod executor_handlers;

pub use ast::{CompiledTemplate, Instruction, NodeId, NodeInfo, OutputMode};
pub use compiler::{CompileContext, Compiler, NamespaceStack, compile, compile_str};
pub use compiler_handlers::output::CALLER_CONTENT;
pub use compiler_handlers::{Directive, EVAL_ORDER, directives_of};
pub use error::QWebError;
pub use executor::{Executor, MAX_CALL_DEPTH, RenderEnvironment, Scope, render};
pub use options::{CompileOptions, DEV_QWEB, DEV_XML};
pub use output::{OutputSink, StringSink};
pub use xml::{Element, Node};


#[cfg(test)]
pub(crate) mod test_helpers {
    use crate::ast::CompiledTemplate;
    use crate::compiler::compile_str;
    use crate::error::QWebError;
    use crate::executor::{RenderEnvironment, render};
    use crate::options::CompileOptions;
    use crate::output::StringSink;
    use qweb_expr::Map;
    use qweb_traits::{
        AssetResolver, AttributeHook, ConverterRegistry, NoopHook, PermissionChecker,
        StaticAssetResolver, StaticGroups,
    };
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Templates held as source and compiled on every lookup.
    #[derive(Debug)]
    pub struct TestEnv {
        pub sources: HashMap<String, String>,
        pub converters: ConverterRegistry,
        pub permissions: StaticGroups,
        pub assets: StaticAssetResolver,
        pub hook: Arc<dyn AttributeHook>,
        pub compiled_with: Mutex<Vec<(String, CompileOptions)>>,
    }

    impl TestEnv {
        pub fn new() -> Self {
            Self {
                sources: HashMap::new(),
                converters: ConverterRegistry::with_builtins(),
                permissions: StaticGroups::new(["base.group_user"]),
                assets: StaticAssetResolver::new(),
                hook: Arc::new(NoopHook),
                compiled_with: Mutex::new(Vec::new()),
            }
        }

        pub fn with(mut self, name: &str, source: &str) -> Self {
            self.sources.insert(name.to_string(), source.to_string());
            self
        }
    }

    impl RenderEnvironment for TestEnv {
        fn template(
            &self,
            name: &str,
            options: &CompileOptions,
        ) -> Result<Arc<CompiledTemplate>, QWebError> {
            let source = self
                .sources
                .get(name)
                .ok_or_else(|| QWebError::NotFound(name.to_string()))?;
            if let Ok(mut seen) = self.compiled_with.lock() {
                seen.push((name.to_string(), options.clone()));
            }
            compile_str(source, name, options).map(Arc::new)
        }

        fn converters(&self) -> &ConverterRegistry {
            &self.converters
        }

        fn permissions(&self) -> &dyn PermissionChecker {
            &self.permissions
        }

        fn assets(&self) -> &dyn AssetResolver {
            &self.assets
        }

        fn attribute_hook(&self) -> &dyn AttributeHook {
            self.hook.as_ref()
        }
    }

    pub fn render_with(
        env: &TestEnv,
        source: &str,
        options: &CompileOptions,
        values: Map,
    ) -> Result<String, QWebError> {
        let template = Arc::new(compile_str(source, "test", options)?);
        let mut sink = StringSink::new();
        render(template, values, env, &mut sink)?;
        Ok(sink.into_string())
    }

    pub fn render_source(source: &str, values: Map) -> Result<String, QWebError> {
        render_with(&TestEnv::new(), source, &CompileOptions::default(), values)
    }

    /// Builds render values from a JSON object literal.
    pub fn values(json: serde_json::Value) -> Map {
        match qweb_expr::Value::from(json) {
            qweb_expr::Value::Map(map) => map,
            _ => Map::new(),
        }
    }
}
