//! Instruction interpreter.
//!
//! [`Executor`] walks the instruction list of a [`CompiledTemplate`] against a
//! values container and writes text chunks into an [`OutputSink`], in document
//! order.
//!
//! # Execution Model
//!
//! - **Scope**: a stack of value frames. The bottom frame holds the render values;
//!   loops push a frame so their variables disappear when the loop ends
//! - **Calls**: `t-call` renders the callee with a flattened copy of the scope, so
//!   nothing the callee sets is visible to the caller afterwards
//! - **Collaborators**: templates, converters, permissions, assets and the attribute
//!   hook come from the [`RenderEnvironment`]
//!
//! # Error Handling
//!
//! The first error raised under a node is wrapped into [`QWebError::Render`] with the
//! template reference, node path and line. Errors that are already wrapped (for
//! example coming out of a called template) pass through unchanged.

use crate::ast::{CompiledTemplate, Instruction, NodeId};
use crate::error::QWebError;
use crate::options::CompileOptions;
use crate::output::OutputSink;
use qweb_expr::{CompiledExpr, Map, Value, VariableScope};
use qweb_traits::{AssetResolver, AttributeHook, ConverterRegistry, PermissionChecker};
use std::sync::Arc;
use std::time::Instant;

/// Nested `t-call`s deeper than this abort the render.
pub const MAX_CALL_DEPTH: usize = 50;

/// What a render needs from the engine hosting it.
pub trait RenderEnvironment: Send + Sync {
    /// Returns the compiled template for `name` under `options`.
    fn template(
        &self,
        name: &str,
        options: &CompileOptions,
    ) -> Result<Arc<CompiledTemplate>, QWebError>;

    fn converters(&self) -> &ConverterRegistry;

    fn permissions(&self) -> &dyn PermissionChecker;

    fn assets(&self) -> &dyn AssetResolver;

    fn attribute_hook(&self) -> &dyn AttributeHook;
}

/// The values visible to expressions, as a stack of frames.
#[derive(Debug, Clone)]
pub struct Scope {
    frames: Vec<Map>,
}

impl Scope {
    pub fn new(values: Map) -> Self {
        Self {
            frames: vec![values],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(Map::new());
    }

    /// Drops the innermost frame. The bottom frame is never removed.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Binds `name` in the innermost frame.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value.into());
        }
    }

    /// One map holding every visible binding, inner frames winning.
    pub fn flatten(&self) -> Map {
        let mut values = Map::new();
        for frame in &self.frames {
            for (name, value) in frame {
                values.insert(name.clone(), value.clone());
            }
        }
        values
    }
}

impl VariableScope for Scope {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .cloned()
    }

    fn assign(&mut self, name: &str, value: Value) {
        self.set(name, value);
    }

    fn names(&self) -> Vec<String> {
        self.flatten().keys().cloned().collect()
    }
}

pub struct Executor<'e> {
    pub(crate) env: &'e dyn RenderEnvironment,
    pub(crate) template: Arc<CompiledTemplate>,
    pub(crate) scope: Scope,
    pub(crate) depth: usize,
}

impl<'e> Executor<'e> {
    pub fn new(env: &'e dyn RenderEnvironment, template: Arc<CompiledTemplate>, values: Map) -> Self {
        Self {
            env,
            template,
            scope: Scope::new(values),
            depth: 0,
        }
    }

    /// An executor for a template called from this one.
    pub(crate) fn nested(&self, template: Arc<CompiledTemplate>, values: Map) -> Self {
        Self {
            env: self.env,
            template,
            scope: Scope::new(values),
            depth: self.depth + 1,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Renders the whole template into `sink`.
    pub fn run(&mut self, sink: &mut dyn OutputSink) -> Result<(), QWebError> {
        let template = Arc::clone(&self.template);
        let started = template.options.profile.then(Instant::now);
        self.execute(&template.body, sink)?;
        if let Some(started) = started {
            log::debug!(
                "Rendered template '{}' in {:?}",
                template.reference,
                started.elapsed()
            );
        }
        Ok(())
    }

    pub(crate) fn execute(
        &mut self,
        body: &[Instruction],
        sink: &mut dyn OutputSink,
    ) -> Result<(), QWebError> {
        for instruction in body {
            self.execute_instruction(instruction, sink)?;
        }
        Ok(())
    }

    fn execute_instruction(
        &mut self,
        instruction: &Instruction,
        sink: &mut dyn OutputSink,
    ) -> Result<(), QWebError> {
        match instruction {
            Instruction::Text(text) => {
                log::trace!("chunk of {} bytes", text.len());
                sink.write(text)
            }
            Instruction::If {
                branches,
                otherwise,
            } => self.handle_if(branches, otherwise.as_deref(), sink),
            Instruction::ForEach {
                node,
                iterable,
                var,
                body,
            } => self.at(*node, |this| this.handle_foreach(iterable, var, body, sink)),
            Instruction::Output {
                node,
                source,
                mode,
                options,
                tag,
                fallback,
            } => self.at(*node, |this| {
                this.handle_output(source, *mode, options, tag.as_ref(), fallback, sink)
            }),
            Instruction::Tag { node, tag, body } => {
                self.at(*node, |this| this.handle_tag(tag, body, sink))
            }
            Instruction::Call {
                node,
                template,
                options,
                body,
            } => self.at(*node, |this| this.handle_call(template, options, body, sink)),
            Instruction::Set { node, name, source } => {
                self.at(*node, |this| this.handle_set(name, source))
            }
            Instruction::Groups { node, groups, body } => {
                self.at(*node, |this| this.handle_groups(groups, body, sink))
            }
            Instruction::Debug { node } => {
                self.handle_debug(*node);
                Ok(())
            }
            Instruction::CallAssets {
                node,
                bundle,
                css,
                js,
            } => self.at(*node, |this| {
                this.handle_call_assets(bundle, css.as_ref(), js.as_ref(), sink)
            }),
        }
    }

    /// Runs `f`, attributing an unwrapped error to `node`.
    pub(crate) fn at<R>(
        &mut self,
        node: NodeId,
        f: impl FnOnce(&mut Self) -> Result<R, QWebError>,
    ) -> Result<R, QWebError> {
        f(self).map_err(|err| self.wrap(node, err))
    }

    fn wrap(&self, node: NodeId, err: QWebError) -> QWebError {
        if err.is_wrapped() {
            return err;
        }
        let (path, line) = self
            .template
            .node(node)
            .map(|info| (info.path.clone(), info.line))
            .unwrap_or_default();
        QWebError::Render {
            reference: self.template.reference.clone(),
            path,
            line,
            source: Box::new(err),
        }
    }

    pub(crate) fn eval(&mut self, expr: &CompiledExpr) -> Result<Value, QWebError> {
        Ok(expr.evaluate(&mut self.scope)?)
    }
}

/// Renders `template` with `values` into `sink`.
pub fn render(
    template: Arc<CompiledTemplate>,
    values: Map,
    env: &dyn RenderEnvironment,
    sink: &mut dyn OutputSink,
) -> Result<(), QWebError> {
    Executor::new(env, template, values).run(sink)
}
