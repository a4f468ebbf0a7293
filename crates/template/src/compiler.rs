//! Directive compiler: turns a template tree into an instruction list.
//!
//! Compilation walks the tree depth-first. Static elements become literal text;
//! elements carrying directives are dispatched through the fixed directive order in
//! [`crate::compiler_handlers::EVAL_ORDER`], each handler compiling its part and
//! delegating the remaining directives of the element to the next one.
//!
//! # State
//!
//! - [`CompileContext`]: the frozen options and template reference, read-only
//! - [`NamespaceStack`]: prefixes declared by enclosing elements, pushed and popped
//!   around each element
//! - [`CompilerSession`]: the node table, owned by one top-level compilation

use crate::ast::{CompiledTemplate, Instruction, NodeId, NodeInfo};
use crate::compiler_handlers::{Directive, directives_of};
use crate::error::QWebError;
use crate::options::CompileOptions;
use crate::xml::{self, Element, Node, T_TAG};
use qweb_expr::{CompiledExpr, FormatString};

/// Read-only compilation inputs.
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    pub reference: &'a str,
    pub options: &'a CompileOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NsDecl {
    prefix: String,
    uri: String,
    /// Whether the declaration appears in the output.
    emitted: bool,
}

/// Namespace declarations in scope, one frame per enclosing element.
#[derive(Debug, Default)]
pub struct NamespaceStack {
    frames: Vec<Vec<NsDecl>>,
}

impl NamespaceStack {
    /// Starts from the options' namespace map. Those prefixes are never emitted by
    /// an enclosing element, so the first output element using one declares it.
    pub fn new(options: &CompileOptions) -> Self {
        let root = options
            .nsmap
            .iter()
            .map(|(prefix, uri)| NsDecl {
                prefix: prefix.clone(),
                uri: uri.clone(),
                emitted: false,
            })
            .collect();
        Self { frames: vec![root] }
    }

    fn push(&mut self, el: &Element) {
        let emitted = el.tag != T_TAG;
        let frame = el
            .attributes
            .iter()
            .filter_map(|(name, uri)| {
                let prefix = match name.as_str() {
                    "xmlns" => "",
                    other => other.strip_prefix("xmlns:")?,
                };
                Some(NsDecl {
                    prefix: prefix.to_string(),
                    uri: uri.clone(),
                    emitted,
                })
            })
            .collect();
        self.frames.push(frame);
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    fn lookup(&self, prefix: &str) -> Option<&NsDecl> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter())
            .find(|decl| decl.prefix == prefix)
    }

    /// Declarations an output element must carry because the element that declared
    /// them (a `<t>`, or the options) is not part of the output. Returned
    /// declarations count as emitted for the rest of the element's subtree.
    pub fn undeclared(&mut self, el: &Element) -> Vec<(String, String)> {
        let mut prefixes: Vec<&str> = Vec::new();
        let names = std::iter::once(el.tag.as_str()).chain(el.attributes.iter().map(|(k, _)| k.as_str()));
        for name in names {
            let Some((prefix, _)) = name.split_once(':') else {
                continue;
            };
            if prefix != "xmlns" && prefix != "t" && !prefixes.contains(&prefix) {
                prefixes.push(prefix);
            }
        }
        let mut declared = Vec::new();
        for prefix in prefixes {
            let Some(decl) = self.lookup(prefix) else {
                continue;
            };
            if decl.emitted {
                continue;
            }
            let decl = NsDecl {
                emitted: true,
                ..decl.clone()
            };
            declared.push((format!("xmlns:{}", decl.prefix), decl.uri.clone()));
            if let Some(frame) = self.frames.last_mut() {
                frame.push(decl);
            }
        }
        declared
    }
}

/// Mutable state owned by one top-level compilation.
#[derive(Debug, Default)]
pub struct CompilerSession {
    nodes: Vec<NodeInfo>,
    last_path: Option<String>,
}

impl CompilerSession {
    pub fn register(&mut self, path: &str, line: usize) -> NodeId {
        self.nodes.push(NodeInfo {
            path: path.to_string(),
            line,
        });
        self.nodes.len() - 1
    }

    /// Records the element being compiled, for the path of a compile error.
    pub fn enter(&mut self, path: &str) {
        self.last_path = Some(path.to_string());
    }
}

/// The element a handler is working on.
#[derive(Debug, Clone, Copy)]
pub struct NodeCtx<'e> {
    pub el: &'e Element,
    pub node: NodeId,
    pub path: &'e str,
}

/// `t-elif`/`t-else` siblings attached to a `t-if`.
pub type ElseChain<'e> = [(&'e Element, String)];

pub struct Compiler<'a> {
    pub(crate) ctx: CompileContext<'a>,
    pub(crate) namespaces: NamespaceStack,
    pub(crate) session: CompilerSession,
}

impl<'a> Compiler<'a> {
    pub fn new(ctx: CompileContext<'a>) -> Self {
        Self {
            namespaces: NamespaceStack::new(ctx.options),
            ctx,
            session: CompilerSession::default(),
        }
    }

    /// Compiles `root` into a template.
    pub fn compile(mut self, root: &Element) -> Result<CompiledTemplate, QWebError> {
        let path = format!("/{}", root.tag);
        match self.compile_element(root, &path, &[]) {
            Ok(body) => {
                log::debug!(
                    "Compiled template '{}' ({} instructions, {} dynamic nodes)",
                    self.ctx.reference,
                    body.len(),
                    self.session.nodes.len()
                );
                Ok(CompiledTemplate {
                    reference: self.ctx.reference.to_string(),
                    options: self.ctx.options.clone(),
                    body,
                    nodes: self.session.nodes,
                })
            }
            Err(err) => Err(QWebError::Compile {
                reference: self.ctx.reference.to_string(),
                path: self.session.last_path.clone(),
                options: Box::new(self.ctx.options.clone()),
                source: Box::new(err),
            }),
        }
    }

    pub(crate) fn with_namespaces<R>(&mut self, el: &Element, f: impl FnOnce(&mut Self) -> R) -> R {
        self.namespaces.push(el);
        let result = f(self);
        self.namespaces.pop();
        result
    }

    pub(crate) fn compile_element(
        &mut self,
        el: &Element,
        path: &str,
        chain: &ElseChain<'_>,
    ) -> Result<Vec<Instruction>, QWebError> {
        self.session.enter(path);
        self.with_namespaces(el, |this| {
            let directives = directives_of(el)?;
            if directives.iter().all(|d| matches!(d, Directive::Tag | Directive::Content))
                && el.tag != T_TAG
                && !has_dynamic_attributes(el)
            {
                return this.compile_static(el, path);
            }
            if this.ctx.options.raise_on_code
                && (has_dynamic_attributes(el)
                    || directives.iter().any(|d| !matches!(d, Directive::Tag | Directive::Content)))
            {
                return Err(QWebError::CodeFound(this.ctx.reference.to_string()));
            }
            let node = this.session.register(path, el.line);
            this.compile_directives(NodeCtx { el, node, path }, &directives, chain)
        })
    }

    /// Compiles an element after the directives already handled were removed.
    pub(crate) fn compile_directives(
        &mut self,
        node: NodeCtx<'_>,
        directives: &[Directive],
        chain: &ElseChain<'_>,
    ) -> Result<Vec<Instruction>, QWebError> {
        let Some((&first, rest)) = directives.split_first() else {
            return Ok(Vec::new());
        };
        match first {
            Directive::Debug => self.compile_debug(node, rest, chain),
            Directive::Groups => self.compile_groups(node, rest, chain),
            Directive::Foreach => self.compile_foreach(node, rest, chain),
            Directive::If => self.compile_if(node, rest, chain),
            Directive::Elif | Directive::Else => Err(QWebError::directive(format!(
                "'{}' must directly follow a t-if or t-elif element",
                first.attribute()
            ))),
            Directive::Field | Directive::Esc | Directive::Raw | Directive::Out => {
                self.compile_output(node, first)
            }
            Directive::Tag => self.compile_tag(node, rest),
            Directive::CallAssets => self.compile_call_assets(node),
            Directive::Call => self.compile_call(node),
            Directive::Set => self.compile_set(node),
            Directive::Content => self.compile_children(node.el, node.path),
        }
    }

    fn compile_static(&mut self, el: &Element, path: &str) -> Result<Vec<Instruction>, QWebError> {
        let attributes = self.static_attributes(el);
        let self_close = el.children.is_empty() && xml::is_void(&el.tag);
        let mut out = vec![Instruction::Text(xml::open_tag(&el.tag, &attributes, self_close))];
        if !self_close {
            push_all(&mut out, self.compile_children(el, path)?);
            push_text(&mut out, &xml::close_tag(&el.tag));
        }
        Ok(out)
    }

    /// Compiles the children of `el`, attaching `t-elif`/`t-else` siblings to the
    /// `t-if` they follow.
    pub(crate) fn compile_children(
        &mut self,
        el: &Element,
        path: &str,
    ) -> Result<Vec<Instruction>, QWebError> {
        let mut out = Vec::new();
        let mut index = 0;
        while index < el.children.len() {
            match &el.children[index] {
                Node::Text(text) => {
                    push_text(&mut out, &xml::escape_text(text));
                    index += 1;
                }
                Node::Element(child) => {
                    let child_path = child_path(el, index, path);
                    let mut next = index + 1;
                    let mut chain = Vec::new();
                    if child.has("t-if") {
                        next = self.collect_else_chain(el, next, path, &mut chain)?;
                    }
                    let compiled = self.compile_element(child, &child_path, &chain)?;
                    push_all(&mut out, compiled);
                    index = next;
                }
            }
        }
        Ok(out)
    }

    /// Gathers the `t-elif`/`t-else` elements following a `t-if` and returns the
    /// index of the first sibling that is not part of the chain.
    fn collect_else_chain<'e>(
        &mut self,
        parent: &'e Element,
        mut index: usize,
        path: &str,
        chain: &mut Vec<(&'e Element, String)>,
    ) -> Result<usize, QWebError> {
        loop {
            let mut probe = index;
            let mut text_between = false;
            while let Some(Node::Text(text)) = parent.children.get(probe) {
                text_between |= !text.trim().is_empty();
                probe += 1;
            }
            let Some(Node::Element(sibling)) = parent.children.get(probe) else {
                return Ok(index);
            };
            let is_else = sibling.has("t-else");
            if !is_else && !sibling.has("t-elif") {
                return Ok(index);
            }
            if text_between {
                return Err(QWebError::directive(format!(
                    "text is not allowed between a t-if/t-elif and its t-{} ({})",
                    if is_else { "else" } else { "elif" },
                    child_path(parent, probe, path)
                )));
            }
            chain.push((sibling, child_path(parent, probe, path)));
            index = probe + 1;
            if is_else {
                return Ok(index);
            }
        }
    }

    pub(crate) fn expr(&self, source: &str) -> Result<CompiledExpr, QWebError> {
        Ok(CompiledExpr::compile(source, self.ctx.options.strict)?)
    }

    pub(crate) fn format(&self, source: &str) -> Result<FormatString, QWebError> {
        Ok(FormatString::compile(source, self.ctx.options.strict)?)
    }
}

/// Compiles a parsed template tree.
pub fn compile(
    root: &Element,
    reference: &str,
    options: &CompileOptions,
) -> Result<CompiledTemplate, QWebError> {
    Compiler::new(CompileContext { reference, options }).compile(root)
}

/// Parses and compiles template source.
pub fn compile_str(
    source: &str,
    reference: &str,
    options: &CompileOptions,
) -> Result<CompiledTemplate, QWebError> {
    let root = xml::parse(source, reference)?;
    compile(&root, reference, options)
}

fn child_path(parent: &Element, index: usize, path: &str) -> String {
    match parent.child_segment(index) {
        Some(segment) => format!("{}/{}", path, segment),
        None => path.to_string(),
    }
}

/// Attributes consumed by the compiler and never written to the output.
pub(crate) fn is_directive_attribute(name: &str) -> bool {
    name.starts_with("t-") || name == "groups"
}

fn has_dynamic_attributes(el: &Element) -> bool {
    el.attributes
        .iter()
        .any(|(name, _)| name == "t-att" || name.starts_with("t-att-") || name.starts_with("t-attf-"))
}

/// Appends text, merging it into a preceding text instruction.
pub(crate) fn push_text(out: &mut Vec<Instruction>, text: &str) {
    if text.is_empty() {
        return;
    }
    match out.last_mut() {
        Some(Instruction::Text(existing)) => existing.push_str(text),
        _ => out.push(Instruction::Text(text.to_string())),
    }
}

pub(crate) fn push_all(out: &mut Vec<Instruction>, instructions: Vec<Instruction>) {
    for instruction in instructions {
        match instruction {
            Instruction::Text(text) => push_text(out, &text),
            other => out.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::OutputMode;

    fn compile_source(source: &str) -> Result<CompiledTemplate, QWebError> {
        compile_str(source, "test", &CompileOptions::default())
    }

    #[test]
    fn test_static_template_is_a_single_text() {
        let template = compile_source(r#"<div class="x"><p>Hi</p><br/></div>"#).unwrap();
        assert!(template.is_static());
        match template.body.as_slice() {
            [Instruction::Text(text)] => assert_eq!(text, r#"<div class="x"><p>Hi</p><br/></div>"#),
            other => panic!("unexpected body: {:?}", other),
        }
        assert!(template.nodes.is_empty());
    }

    #[test]
    fn test_if_else_chain_is_one_instruction() {
        let template = compile_source(
            r#"<div><span t-if="a">A</span> <span t-elif="b">B</span><span t-else="">C</span></div>"#,
        )
        .unwrap();
        let branches = template
            .body
            .iter()
            .find_map(|i| match i {
                Instruction::If { branches, otherwise } => Some((branches.len(), otherwise.is_some())),
                _ => None,
            })
            .unwrap();
        assert_eq!(branches, (2, true));
        assert_eq!(template.nodes[0].path, "/div/span[1]");
    }

    #[test]
    fn test_orphan_else_is_rejected() {
        let err = compile_source(r#"<div><span t-else="">C</span></div>"#).unwrap_err();
        let QWebError::Compile { path, source, .. } = err else {
            panic!("expected compile error");
        };
        assert_eq!(path.as_deref(), Some("/div/span"));
        assert!(matches!(*source, QWebError::Directive(_)));
    }

    #[test]
    fn test_error_in_elif_names_the_elif() {
        let err = compile_source(r#"<div><p t-if="a">A</p><p t-elif="b" t-bogus="">B</p></div>"#)
            .unwrap_err();
        match err {
            QWebError::Compile { path, source, .. } => {
                assert_eq!(path.as_deref(), Some("/div/p[2]"));
                assert!(matches!(*source, QWebError::Directive(_)));
            }
            other => panic!("expected compile error, got {:?}", other),
        }
    }

    #[test]
    fn test_text_between_if_and_else_is_rejected() {
        let err = compile_source(r#"<div><t t-if="a">A</t>oops<t t-else="">B</t></div>"#).unwrap_err();
        assert!(matches!(err.root_cause(), QWebError::Directive(m) if m.contains("text")));
    }

    #[test]
    fn test_esc_on_element() {
        let template = compile_source(r#"<li t-esc="n"/>"#).unwrap();
        match &template.body[0] {
            Instruction::Output { mode, tag, fallback, .. } => {
                assert_eq!(*mode, OutputMode::Esc);
                assert_eq!(tag.as_ref().map(|t| t.tag.as_str()), Some("li"));
                assert!(fallback.is_empty());
            }
            other => panic!("unexpected instruction: {:?}", other),
        }
    }

    #[test]
    fn test_namespace_declared_on_t_is_redeclared() {
        let template = compile_source(
            r#"<t xmlns:foo="urn:foo"><foo:bar><foo:baz/></foo:bar></t>"#,
        )
        .unwrap();
        match template.body.as_slice() {
            [Instruction::Text(text)] => {
                assert_eq!(text, r#"<foo:bar xmlns:foo="urn:foo"><foo:baz></foo:baz></foo:bar>"#)
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_raise_on_code() {
        let options = CompileOptions {
            raise_on_code: true,
            ..Default::default()
        };
        assert!(compile_str("<div>static</div>", "t", &options).is_ok());
        let err = compile_str(r#"<div t-esc="x"/>"#, "t", &options).unwrap_err();
        assert!(matches!(err.root_cause(), QWebError::CodeFound(_)));
    }

    #[test]
    fn test_unsafe_expression_fails_compilation() {
        let err = compile_source(r#"<t t-esc="x.__class__"/>"#).unwrap_err();
        assert!(matches!(err.root_cause(), QWebError::Unsafe(_)));
    }

    #[test]
    fn test_node_ids_do_not_leak_into_output() {
        let a = compile_source(r#"<div><t t-esc="x"/><t t-esc="y"/></div>"#).unwrap();
        let b = compile_source(r#"<div><t t-esc="x"/><t t-esc="y"/></div>"#).unwrap();
        assert_eq!(a.nodes, b.nodes);
    }
}
