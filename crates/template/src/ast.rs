//! The instruction list a template compiles to.

use crate::options::CompileOptions;
use qweb_expr::{CompiledExpr, FormatString};

/// Index into a compiled template's node table.
pub type NodeId = usize;

/// Where a node came from, for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub path: String,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// `t-out`: escape unless the value is markup.
    Out,
    /// `t-esc`: always escape.
    Esc,
    /// `t-raw`: never escape.
    Raw,
}

#[derive(Debug, Clone)]
pub enum OutputSource {
    Expr(CompiledExpr),
    /// `t-field="record.field"`.
    Field {
        record: CompiledExpr,
        field: String,
        expression: String,
    },
    /// `t-out="0"`: content rendered by the caller of a `t-call`.
    CallerContent,
}

/// `t-options` plus any `t-options-<key>` attributes.
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    pub base: Option<CompiledExpr>,
    pub keys: Vec<(String, CompiledExpr)>,
}

impl OutputOptions {
    pub fn is_empty(&self) -> bool {
        self.base.is_none() && self.keys.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum DynamicAttribute {
    /// `t-att-name="expr"`.
    Expr { name: String, value: CompiledExpr },
    /// `t-attf-name="text {{ expr }}"`.
    Format { name: String, value: FormatString },
    /// `t-att="expr"` producing a mapping or name/value pairs.
    Bulk(CompiledExpr),
}

/// An element whose start tag is assembled at render time.
#[derive(Debug, Clone)]
pub struct TagTemplate {
    pub tag: String,
    /// Static attributes, already escaped for output.
    pub attributes: Vec<(String, String)>,
    pub dynamic: Vec<DynamicAttribute>,
    pub self_close: bool,
}

#[derive(Debug, Clone)]
pub enum SetSource {
    Value(CompiledExpr),
    Format(FormatString),
    /// Rendered children, stored as markup.
    Body(Vec<Instruction>),
}

#[derive(Debug, Clone)]
pub struct Branch {
    pub node: NodeId,
    pub condition: CompiledExpr,
    pub body: Vec<Instruction>,
}

#[derive(Debug, Clone)]
pub enum Instruction {
    Text(String),
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Instruction>>,
    },
    ForEach {
        node: NodeId,
        iterable: CompiledExpr,
        var: String,
        body: Vec<Instruction>,
    },
    Output {
        node: NodeId,
        source: OutputSource,
        mode: OutputMode,
        options: OutputOptions,
        /// `None` for `<t>` elements, which only output their content.
        tag: Option<TagTemplate>,
        fallback: Vec<Instruction>,
    },
    Tag {
        node: NodeId,
        tag: TagTemplate,
        body: Vec<Instruction>,
    },
    Call {
        node: NodeId,
        template: FormatString,
        options: OutputOptions,
        body: Vec<Instruction>,
    },
    Set {
        node: NodeId,
        name: String,
        source: SetSource,
    },
    Groups {
        node: NodeId,
        groups: String,
        body: Vec<Instruction>,
    },
    Debug {
        node: NodeId,
    },
    CallAssets {
        node: NodeId,
        bundle: FormatString,
        css: Option<CompiledExpr>,
        js: Option<CompiledExpr>,
    },
}

impl Instruction {
    pub fn is_static(&self) -> bool {
        matches!(self, Instruction::Text(_))
    }
}

/// A compiled template: instructions plus what is needed to report errors.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    pub reference: String,
    pub options: CompileOptions,
    pub body: Vec<Instruction>,
    pub nodes: Vec<NodeInfo>,
}

impl CompiledTemplate {
    pub fn node(&self, id: NodeId) -> Option<&NodeInfo> {
        self.nodes.get(id)
    }

    /// True when rendering only ever writes fixed text.
    pub fn is_static(&self) -> bool {
        self.body.iter().all(Instruction::is_static)
    }
}
