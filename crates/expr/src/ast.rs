//! Expression AST types.
//!
//! The parser produces [`Expr::Name`] for every bare identifier. Safety lowering
//! replaces those with [`Expr::Var`], [`Expr::Local`] or [`Expr::Global`]; a lowered
//! tree never contains `Name`.

use crate::functions::Builtin;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    NotIn,
    Is,
    IsNot,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Name(String),
    /// A lookup in the render values container.
    Var {
        name: String,
        strict: bool,
    },
    /// A lambda parameter.
    Local(String),
    Global(Builtin),
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Attribute {
        target: Box<Expr>,
        name: String,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Lambda {
        params: Vec<String>,
        body: Arc<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
}

impl Expr {
    pub fn str(text: impl Into<String>) -> Self {
        Expr::Literal(Literal::Str(text.into()))
    }

    /// The string value of a string literal.
    pub fn as_str_literal(&self) -> Option<&str> {
        match self {
            Expr::Literal(Literal::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Collects the container variables read or written by the expression.
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            Expr::Var { name, .. } => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Expr::Literal(_) | Expr::Name(_) | Expr::Local(_) | Expr::Global(_) => {}
            Expr::List(items) => items.iter().for_each(|e| e.collect_variables(out)),
            Expr::Dict(entries) => {
                for (k, v) in entries {
                    k.collect_variables(out);
                    v.collect_variables(out);
                }
            }
            Expr::Attribute { target, .. } => target.collect_variables(out),
            Expr::Index { target, index } => {
                target.collect_variables(out);
                index.collect_variables(out);
            }
            Expr::Call { func, args, kwargs } => {
                func.collect_variables(out);
                args.iter().for_each(|e| e.collect_variables(out));
                kwargs.iter().for_each(|(_, e)| e.collect_variables(out));
            }
            Expr::Unary { expr, .. } => expr.collect_variables(out),
            Expr::Binary { left, right, .. } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                test.collect_variables(out);
                then.collect_variables(out);
                otherwise.collect_variables(out);
            }
            Expr::Lambda { body, .. } => body.collect_variables(out),
            Expr::Assign { target, value } => {
                target.collect_variables(out);
                value.collect_variables(out);
            }
        }
    }
}
