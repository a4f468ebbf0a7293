//! Control flow directives: t-debug, groups, t-foreach, t-if/t-elif/t-else.
//!
//! The `t-elif`/`t-else` siblings of a `t-if` travel down through the directives
//! applied before it, so `<li t-foreach="..." t-if="...">` keeps its else branch.

use super::{Directive, check_variable_name, directives_of};
use crate::ast::{Branch, Instruction};
use crate::compiler::{Compiler, ElseChain, NodeCtx};
use crate::error::QWebError;
use crate::xml::Element;

impl Compiler<'_> {
    pub(crate) fn compile_debug(
        &mut self,
        node: NodeCtx<'_>,
        rest: &[Directive],
        chain: &ElseChain<'_>,
    ) -> Result<Vec<Instruction>, QWebError> {
        let mut out = Vec::new();
        if self.ctx.options.debug_enabled() {
            out.push(Instruction::Debug { node: node.node });
        } else {
            log::warn!(
                "t-debug in '{}' at {} ignored outside of qweb developer mode",
                self.ctx.reference,
                node.path
            );
        }
        out.extend(self.compile_directives(node, rest, chain)?);
        Ok(out)
    }

    pub(crate) fn compile_groups(
        &mut self,
        node: NodeCtx<'_>,
        rest: &[Directive],
        chain: &ElseChain<'_>,
    ) -> Result<Vec<Instruction>, QWebError> {
        let groups = node
            .el
            .get("groups")
            .or_else(|| node.el.get("t-groups"))
            .unwrap_or_default()
            .to_string();
        let body = self.compile_directives(node, rest, chain)?;
        Ok(vec![Instruction::Groups {
            node: node.node,
            groups,
            body,
        }])
    }

    pub(crate) fn compile_foreach(
        &mut self,
        node: NodeCtx<'_>,
        rest: &[Directive],
        chain: &ElseChain<'_>,
    ) -> Result<Vec<Instruction>, QWebError> {
        let iterable = self.expr(node.el.get("t-foreach").unwrap_or_default())?;
        let var = node.el.get("t-as").unwrap_or_default().trim().to_string();
        check_variable_name(&var, "t-as")?;
        let body = self.compile_directives(node, rest, chain)?;
        Ok(vec![Instruction::ForEach {
            node: node.node,
            iterable,
            var,
            body,
        }])
    }

    /// Compiles a `t-if` and the `t-elif`/`t-else` siblings attached to it.
    pub(crate) fn compile_if(
        &mut self,
        node: NodeCtx<'_>,
        rest: &[Directive],
        chain: &ElseChain<'_>,
    ) -> Result<Vec<Instruction>, QWebError> {
        let condition = self.expr(node.el.get("t-if").unwrap_or_default())?;
        let body = self.compile_directives(node, rest, &[])?;
        let mut branches = vec![Branch {
            node: node.node,
            condition,
            body,
        }];
        let mut otherwise = None;

        for (sibling, path) in chain {
            let sibling: &Element = sibling;
            let compiled = self.with_namespaces(sibling, |this| {
                this.session.enter(path);
                let id = this.session.register(path, sibling.line);
                let directives: Vec<Directive> = directives_of(sibling)?
                    .into_iter()
                    .filter(|d| !matches!(d, Directive::Elif | Directive::Else))
                    .collect();
                let ctx = NodeCtx {
                    el: sibling,
                    node: id,
                    path,
                };
                let body = this.compile_directives(ctx, &directives, &[])?;
                Ok::<_, QWebError>((id, body))
            })?;
            match sibling.get("t-elif") {
                Some(test) => branches.push(Branch {
                    node: compiled.0,
                    condition: self.expr(test)?,
                    body: compiled.1,
                }),
                None => otherwise = Some(compiled.1),
            }
        }

        Ok(vec![Instruction::If {
            branches,
            otherwise,
        }])
    }
}
