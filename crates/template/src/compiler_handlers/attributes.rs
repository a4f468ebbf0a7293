//! Element tags and attribute directives: t-att, t-att-<name>, t-attf-<name>.

use super::{Directive, is_attribute_directive};
use crate::ast::{DynamicAttribute, Instruction, TagTemplate};
use crate::compiler::{Compiler, NodeCtx, is_directive_attribute, push_all, push_text};
use crate::error::QWebError;
use crate::xml::{self, Element};

impl Compiler<'_> {
    /// Attributes written as-is, in document order, unescaped.
    pub(crate) fn static_attributes(&mut self, el: &Element) -> Vec<(String, String)> {
        let mut attributes = self.namespaces.undeclared(el);
        attributes.extend(
            el.attributes
                .iter()
                .filter(|(name, _)| !is_directive_attribute(name))
                .cloned(),
        );
        attributes
    }

    pub(crate) fn tag_template(
        &mut self,
        el: &Element,
        self_close: bool,
    ) -> Result<TagTemplate, QWebError> {
        let attributes = self
            .static_attributes(el)
            .into_iter()
            .map(|(name, value)| (name, xml::escape_attr(&value)))
            .collect();
        let mut dynamic = Vec::new();
        for (name, value) in &el.attributes {
            if !is_attribute_directive(name) {
                continue;
            }
            if name == "t-att" {
                dynamic.push(DynamicAttribute::Bulk(self.expr(value)?));
            } else if let Some(attr) = name.strip_prefix("t-attf-") {
                dynamic.push(DynamicAttribute::Format {
                    name: attr.to_string(),
                    value: self.format(value)?,
                });
            } else if let Some(attr) = name.strip_prefix("t-att-") {
                dynamic.push(DynamicAttribute::Expr {
                    name: attr.to_string(),
                    value: self.expr(value)?,
                });
            }
        }
        Ok(TagTemplate {
            tag: el.tag.clone(),
            attributes,
            dynamic,
            self_close,
        })
    }

    /// Wraps the element's remaining directives in its start and end tags.
    pub(crate) fn compile_tag(
        &mut self,
        node: NodeCtx<'_>,
        rest: &[Directive],
    ) -> Result<Vec<Instruction>, QWebError> {
        let el = node.el;
        let self_close =
            xml::is_void(&el.tag) && el.children.is_empty() && rest == [Directive::Content];
        let dynamic = el.attributes.iter().any(|(name, _)| is_attribute_directive(name));

        let mut out = Vec::new();
        if dynamic {
            let tag = self.tag_template(el, self_close)?;
            let body = if self_close {
                Vec::new()
            } else {
                self.compile_directives(node, rest, &[])?
            };
            out.push(Instruction::Tag {
                node: node.node,
                tag,
                body,
            });
        } else {
            let attributes = self.static_attributes(el);
            push_text(&mut out, &xml::open_tag(&el.tag, &attributes, self_close));
            if !self_close {
                push_all(&mut out, self.compile_directives(node, rest, &[])?);
                push_text(&mut out, &xml::close_tag(&el.tag));
            }
        }
        Ok(out)
    }
}
