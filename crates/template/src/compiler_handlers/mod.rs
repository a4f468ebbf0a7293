//! Compile-time handlers for QWeb directives.
//!
//! Each element's directive attributes are mapped to the closed [`Directive`] set
//! and sorted by [`EVAL_ORDER`]. The compiler then hands the element to the handler
//! of the first directive, which compiles the remaining ones as its body.

pub(crate) mod attributes;
pub(crate) mod calls;
pub(crate) mod control_flow;
pub(crate) mod output;

use crate::error::QWebError;
use crate::xml::{Element, T_TAG};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    Debug,
    Groups,
    Foreach,
    If,
    Elif,
    Else,
    Field,
    Esc,
    Raw,
    Out,
    Tag,
    CallAssets,
    Call,
    Set,
    Content,
}

/// The order directives of one element are applied in.
pub const EVAL_ORDER: [Directive; 15] = [
    Directive::Debug,
    Directive::Groups,
    Directive::Foreach,
    Directive::If,
    Directive::Elif,
    Directive::Else,
    Directive::Field,
    Directive::Esc,
    Directive::Raw,
    Directive::Out,
    Directive::Tag,
    Directive::CallAssets,
    Directive::Call,
    Directive::Set,
    Directive::Content,
];

impl Directive {
    /// The attribute that triggers the directive.
    pub fn attribute(self) -> &'static str {
        match self {
            Directive::Debug => "t-debug",
            Directive::Groups => "groups",
            Directive::Foreach => "t-foreach",
            Directive::If => "t-if",
            Directive::Elif => "t-elif",
            Directive::Else => "t-else",
            Directive::Field => "t-field",
            Directive::Esc => "t-esc",
            Directive::Raw => "t-raw",
            Directive::Out => "t-out",
            Directive::Tag => "t-att",
            Directive::CallAssets => "t-call-assets",
            Directive::Call => "t-call",
            Directive::Set => "t-set",
            Directive::Content => "",
        }
    }

    fn from_attribute(name: &str) -> Option<Directive> {
        Some(match name {
            "t-debug" => Directive::Debug,
            "groups" | "t-groups" => Directive::Groups,
            "t-foreach" => Directive::Foreach,
            "t-if" => Directive::If,
            "t-elif" => Directive::Elif,
            "t-else" => Directive::Else,
            "t-field" => Directive::Field,
            "t-esc" => Directive::Esc,
            "t-raw" => Directive::Raw,
            "t-out" => Directive::Out,
            "t-call-assets" => Directive::CallAssets,
            "t-call" => Directive::Call,
            "t-set" => Directive::Set,
            _ => return None,
        })
    }

    pub fn is_output(self) -> bool {
        matches!(
            self,
            Directive::Field | Directive::Esc | Directive::Raw | Directive::Out
        )
    }

    fn rank(self) -> usize {
        EVAL_ORDER.iter().position(|d| *d == self).unwrap_or(EVAL_ORDER.len())
    }
}

/// Attributes read by a directive handler rather than triggering one.
const AUXILIARY: &[(&str, Directive)] = &[
    ("t-as", Directive::Foreach),
    ("t-value", Directive::Set),
    ("t-valuef", Directive::Set),
    ("t-css", Directive::CallAssets),
    ("t-js", Directive::CallAssets),
    ("t-lang", Directive::Call),
];

/// Bookkeeping attributes accepted anywhere and ignored by the compiler.
const IGNORED: &[&str] = &[
    "t-name",
    "t-inherit",
    "t-inherit-mode",
    "t-translation",
    "t-tag",
    "t-content",
];

pub(crate) fn is_attribute_directive(name: &str) -> bool {
    name == "t-att" || name.starts_with("t-att-") || name.starts_with("t-attf-")
}

fn is_options(name: &str) -> bool {
    name == "t-options" || name.starts_with("t-options-")
}

/// The directives carried by `el`, sorted in evaluation order.
///
/// Every non-`<t>` element gets [`Directive::Tag`] and every element ends with
/// [`Directive::Content`]. Unknown `t-*` attributes and contradictory combinations
/// are rejected here.
pub fn directives_of(el: &Element) -> Result<Vec<Directive>, QWebError> {
    let mut directives = vec![Directive::Content];
    if el.tag != T_TAG {
        directives.push(Directive::Tag);
    }
    let mut has_attribute_directive = false;
    let mut has_options = false;

    for (name, _) in &el.attributes {
        if let Some(directive) = Directive::from_attribute(name) {
            if !directives.contains(&directive) {
                directives.push(directive);
            }
        } else if is_attribute_directive(name) {
            has_attribute_directive = true;
        } else if is_options(name) {
            has_options = true;
        } else if let Some((_, owner)) = AUXILIARY.iter().find(|(aux, _)| aux == name) {
            if !el.has(owner.attribute()) {
                return Err(QWebError::directive(format!(
                    "'{}' can only be used together with '{}'",
                    name,
                    owner.attribute()
                )));
            }
        } else if name.starts_with("t-") && !IGNORED.contains(&name.as_str()) {
            return Err(QWebError::directive(format!("unknown directive '{}'", name)));
        }
    }
    directives.sort_by_key(|d| d.rank());

    let has = |d: Directive| directives.contains(&d);
    let outputs: Vec<&str> = directives
        .iter()
        .filter(|d| d.is_output())
        .map(|d| d.attribute())
        .collect();

    if has(Directive::Foreach) && !el.has("t-as") {
        return Err(QWebError::directive("'t-foreach' requires a 't-as' attribute"));
    }
    if outputs.len() > 1 {
        return Err(QWebError::directive(format!(
            "only one content directive is allowed per element, found {}",
            outputs.join(", ")
        )));
    }
    let conditionals = [Directive::If, Directive::Elif, Directive::Else]
        .into_iter()
        .filter(|d| has(*d))
        .count();
    if conditionals > 1 {
        return Err(QWebError::directive(
            "'t-if', 't-elif' and 't-else' are mutually exclusive",
        ));
    }
    let terminal: Vec<&str> = [Directive::CallAssets, Directive::Call, Directive::Set]
        .into_iter()
        .filter(|d| has(*d))
        .map(Directive::attribute)
        .collect();
    if terminal.len() > 1 || (!outputs.is_empty() && !terminal.is_empty()) {
        let mut found = outputs.clone();
        found.extend(terminal);
        return Err(QWebError::directive(format!(
            "directives {} cannot be combined on one element",
            found.join(", ")
        )));
    }
    if has_attribute_directive && el.tag == T_TAG {
        return Err(QWebError::directive(
            "attribute directives need an output element, not <t>",
        ));
    }
    if has_options && outputs.is_empty() && !has(Directive::Call) {
        return Err(QWebError::directive(
            "'t-options' is only valid with t-field, t-out, t-esc, t-raw or t-call",
        ));
    }
    Ok(directives)
}

/// A name usable as a template variable.
pub(crate) fn check_variable_name(name: &str, directive: &str) -> Result<(), QWebError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
        && !name.contains("__");
    if valid {
        Ok(())
    } else {
        Err(QWebError::directive(format!(
            "'{}' is not a valid variable name for {}",
            name, directive
        )))
    }
}

/// Children that are not whitespace-only text.
pub(crate) fn has_content(el: &Element) -> bool {
    el.children.iter().any(|n| !n.is_blank())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse;

    fn directives(source: &str) -> Result<Vec<Directive>, QWebError> {
        directives_of(&parse(source, "test")?)
    }

    #[test]
    fn test_eval_order_is_applied() {
        assert_eq!(
            directives(r#"<li t-esc="x" t-if="c" t-foreach="xs" t-as="x"/>"#).unwrap(),
            vec![
                Directive::Foreach,
                Directive::If,
                Directive::Esc,
                Directive::Tag,
                Directive::Content
            ]
        );
        assert_eq!(
            directives(r#"<t t-set="a" t-value="1"/>"#).unwrap(),
            vec![Directive::Set, Directive::Content]
        );
    }

    #[test]
    fn test_groups_attribute_is_a_directive() {
        assert_eq!(
            directives(r#"<div groups="base.group_user"/>"#).unwrap(),
            vec![Directive::Groups, Directive::Tag, Directive::Content]
        );
    }

    #[test]
    fn test_rejected_shapes() {
        for source in [
            r#"<t t-foreach="xs"/>"#,
            r#"<t t-as="x"/>"#,
            r#"<t t-value="1"/>"#,
            r#"<t t-esc="a" t-out="b"/>"#,
            r#"<t t-if="a" t-else=""/>"#,
            r#"<t t-esc="a" t-call="b"/>"#,
            r#"<t t-set="a" t-call="b"/>"#,
            r#"<t t-att-class="a"/>"#,
            r#"<div t-options="{}"/>"#,
            r#"<div t-bogus="1"/>"#,
        ] {
            assert!(
                matches!(directives(source), Err(QWebError::Directive(_))),
                "accepted {}",
                source
            );
        }
    }

    #[test]
    fn test_bookkeeping_attributes_are_ignored() {
        assert_eq!(
            directives(r#"<t t-name="x" t-inherit="y" t-inherit-mode="extension"/>"#).unwrap(),
            vec![Directive::Content]
        );
    }

    #[test]
    fn test_variable_names() {
        assert!(check_variable_name("line_2", "t-as").is_ok());
        assert!(check_variable_name("2x", "t-as").is_err());
        assert!(check_variable_name("a.b", "t-set").is_err());
        assert!(check_variable_name("__x", "t-set").is_err());
    }
}
