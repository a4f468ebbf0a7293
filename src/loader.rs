//! Resolving template identifiers to parsed trees.

use qweb_template::{Element, QWebError, xml};
use qweb_traits::{TemplateKey, TemplateLoader};
use std::fmt;

/// Reference used for templates handed over as an already parsed tree.
pub const INLINE_REFERENCE: &str = "<inline>";

/// What a render asks for: a stored template or a tree built by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateId {
    Id(i64),
    Name(String),
    Node(Element),
}

impl TemplateId {
    /// All-digit text is a numeric id, anything else a name.
    pub fn parse(text: &str) -> Self {
        match TemplateKey::parse(text) {
            TemplateKey::Id(id) => TemplateId::Id(id),
            TemplateKey::Name(name) => TemplateId::Name(name),
        }
    }

    /// The storage key, `None` for inline trees.
    pub fn key(&self) -> Option<TemplateKey> {
        match self {
            TemplateId::Id(id) => Some(TemplateKey::Id(*id)),
            TemplateId::Name(name) => Some(TemplateKey::Name(name.clone())),
            TemplateId::Node(_) => None,
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateId::Id(id) => write!(f, "{}", id),
            TemplateId::Name(name) => f.write_str(name),
            TemplateId::Node(el) => f.write_str(el.get("t-name").unwrap_or(INLINE_REFERENCE)),
        }
    }
}

impl From<&str> for TemplateId {
    fn from(text: &str) -> Self {
        TemplateId::parse(text)
    }
}

impl From<String> for TemplateId {
    fn from(text: String) -> Self {
        TemplateId::parse(&text)
    }
}

impl From<i64> for TemplateId {
    fn from(id: i64) -> Self {
        TemplateId::Id(id)
    }
}

impl From<Element> for TemplateId {
    fn from(el: Element) -> Self {
        TemplateId::Node(el)
    }
}

/// A template ready for compilation.
#[derive(Debug, Clone)]
pub struct LoadedTemplate {
    pub root: Element,
    /// Markup the tree came from, kept for error reports.
    pub source: String,
    pub reference: String,
}

/// Loads and parses the template `id` designates.
///
/// Inline trees are returned as they are, serialized back for error reports.
/// A name matching a `t-name` child of the loaded document selects that child.
/// Otherwise the root's `t-name` is forced to the requested name.
///
/// # Errors
///
/// `QWebError::NotFound` when the loader has nothing under `id` or returns an
/// empty document.
pub fn load_template(
    loader: &dyn TemplateLoader,
    id: &TemplateId,
    lang: Option<&str>,
) -> Result<LoadedTemplate, QWebError> {
    let key = match id {
        TemplateId::Node(el) => {
            return Ok(LoadedTemplate {
                source: el.to_xml(),
                reference: id.to_string(),
                root: el.clone(),
            });
        }
        TemplateId::Id(id) => TemplateKey::Id(*id),
        TemplateId::Name(name) => TemplateKey::Name(name.clone()),
    };

    log::debug!("loading template '{}' through {}", key, loader.name());
    let source = loader
        .load(&key, lang)?
        .filter(|source| !source.document.trim().is_empty())
        .ok_or_else(|| QWebError::NotFound(key.to_string()))?;

    let document = xml::parse(&source.document, &source.reference)?;
    let root = match &key {
        TemplateKey::Name(name) => match document.named_child(name) {
            Some(child) => child.clone(),
            None => {
                let mut root = document;
                if root.get("t-name").is_some_and(|n| n != name) {
                    root.set("t-name", name.as_str());
                }
                root
            }
        },
        TemplateKey::Id(_) => document,
    };

    Ok(LoadedTemplate {
        root,
        source: source.document,
        reference: source.reference,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use qweb_traits::{CollaboratorError, InMemoryLoader, TemplateSource};

    #[test]
    fn test_parse_ids() {
        assert_eq!(TemplateId::parse("42"), TemplateId::Id(42));
        assert_eq!(TemplateId::parse("web.layout"), TemplateId::Name("web.layout".into()));
        assert_eq!(TemplateId::parse("-1"), TemplateId::Name("-1".into()));
    }

    #[test]
    fn test_named_child_is_selected() {
        let loader = InMemoryLoader::new();
        loader
            .add(
                "web.card",
                r#"<templates><t t-name="web.other">x</t><t t-name="web.card"><b>card</b></t></templates>"#,
            )
            .unwrap();
        let loaded = load_template(&loader, &TemplateId::parse("web.card"), None).unwrap();
        assert_eq!(loaded.root.get("t-name"), Some("web.card"));
        assert_eq!(loaded.reference, "web.card");
    }

    #[test]
    fn test_root_name_is_forced() {
        let loader = InMemoryLoader::new();
        loader
            .add("web.child", r#"<div t-name="web.parent">x</div>"#)
            .unwrap();
        let loaded = load_template(&loader, &TemplateId::parse("web.child"), None).unwrap();
        assert_eq!(loaded.root.get("t-name"), Some("web.child"));
    }

    #[test]
    fn test_inline_tree_skips_the_loader() {
        let root = xml::parse("<p>hi</p>", "t").unwrap();
        let loader = InMemoryLoader::new();
        let loaded = load_template(&loader, &TemplateId::Node(root), None).unwrap();
        assert_eq!(loaded.source, "<p>hi</p>");
        assert_eq!(loaded.reference, INLINE_REFERENCE);
    }

    #[derive(Debug)]
    struct Blank;

    impl TemplateLoader for Blank {
        fn load(
            &self,
            key: &TemplateKey,
            _lang: Option<&str>,
        ) -> Result<Option<TemplateSource>, CollaboratorError> {
            Ok(Some(TemplateSource {
                document: "  \n".into(),
                reference: key.to_string(),
            }))
        }

        fn name(&self) -> &'static str {
            "blank"
        }
    }

    #[test]
    fn test_missing_and_empty_templates_are_errors() {
        let err = load_template(&InMemoryLoader::new(), &TemplateId::parse("nope"), None).unwrap_err();
        assert!(matches!(err, QWebError::NotFound(name) if name == "nope"));
        let err = load_template(&Blank, &TemplateId::Id(3), None).unwrap_err();
        assert!(matches!(err, QWebError::NotFound(name) if name == "3"));
    }
}
