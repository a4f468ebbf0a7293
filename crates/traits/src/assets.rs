//! Asset bundle resolution for `t-call-assets`.

use crate::error::CollaboratorError;
use qweb_expr::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::RwLock;

/// One element produced for a bundle: `<tag attrs>content</tag>`.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetNode {
    pub tag: String,
    pub attributes: Vec<(String, Value)>,
    /// `None` renders a self-closed element.
    pub content: Option<String>,
}

impl AssetNode {
    pub fn stylesheet(href: &str) -> Self {
        Self {
            tag: "link".to_string(),
            attributes: vec![
                ("type".to_string(), Value::from("text/css")),
                ("rel".to_string(), Value::from("stylesheet")),
                ("href".to_string(), Value::from(href)),
            ],
            content: None,
        }
    }

    pub fn script(src: &str) -> Self {
        Self {
            tag: "script".to_string(),
            attributes: vec![
                ("type".to_string(), Value::from("text/javascript")),
                ("src".to_string(), Value::from(src)),
            ],
            content: Some(String::new()),
        }
    }
}

/// Resolves bundle names to files and wraps files into renderable nodes.
pub trait AssetResolver: Send + Sync + Debug {
    fn bundle_files(&self, bundle: &str, css: bool, js: bool)
    -> Result<Vec<String>, CollaboratorError>;

    /// Wraps resolved files. Stylesheets become `<link>`, scripts become `<script>`.
    fn to_nodes(&self, bundle: &str, files: &[String]) -> Result<Vec<AssetNode>, CollaboratorError> {
        files
            .iter()
            .map(|file| {
                if file.ends_with(".css") || file.ends_with(".scss") {
                    Ok(AssetNode::stylesheet(file))
                } else if file.ends_with(".js") {
                    Ok(AssetNode::script(file))
                } else {
                    Err(CollaboratorError::asset(
                        bundle,
                        format!("unsupported asset file '{}'", file),
                    ))
                }
            })
            .collect()
    }
}

/// Bundles declared up front as lists of file paths.
#[derive(Debug, Default)]
pub struct StaticAssetResolver {
    bundles: RwLock<HashMap<String, Vec<String>>>,
}

impl StaticAssetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bundle<I, S>(&self, name: &str, files: I) -> Result<(), CollaboratorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut bundles = self
            .bundles
            .write()
            .map_err(|_| CollaboratorError::asset(name, "bundle registry lock poisoned"))?;
        bundles.insert(name.to_string(), files.into_iter().map(Into::into).collect());
        Ok(())
    }
}

impl AssetResolver for StaticAssetResolver {
    fn bundle_files(
        &self,
        bundle: &str,
        css: bool,
        js: bool,
    ) -> Result<Vec<String>, CollaboratorError> {
        let bundles = self
            .bundles
            .read()
            .map_err(|_| CollaboratorError::asset(bundle, "bundle registry lock poisoned"))?;
        let files = bundles
            .get(bundle)
            .ok_or_else(|| CollaboratorError::asset(bundle, "unknown bundle"))?;
        Ok(files
            .iter()
            .filter(|f| {
                let is_js = f.ends_with(".js");
                (is_js && js) || (!is_js && css)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> StaticAssetResolver {
        let resolver = StaticAssetResolver::new();
        resolver
            .add_bundle("web.assets", ["/web/main.css", "/web/main.js"])
            .unwrap();
        resolver
    }

    #[test]
    fn test_bundle_files_filters_by_kind() {
        let resolver = resolver();
        assert_eq!(
            resolver.bundle_files("web.assets", true, true).unwrap().len(),
            2
        );
        assert_eq!(
            resolver.bundle_files("web.assets", false, true).unwrap(),
            vec!["/web/main.js".to_string()]
        );
        assert_eq!(
            resolver.bundle_files("web.assets", true, false).unwrap(),
            vec!["/web/main.css".to_string()]
        );
    }

    #[test]
    fn test_unknown_bundle_is_an_error() {
        let err = resolver().bundle_files("missing", true, true).unwrap_err();
        assert!(matches!(err, CollaboratorError::Asset { .. }));
    }

    #[test]
    fn test_default_node_wrapping() {
        let resolver = resolver();
        let files = resolver.bundle_files("web.assets", true, true).unwrap();
        let nodes = resolver.to_nodes("web.assets", &files).unwrap();
        assert_eq!(nodes[0].tag, "link");
        assert_eq!(nodes[0].content, None);
        assert_eq!(nodes[1].tag, "script");
        assert_eq!(nodes[1].content.as_deref(), Some(""));
    }
}
