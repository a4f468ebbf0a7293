//! TemplateLoader trait for abstracting view storage.
//!
//! The engine asks a loader for raw template source by numeric id or by name and
//! never touches storage itself.

use crate::error::CollaboratorError;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

/// How a stored template is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateKey {
    Id(i64),
    Name(String),
}

impl TemplateKey {
    /// Parses a textual identifier; all-digit names are numeric ids.
    pub fn parse(text: &str) -> Self {
        match text.parse::<i64>() {
            Ok(id) if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) => {
                TemplateKey::Id(id)
            }
            _ => TemplateKey::Name(text.to_string()),
        }
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateKey::Id(id) => write!(f, "{}", id),
            TemplateKey::Name(name) => f.write_str(name),
        }
    }
}

/// Raw template markup plus the stable reference used in cache keys and errors.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSource {
    pub document: String,
    pub reference: String,
}

/// A source of template markup.
///
/// # Implementations
///
/// - `InMemoryLoader`: templates registered programmatically
/// - `FilesystemLoader`: `<root>/<name>.xml` files
///
/// # Example
///
/// ```ignore
/// let loader = InMemoryLoader::new();
/// loader.add("web.layout", "<t t-name=\"web.layout\"><main t-out=\"0\"/></t>")?;
/// let source = loader.load(&TemplateKey::Name("web.layout".into()), None)?;
/// ```
pub trait TemplateLoader: Send + Sync + Debug {
    /// Loads a template. `Ok(None)` means no template is stored under `key`.
    fn load(
        &self,
        key: &TemplateKey,
        lang: Option<&str>,
    ) -> Result<Option<TemplateSource>, CollaboratorError>;

    /// Returns a human-readable name for this loader (for logging/debugging).
    fn name(&self) -> &'static str;
}

#[derive(Debug, Default)]
struct Store {
    by_name: HashMap<String, TemplateSource>,
    ids: HashMap<i64, String>,
}

/// An in-memory template store.
#[derive(Debug, Default)]
pub struct InMemoryLoader {
    store: RwLock<Store>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned(name: &str) -> CollaboratorError {
        CollaboratorError::load_failed(name, "template store lock poisoned")
    }

    /// Registers a template under `name`. The name doubles as its reference.
    ///
    /// # Errors
    ///
    /// Returns `CollaboratorError::LoadFailed` if the internal lock is poisoned.
    pub fn add(
        &self,
        name: impl Into<String>,
        document: impl Into<String>,
    ) -> Result<(), CollaboratorError> {
        let name = name.into();
        let mut store = self.store.write().map_err(|_| Self::poisoned(&name))?;
        store.by_name.insert(
            name.clone(),
            TemplateSource {
                document: document.into(),
                reference: name,
            },
        );
        Ok(())
    }

    /// Registers a template reachable both by `id` and by `name`.
    pub fn add_with_id(
        &self,
        id: i64,
        name: impl Into<String>,
        document: impl Into<String>,
    ) -> Result<(), CollaboratorError> {
        let name = name.into();
        self.add(name.clone(), document)?;
        let mut store = self.store.write().map_err(|_| Self::poisoned(&name))?;
        store.ids.insert(id, name);
        Ok(())
    }

    /// Removes a template. Returns `None` if the lock is poisoned or the name is unknown.
    pub fn remove(&self, name: &str) -> Option<TemplateSource> {
        let mut store = self.store.write().ok()?;
        store.ids.retain(|_, n| n != name);
        store.by_name.remove(name)
    }

    /// Clear all templates. Does nothing if the lock is poisoned.
    pub fn clear(&self) {
        if let Ok(mut store) = self.store.write() {
            store.by_name.clear();
            store.ids.clear();
        }
    }

    /// Returns 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.store.read().map(|s| s.by_name.len()).unwrap_or(0)
    }

    /// Returns `true` if the lock is poisoned (safe default).
    pub fn is_empty(&self) -> bool {
        self.store.read().map(|s| s.by_name.is_empty()).unwrap_or(true)
    }
}

impl TemplateLoader for InMemoryLoader {
    fn load(
        &self,
        key: &TemplateKey,
        _lang: Option<&str>,
    ) -> Result<Option<TemplateSource>, CollaboratorError> {
        let store = self
            .store
            .read()
            .map_err(|_| Self::poisoned(&key.to_string()))?;
        let name = match key {
            TemplateKey::Name(name) => Some(name.as_str()),
            TemplateKey::Id(id) => store.ids.get(id).map(String::as_str),
        };
        Ok(name.and_then(|n| store.by_name.get(n)).cloned())
    }

    fn name(&self) -> &'static str {
        "InMemoryLoader"
    }
}

/// Loads `<root>/<name>.xml`. Numeric ids are looked up as `<root>/<id>.xml`.
///
/// Names resolving outside `root` are treated as missing.
#[derive(Debug)]
pub struct FilesystemLoader {
    root: PathBuf,
}

impl FilesystemLoader {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve_path_safe(&self, name: &str) -> Option<PathBuf> {
        let file = format!("{}.xml", name);
        let relative = Path::new(&file);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
            || relative.components().count() != 1
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl TemplateLoader for FilesystemLoader {
    fn load(
        &self,
        key: &TemplateKey,
        _lang: Option<&str>,
    ) -> Result<Option<TemplateSource>, CollaboratorError> {
        let name = key.to_string();
        let Some(path) = self.resolve_path_safe(&name) else {
            log::warn!("Rejected template name '{}' (path traversal blocked)", name);
            return Ok(None);
        };
        match std::fs::read_to_string(&path) {
            Ok(document) => Ok(Some(TemplateSource {
                document,
                reference: name,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CollaboratorError::load_failed(name, e.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "FilesystemLoader"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_template_key_parse() {
        assert_eq!(TemplateKey::parse("42"), TemplateKey::Id(42));
        assert_eq!(
            TemplateKey::parse("web.layout"),
            TemplateKey::Name("web.layout".into())
        );
        assert_eq!(TemplateKey::parse("-1"), TemplateKey::Name("-1".into()));
    }

    #[test]
    fn test_in_memory_loader_by_name_and_id() {
        let loader = InMemoryLoader::new();
        loader.add_with_id(7, "sub", "<b>hi</b>").unwrap();

        let by_name = loader
            .load(&TemplateKey::Name("sub".into()), None)
            .unwrap()
            .unwrap();
        assert_eq!(by_name.document, "<b>hi</b>");
        assert_eq!(by_name.reference, "sub");

        let by_id = loader.load(&TemplateKey::Id(7), None).unwrap();
        assert_eq!(by_id, Some(by_name));
    }

    #[test]
    fn test_in_memory_loader_missing_is_none() {
        let loader = InMemoryLoader::new();
        assert!(loader.is_empty());
        assert_eq!(loader.load(&TemplateKey::Id(1), None).unwrap(), None);
    }

    #[test]
    fn test_in_memory_loader_remove_and_clear() {
        let loader = InMemoryLoader::new();
        loader.add_with_id(1, "a", "<a/>").unwrap();
        loader.add("b", "<b/>").unwrap();
        assert_eq!(loader.len(), 2);

        assert!(loader.remove("a").is_some());
        assert_eq!(loader.load(&TemplateKey::Id(1), None).unwrap(), None);

        loader.clear();
        assert!(loader.is_empty());
    }

    #[test]
    fn test_filesystem_loader_reads_dotted_names() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("web.layout.xml"), "<main/>").unwrap();

        let loader = FilesystemLoader::new(dir.path());
        let source = loader
            .load(&TemplateKey::Name("web.layout".into()), None)
            .unwrap()
            .unwrap();
        assert_eq!(source.document, "<main/>");
        assert_eq!(source.reference, "web.layout");
        assert_eq!(
            loader.load(&TemplateKey::Name("other".into()), None).unwrap(),
            None
        );
    }

    #[test]
    fn test_filesystem_loader_blocks_path_traversal() {
        let dir = tempdir().unwrap();
        let loader = FilesystemLoader::new(dir.path());
        assert_eq!(
            loader
                .load(&TemplateKey::Name("../../etc/passwd".into()), None)
                .unwrap(),
            None
        );
        assert_eq!(
            loader.load(&TemplateKey::Name("/etc/passwd".into()), None).unwrap(),
            None
        );
    }
}
