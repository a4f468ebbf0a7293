//! Collaborator contracts consumed by the QWeb engine.
//!
//! The engine never stores templates, resolves asset bundles, checks group
//! membership or formats field values itself. It calls the traits in this crate,
//! which hosts implement. Simple implementations are provided for tests and the CLI.

pub mod assets;
pub mod attributes;
pub mod converters;
pub mod error;
pub mod loader;
pub mod permissions;

pub use assets::{AssetNode, AssetResolver, StaticAssetResolver};
pub use attributes::{AttributeHook, NoopHook};
pub use converters::{Converter, ConverterRegistry};
pub use error::CollaboratorError;
pub use loader::{FilesystemLoader, InMemoryLoader, TemplateKey, TemplateLoader, TemplateSource};
pub use permissions::{AllowAll, PermissionChecker, StaticGroups};
