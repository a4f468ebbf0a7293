//! # qweb
//!
//! A template engine for QWeb, the XML templating dialect where `t-*` attributes
//! drive rendering.
//!
//! ## Architecture
//!
//! | Crate | Role |
//! |-------|------|
//! | `qweb-expr` | Expression rewriting, safety checks and evaluation |
//! | `qweb-traits` | Collaborators the host provides: loaders, converters, assets, permissions |
//! | `qweb-template` | Directive compiler and instruction interpreter |
//! | `qweb` | Loading, caching, value preparation, output normalization, streaming |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use qweb::{Engine, RenderOptions};
//! use qweb_traits::InMemoryLoader;
//!
//! let loader = InMemoryLoader::new();
//! loader.add("hello", r#"<p t-esc="name"/>"#)?;
//! let engine = Engine::builder().with_loader(Arc::new(loader)).build();
//! let html = engine.render("hello", values, &RenderOptions::new())?;
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod render;
pub mod stream;

pub use cache::{CacheKey, TemplateCache};
pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder};
pub use error::ConfigError;
pub use loader::{LoadedTemplate, TemplateId, load_template};
pub use render::{RenderOptions, collapse_blank_lines, prepare_values};
pub use stream::{ChannelSink, RenderStream};

pub use qweb_expr::{Map, Record, Value};
pub use qweb_template::{CompileOptions, QWebError};
