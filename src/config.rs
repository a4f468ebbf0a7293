//! Engine configuration.
//!
//! Defaults can be overridden from the process environment:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `QWEB_DEV_MODE` | Comma-separated developer-mode tokens (`xml`, `qweb`) |
//! | `QWEB_LANG` | Default render language |
//! | `QWEB_STRICT` | `1`/`true` makes undefined variables an error |
//! | `QWEB_STREAM_CAPACITY` | Chunks buffered between a streamed render and its consumer |

use crate::error::ConfigError;
use qweb_expr::Value;
use std::collections::BTreeSet;

pub const DEFAULT_STREAM_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub strict: bool,
    pub default_lang: Option<String>,
    pub dev_mode: BTreeSet<String>,
    pub stream_capacity: usize,
    /// Seeded as `request` in render values that do not define it.
    pub request: Value,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict: false,
            default_lang: None,
            dev_mode: BTreeSet::new(),
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            request: Value::Null,
        }
    }
}

impl EngineConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`, so tests need not touch the real environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(tokens) = lookup("QWEB_DEV_MODE") {
            config.dev_mode = parse_dev_mode(&tokens);
        }
        if let Some(lang) = lookup("QWEB_LANG") {
            let lang = lang.trim();
            if !lang.is_empty() {
                config.default_lang = Some(lang.to_string());
            }
        }
        if let Some(strict) = lookup("QWEB_STRICT") {
            config.strict = parse_flag("QWEB_STRICT", &strict)?;
        }
        if let Some(capacity) = lookup("QWEB_STREAM_CAPACITY") {
            config.stream_capacity = match capacity.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::invalid("QWEB_STREAM_CAPACITY", capacity)),
            };
        }
        log::debug!("engine configuration: {:?}", config);
        Ok(config)
    }
}

pub fn parse_dev_mode(tokens: &str) -> BTreeSet<String> {
    tokens
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, value)),
    }
}
