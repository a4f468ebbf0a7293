use qweb::{Engine, Map, Value};
use qweb_traits::InMemoryLoader;
use std::sync::Arc;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// An engine over an in-memory loader holding `templates`.
pub fn engine_with(templates: &[(&str, &str)]) -> Engine {
    init_logging();
    Engine::builder()
        .with_loader(Arc::new(loader_with(templates)))
        .build()
}

pub fn loader_with(templates: &[(&str, &str)]) -> InMemoryLoader {
    let loader = InMemoryLoader::new();
    for (name, source) in templates {
        loader
            .add(*name, *source)
            .unwrap_or_else(|e| panic!("failed to register '{}': {}", name, e));
    }
    loader
}

/// Render values from a JSON object literal.
pub fn values(json: serde_json::Value) -> Map {
    match Value::from(json) {
        Value::Map(map) => map,
        other => panic!("values must be a JSON object, got {:?}", other),
    }
}
