use clap::Parser;
use qweb::config::parse_dev_mode;
use qweb::{ConfigError, Engine, EngineConfig, Map, QWebError, RenderOptions, Value};
use qweb_traits::FilesystemLoader;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Renders a QWeb template from a directory of `<name>.xml` files.
#[derive(Parser, Debug)]
#[command(version, about = "Render QWeb templates")]
struct Args {
    /// Directory holding the templates
    #[arg(long)]
    templates: PathBuf,

    /// Name (or numeric id) of the template to render
    #[arg(long)]
    template: String,

    /// JSON object with the render values
    #[arg(long)]
    values: Option<PathBuf>,

    /// Render language
    #[arg(long)]
    lang: Option<String>,

    /// Keep runs of blank lines in the output
    #[arg(long)]
    keep_empty_lines: bool,

    /// Developer-mode tokens, comma separated (`xml`, `qweb`)
    #[arg(long)]
    dev: Option<String>,

    /// Write chunks as they are rendered
    #[arg(long)]
    stream: bool,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid values file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Values must be a JSON object")]
    NotAnObject,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Render(#[from] QWebError),
}

fn read_values(path: Option<&PathBuf>) -> Result<Map, CliError> {
    let Some(path) = path else {
        return Ok(Map::new());
    };
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    match Value::from(json) {
        Value::Map(values) => Ok(values),
        _ => Err(CliError::NotAnObject),
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    env_logger::init();
    let args = Args::parse();

    let mut config = EngineConfig::from_env()?;
    if let Some(dev) = &args.dev {
        config.dev_mode = parse_dev_mode(dev);
    }
    let engine = Arc::new(
        Engine::builder()
            .with_loader(Arc::new(FilesystemLoader::new(&args.templates)))
            .with_config(config)
            .build(),
    );

    let values = read_values(args.values.as_ref())?;
    let mut options = RenderOptions::new().with_keep_empty_lines(args.keep_empty_lines);
    if let Some(lang) = &args.lang {
        options = options.with_lang(lang.as_str());
    }

    let mut stdout = io::stdout().lock();
    if args.stream {
        let mut stream = engine.render_stream(args.template.as_str(), values, options)?;
        while let Some(chunk) = stream.next_chunk().await {
            stdout.write_all(chunk.as_bytes())?;
        }
        stream.finish().await?;
    } else {
        let output = engine.render(args.template.as_str(), values, &options)?;
        stdout.write_all(output.as_bytes())?;
    }
    stdout.flush()?;
    Ok(())
}
