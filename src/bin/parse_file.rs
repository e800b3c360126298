//! Parse one local HTML file (or stdin) and print the parse outcome as JSON.

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use crawl_harvest::{BackendKind, Config, HtmlParser, RawDocument};

#[derive(Parser, Debug)]
#[command(name = "parse_file", version, about = "Parse an HTML file and print the outcome as JSON")]
struct Cli {
    /// HTML file to parse; stdin when absent or `-`.
    path: Option<PathBuf>,

    /// URL the content is attributed to.
    #[arg(long, default_value = "http://localhost/")]
    url: String,

    /// Declared content type, e.g. `text/html; charset=iso-8859-1`.
    #[arg(long)]
    content_type: Option<String>,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// DOM backend, overriding the configuration.
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(backend) = cli.backend {
        config.parser.backend = backend;
    }

    let bytes = match cli.path.as_deref() {
        Some(path) if path.as_os_str() != "-" => {
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?
        }
        _ => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf).context("reading stdin")?;
            buf
        }
    };

    let mut doc = RawDocument::new(cli.url, bytes);
    if let Some(content_type) = cli.content_type {
        doc = doc.with_content_type(content_type);
    }

    let parser = HtmlParser::from_config(&config);
    let outcome = parser.parse(&doc);
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
