//! Render a URL in a browser, run the configured interaction handlers and
//! print the parsed result as JSON.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use crawl_harvest::{
    ChromiumFactory, Config, HandlerRegistry, HtmlParser, ParseOutcome, SessionManager,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "render_url", version, about = "Render a page in a browser and parse it")]
struct Cli {
    /// Page to render.
    url: String,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated handler names, overriding the configuration.
    #[arg(long)]
    handlers: Option<String>,

    /// Show the browser window.
    #[arg(long)]
    headed: bool,

    /// Save a screenshot after navigation.
    #[arg(long)]
    screenshot: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Serialize)]
struct Output<'a> {
    final_url: &'a str,
    handlers_run: &'a [String],
    screenshot: Option<String>,
    elapsed_ms: u128,
    outcome: &'a ParseOutcome,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
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
    if let Some(handlers) = cli.handlers {
        config.browser.handlers = handlers;
    }
    if cli.headed {
        config.browser.headless = false;
    }
    if cli.screenshot {
        config.browser.screenshot = true;
    }

    let registry = HandlerRegistry::with_builtin(&config.browser);
    let chain = registry.chain_from_config(&config.browser);
    anyhow::ensure!(!chain.is_empty(), "no known handler in {:?}", config.browser.handlers);

    let factory = Arc::new(ChromiumFactory::new(config.browser.clone()));
    let manager = SessionManager::new(factory, config.browser.clone());
    let page = manager
        .render(&cli.url, &chain)
        .await
        .with_context(|| format!("rendering {}", cli.url))?;

    let parser = HtmlParser::from_config(&config);
    let outcome = parser.parse_rendered(&page.final_url, &page.html);

    let output = Output {
        final_url: &page.final_url,
        handlers_run: &page.handlers_run,
        screenshot: page.screenshot.as_ref().map(|p| p.display().to_string()),
        elapsed_ms: page.elapsed.as_millis(),
        outcome: &outcome,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
