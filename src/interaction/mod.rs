//! Interaction Handler Chain
//!
//! Handlers interact with a rendered page (scrolling, waiting for lazy
//! content) and return the markup to harvest. A [`HandlerChain`] runs every
//! handler that applies to a URL, in configured order, and concatenates their
//! outputs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::browser::BrowserDriver;
use crate::config::BrowserConfig;
use crate::error::Result;

mod default;
pub mod poll;
mod scroll;
mod site;

pub use default::DefaultHandler;
pub use poll::{poll_until, poll_until_stable, PollOutcome, PollPolicy, PollStatus};
pub use scroll::ScrollHandler;
pub use site::SiteHandler;

/// One page-interaction strategy.
#[async_trait]
pub trait InteractionHandler: Send + Sync {
    /// Name used in logs and in [`ChainOutput::handlers_run`].
    fn name(&self) -> &str;

    /// Whether this handler applies to `url`. Must not touch the browser.
    fn should_process_url(&self, url: &str) -> bool;

    /// Interact with the loaded page and return harvested markup.
    async fn process_driver(&self, driver: &mut dyn BrowserDriver) -> Result<String>;
}

/// Markup harvested by a chain run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainOutput {
    pub html: String,
    pub handlers_run: Vec<String>,
}

/// Ordered handlers for one render.
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn InteractionHandler>>,
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| h.name()))
            .finish()
    }
}

impl HandlerChain {
    #[must_use]
    pub fn new(handlers: Vec<Arc<dyn InteractionHandler>>) -> Self {
        Self { handlers }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|h| h.name())
    }

    /// Run every applicable handler against the page.
    ///
    /// A handler failing with a recoverable error contributes nothing and the
    /// chain moves on; any other error aborts the run. When no handler
    /// applies the output is empty.
    pub async fn run(&self, url: &str, driver: &mut dyn BrowserDriver) -> Result<ChainOutput> {
        let mut output = ChainOutput::default();
        for handler in self.handlers.iter().filter(|h| h.should_process_url(url)) {
            match handler.process_driver(driver).await {
                Ok(html) => {
                    tracing::debug!(url, handler = handler.name(), bytes = html.len(), "handler done");
                    output.html.push_str(&html);
                    output.handlers_run.push(handler.name().to_string());
                }
                Err(error) if error.is_recoverable() => {
                    tracing::warn!(url, handler = handler.name(), %error, "handler skipped");
                }
                Err(error) => return Err(error),
            }
        }
        if output.handlers_run.is_empty() {
            tracing::warn!(url, "no interaction handler produced output");
        }
        Ok(output)
    }
}

/// Handlers addressable by name.
///
/// Lookup ignores ASCII case.
#[derive(Default)]
pub struct HandlerRegistry {
    by_name: HashMap<String, Arc<dyn InteractionHandler>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.by_name.keys().collect();
        names.sort();
        f.debug_struct("HandlerRegistry")
            .field("names", &names)
            .finish()
    }
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handlers and the configured site handlers.
    #[must_use]
    pub fn with_builtin(config: &BrowserConfig) -> Self {
        let policy = PollPolicy::from_config(config);
        let mut registry = Self::new();
        registry.register(&["DefaultHandler", "default"], Arc::new(DefaultHandler));
        registry.register(
            &["ScrollHandler", "scroll"],
            Arc::new(ScrollHandler::new(policy, config.item_selector.clone())),
        );
        for site in &config.site_handlers {
            registry.register(
                &[site.name.as_str()],
                Arc::new(SiteHandler::from_config(site, policy)),
            );
        }
        registry
    }

    /// Register `handler` under each of `names`. Later registrations replace
    /// earlier ones.
    pub fn register(&mut self, names: &[&str], handler: Arc<dyn InteractionHandler>) {
        for name in names {
            self.by_name
                .insert(name.to_ascii_lowercase(), Arc::clone(&handler));
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn InteractionHandler>> {
        self.by_name.get(&name.trim().to_ascii_lowercase()).cloned()
    }

    /// Build a chain from names, in order. Unknown names are logged and
    /// skipped.
    pub fn resolve<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> HandlerChain {
        let mut handlers = Vec::new();
        for name in names {
            match self.get(name) {
                Some(handler) => handlers.push(handler),
                None => tracing::warn!(handler = name, "unknown interaction handler"),
            }
        }
        HandlerChain::new(handlers)
    }

    /// Chain named by [`BrowserConfig::handlers`].
    pub fn chain_from_config(&self, config: &BrowserConfig) -> HandlerChain {
        self.resolve(config.handler_names())
    }
}
