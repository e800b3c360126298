//! Scripted in-memory driver for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{BrowserDriver, DriverFactory};
use crate::error::{Error, Result};

/// Call counters shared between a driver and the test that owns it.
#[derive(Debug, Default, Clone)]
pub(crate) struct Counters {
    navigations: Arc<AtomicUsize>,
    quits: Arc<AtomicUsize>,
    screenshots: Arc<AtomicUsize>,
    scrolls: Arc<AtomicUsize>,
}

impl Counters {
    pub(crate) fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }

    pub(crate) fn quits(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }

    pub(crate) fn screenshots(&self) -> usize {
        self.screenshots.load(Ordering::SeqCst)
    }

    pub(crate) fn scrolls(&self) -> usize {
        self.scrolls.load(Ordering::SeqCst)
    }
}

/// Driver whose page state is a queue of canned answers.
///
/// Queued heights and item texts are consumed one per read; once a queue is
/// empty the last successful value repeats.
pub(crate) struct MockDriver {
    pub heights: VecDeque<Result<i64>>,
    last_height: i64,
    pub texts: VecDeque<Result<Vec<String>>>,
    last_texts: Vec<String>,
    pub body: String,
    pub source: String,
    pub url: String,
    pub fail_navigation: Option<String>,
    pub fail_screenshot: bool,
    pub navigate_delay: Option<Duration>,
    pub quit_delay: Option<Duration>,
    pub healthy: bool,
    pub counters: Counters,
}

impl MockDriver {
    pub(crate) fn new() -> Self {
        Self {
            heights: VecDeque::new(),
            last_height: 0,
            texts: VecDeque::new(),
            last_texts: Vec::new(),
            body: String::new(),
            source: String::new(),
            url: "about:blank".to_string(),
            fail_navigation: None,
            fail_screenshot: false,
            navigate_delay: None,
            quit_delay: None,
            healthy: true,
            counters: Counters::default(),
        }
    }

    pub(crate) fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self.source = format!("<html><head></head><body>{body}</body></html>");
        self
    }

    pub(crate) fn with_heights(mut self, heights: &[i64]) -> Self {
        self.heights.extend(heights.iter().copied().map(Ok));
        self
    }

    pub(crate) fn push_height(&mut self, height: Result<i64>) {
        self.heights.push_back(height);
    }

    pub(crate) fn with_texts(mut self, rounds: &[&[&str]]) -> Self {
        for round in rounds {
            self.texts
                .push_back(Ok(round.iter().map(|s| (*s).to_string()).collect()));
        }
        self
    }

    pub(crate) fn failing_navigation(mut self, reason: &str) -> Self {
        self.fail_navigation = Some(reason.to_string());
        self
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.counters.navigations.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.navigate_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.fail_navigation {
            return Err(Error::Driver(reason.clone()));
        }
        self.url = url.to_string();
        Ok(())
    }

    async fn execute_script(&mut self, _script: &str) -> Result<Value> {
        Ok(Value::Null)
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        self.counters.screenshots.fetch_add(1, Ordering::SeqCst);
        if self.fail_screenshot {
            return Err(Error::Driver("capture failed".into()));
        }
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn quit(&mut self) -> Result<()> {
        self.counters.quits.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.quit_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }

    async fn body_html(&mut self) -> Result<String> {
        Ok(self.body.clone())
    }

    async fn page_source(&mut self) -> Result<String> {
        Ok(self.source.clone())
    }

    async fn element_texts(&mut self, _selector: &str) -> Result<Vec<String>> {
        match self.texts.pop_front() {
            Some(Ok(texts)) => {
                self.last_texts.clone_from(&texts);
                Ok(texts)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last_texts.clone()),
        }
    }

    async fn scroll_height(&mut self) -> Result<i64> {
        match self.heights.pop_front() {
            Some(Ok(height)) => {
                self.last_height = height;
                Ok(height)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last_height),
        }
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.counters.scrolls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

type Template = Box<dyn Fn() -> MockDriver + Send + Sync>;

/// Factory handing out fresh [`MockDriver`]s built from a template.
pub(crate) struct MockFactory {
    template: Template,
    pub fail: Option<String>,
    created: AtomicUsize,
    /// Counters of every driver created, in creation order.
    pub issued: Mutex<Vec<Counters>>,
}

impl MockFactory {
    pub(crate) fn new(template: impl Fn() -> MockDriver + Send + Sync + 'static) -> Self {
        Self {
            template: Box::new(template),
            fail: None,
            created: AtomicUsize::new(0),
            issued: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(reason: &str) -> Self {
        let mut factory = Self::new(MockDriver::new);
        factory.fail = Some(reason.to_string());
        factory
    }

    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn counters(&self, index: usize) -> Counters {
        self.issued.lock().expect("issued")[index].clone()
    }
}

#[async_trait]
impl DriverFactory for MockFactory {
    async fn create(&self) -> Result<Box<dyn BrowserDriver>> {
        if let Some(reason) = &self.fail {
            return Err(Error::SessionAcquire(reason.clone()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        let driver = (self.template)();
        self.issued
            .lock()
            .expect("issued")
            .push(driver.counters.clone());
        Ok(Box::new(driver))
    }
}
