//! Scripted browser driver shared by the browser integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crawl_harvest::{BrowserDriver, DriverFactory, Error, Result};
use serde_json::Value;

/// Page behaviour for one scripted driver.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub heights: Vec<i64>,
    pub item_texts: Vec<Vec<String>>,
    pub body: String,
    pub redirect_to: Option<String>,
    pub fail_navigation: bool,
    pub stale_every_other_height: bool,
}

#[derive(Debug, Default)]
pub struct Calls {
    pub navigations: AtomicUsize,
    pub quits: AtomicUsize,
}

impl Calls {
    pub fn quits(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }
}

/// Driver that answers the crate's page scripts from a [`Script`].
pub struct ScriptedDriver {
    script: Script,
    heights: VecDeque<i64>,
    texts: VecDeque<Vec<String>>,
    url: String,
    height_reads: usize,
    calls: Arc<Calls>,
}

impl ScriptedDriver {
    pub fn new(script: Script, calls: Arc<Calls>) -> Self {
        Self {
            heights: script.heights.iter().copied().collect(),
            texts: script.item_texts.iter().cloned().collect(),
            script,
            url: "about:blank".into(),
            height_reads: 0,
            calls,
        }
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.calls.navigations.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_navigation {
            return Err(Error::Driver("net::ERR_NAME_NOT_RESOLVED".into()));
        }
        self.url = self.script.redirect_to.clone().unwrap_or_else(|| url.to_string());
        Ok(())
    }

    async fn execute_script(&mut self, script: &str) -> Result<Value> {
        if script.contains("scrollTo") {
            return Ok(Value::Null);
        }
        if script.contains("scrollHeight") {
            self.height_reads += 1;
            if self.script.stale_every_other_height && self.height_reads % 2 == 0 {
                return Err(Error::StaleReference);
            }
            let height = if self.heights.len() > 1 {
                self.heights.pop_front()
            } else {
                self.heights.front().copied()
            };
            return Ok(Value::from(height.unwrap_or(0)));
        }
        if script.contains("querySelectorAll") {
            let texts = if self.texts.len() > 1 {
                self.texts.pop_front()
            } else {
                self.texts.front().cloned()
            };
            return Ok(serde_json::json!(texts.unwrap_or_default()));
        }
        if script.contains("outerHTML") {
            return Ok(Value::from(format!("<html><body>{}</body></html>", self.script.body)));
        }
        if script.contains("innerHTML") {
            return Ok(Value::from(self.script.body.clone()));
        }
        Ok(Value::Null)
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn quit(&mut self) -> Result<()> {
        self.calls.quits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory producing [`ScriptedDriver`]s and recording their calls.
pub struct ScriptedFactory {
    script: Script,
    pub drivers: Mutex<Vec<Arc<Calls>>>,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            drivers: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self, index: usize) -> Arc<Calls> {
        Arc::clone(&self.drivers.lock().expect("drivers")[index])
    }

    pub fn created(&self) -> usize {
        self.drivers.lock().expect("drivers").len()
    }
}

#[async_trait]
impl DriverFactory for ScriptedFactory {
    async fn create(&self) -> Result<Box<dyn BrowserDriver>> {
        let calls = Arc::new(Calls::default());
        self.drivers.lock().expect("drivers").push(Arc::clone(&calls));
        Ok(Box::new(ScriptedDriver::new(self.script.clone(), calls)))
    }
}
