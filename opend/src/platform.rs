//! Host capabilities injected at the composition root.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::storage::{KeyValueStore, MemoryStore};

/// Hands a URL to whatever browser context the host has.
#[async_trait]
pub trait UrlOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<()>;
}

/// Copies text for the user.
pub trait Clipboard: Send + Sync {
    fn copy(&self, text: &str) -> Result<()>;
}

/// Bundle of capabilities handed to clients and the session bridge.
#[derive(Clone)]
pub struct Platform {
    pub store: Arc<dyn KeyValueStore>,
    pub opener: Arc<dyn UrlOpener>,
    pub clipboard: Arc<dyn Clipboard>,
}

impl Platform {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        opener: Arc<dyn UrlOpener>,
        clipboard: Arc<dyn Clipboard>,
    ) -> Self {
        Self {
            store,
            opener,
            clipboard,
        }
    }

    /// Memory store, recording opener and clipboard.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingUrlOpener::default()),
            Arc::new(MemoryClipboard::default()),
        )
    }
}

/// Opener for terminals: logs the URL for the user to follow.
#[derive(Debug, Default)]
pub struct LogUrlOpener;

#[async_trait]
impl UrlOpener for LogUrlOpener {
    async fn open(&self, url: &str) -> Result<()> {
        info!(%url, "open this URL in a browser");
        eprintln!("{url}");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingUrlOpener {
    opened: Mutex<Vec<String>>,
}

impl RecordingUrlOpener {
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl UrlOpener for RecordingUrlOpener {
    async fn open(&self, url: &str) -> Result<()> {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(url.to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|c| c.clone())
    }
}

impl Clipboard for MemoryClipboard {
    fn copy(&self, text: &str) -> Result<()> {
        if let Ok(mut contents) = self.contents.lock() {
            *contents = Some(text.to_string());
        }
        Ok(())
    }
}
