//! Downloader handle and the per-session machinery behind it.
//!
//! - [`queue`] - Shared work queue of one content session
//! - [`pool`] - Worker pool draining that queue
//! - [`session`] - Orchestration of targets, content ids and albums

mod pool;
mod queue;
mod session;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::crawler::Crawler;
use crate::error::Result;
use crate::fetcher::{Fetch, HttpFetcher};
use crate::types::Event;

/// Main downloader instance (cloneable - all fields are shared)
#[derive(Clone)]
pub struct Downloader {
    pub(crate) config: Arc<Config>,
    pub(crate) fetcher: Arc<dyn Fetch>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Cancelled on operator interrupt; every session token is a child of it
    pub(crate) cancel: CancellationToken,
}

impl Downloader {
    /// Create a downloader with an HTTP client built from `config`
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(&config)?.into_shared();
        Ok(Self::build(config, fetcher))
    }

    /// Create a downloader that fetches through `fetcher`
    ///
    /// # Errors
    /// Returns an error if the config is invalid.
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetch>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, fetcher))
    }

    fn build(config: Config, fetcher: Arc<dyn Fetch>) -> Self {
        let (event_tx, _rx) = broadcast::channel(1000);
        Self {
            config: Arc::new(config),
            fetcher,
            event_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribe to download events
    ///
    /// Each subscriber receives all events independently. A subscriber that falls more
    /// than 1000 events behind gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Token cancelled by [`Downloader::shutdown`]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop all in-flight work; running calls return [`crate::Error::Cancelled`]
    pub fn shutdown(&self) {
        tracing::info!("Cancelling downloads");
        self.cancel.cancel();
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // no receivers is fine
        self.event_tx.send(event).ok();
    }

    pub(crate) fn crawler(&self) -> Crawler {
        Crawler::new(
            self.fetcher.clone(),
            self.config.crawl.clone(),
            self.cancel.clone(),
            self.event_tx.clone(),
        )
    }
}
