//! # comic-dl
//!
//! Concurrent downloader for paginated image galleries.
//!
//! A run walks each configured content id's page chain, collects the image entries,
//! and drains them with a small worker pool. Pages that the site serves scrambled
//! (horizontal bands in reverse order) are put back together before they are
//! written. Each finished target is appended to a JSON-lines session log.
//!
//! ## Quick Start
//!
//! ```no_run
//! use comic_dl::{Config, DownloadTarget, Downloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         endpoint: "https://gallery.example".to_string(),
//!         targets: vec![DownloadTarget {
//!             comic_ids: "300001 300002".to_string(),
//!             ..Default::default()
//!         }],
//!         ..Default::default()
//!     };
//!
//!     let downloader = Downloader::new(config)?;
//!
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let records = downloader.run().await?;
//!     println!("{} targets done", records.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Page chain crawling and album discovery
pub mod crawler;
/// Band reordering of scrambled pages
pub mod descramble;
/// Downloader handle, worker pool and orchestration
pub mod downloader;
/// Error types
pub mod error;
/// HTTP fetching
pub mod fetcher;
/// Retry logic with backoff
pub mod retry;
/// Append-only session log
pub mod session_log;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{Config, DownloadTarget};
pub use downloader::Downloader;
pub use error::{Error, Result};
pub use fetcher::{Fetch, HttpFetcher};
pub use session_log::{SessionLog, SessionRecord};
pub use types::{ContentId, ContentReport, Event, PoolSummary, WorkItem};

/// Run the downloader, cancelling it on SIGTERM/SIGINT (Ctrl+C elsewhere).
///
/// After a signal the run is allowed to unwind, so the result is then
/// [`Error::Cancelled`].
///
/// # Example
///
/// ```no_run
/// use comic_dl::{Config, Downloader, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::from_file("comic-dl.json")?;
///     let downloader = Downloader::new(config)?;
///
///     run_with_shutdown(downloader).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: Downloader) -> Result<Vec<SessionRecord>> {
    let run = downloader.run();
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => result,
        _ = wait_for_signal() => {
            downloader.shutdown();
            run.await
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // registration may fail in restricted environments
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Ok(mut only), Err(e)) | (Err(e), Ok(mut only)) => {
            tracing::warn!(error = %e, "Could not register one signal handler");
            only.recv().await;
            tracing::info!("Received termination signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            ctrl_c_or_forever().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c_or_forever().await;
}

/// Resolve on Ctrl+C; never resolve if it cannot be listened for
async fn ctrl_c_or_forever() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}
