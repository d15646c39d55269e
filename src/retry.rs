//! Retry logic for transient fetch failures
//!
//! Every network read goes through [`fetch_with_retry`]: a bounded number of attempts
//! with a short fixed delay that grows once more than half the budget is used.
//! Cancellation is checked before each attempt and raced against both the
//! operation and the sleep, so an operator interrupt never waits out a retry.
//!
//! # Example
//!
//! ```no_run
//! use comic_dl::config::RetryConfig;
//! use comic_dl::retry::fetch_with_retry;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> comic_dl::Result<()> {
//! let config = RetryConfig::default();
//! let cancel = CancellationToken::new();
//! let body = fetch_with_retry(&config, &cancel, || async {
//!     Ok::<_, comic_dl::Error>(b"payload".to_vec())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection resets, bad gateway) return `true`.
/// Permanent failures (malformed page, bad config, cancellation) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode()
            }
            // Any non-200 answer is retried like a network hiccup
            Error::HttpStatus { .. } => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            Error::Cancelled => false,
            Error::Parse { .. } | Error::Config { .. } | Error::Url(_) => false,
            Error::Image(_) | Error::InvalidColumns { .. } => false,
            Error::Serialization(_) => false,
            Error::Other(_) => false,
        }
    }
}

/// Delay to wait after the given (1-based) failed attempt.
///
/// The base delay is used until more than half of `max_attempts` have been
/// consumed; after that it is multiplied once by `backoff_multiplier`.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    if attempt > config.max_attempts / 2 {
        Duration::from_secs_f64(config.initial_delay.as_secs_f64() * config.backoff_multiplier)
    } else {
        config.initial_delay
    }
}

/// Execute an async operation with bounded retries
///
/// # Arguments
///
/// * `config` - Attempt budget and delays
/// * `cancel` - Aborts the current attempt or sleep and returns [`Error::Cancelled`]
/// * `operation` - Async closure producing one attempt
///
/// # Returns
///
/// The first successful result, the first non-retryable error, or the last error
/// once `max_attempts` attempts have failed.
pub async fn fetch_with_retry<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            outcome = operation() => outcome,
        };

        match outcome {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(attempts = attempt, "Fetch succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                let delay = backoff_delay(config, attempt);
                let delay = if config.jitter { add_jitter(delay) } else { delay };

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Fetch failed, retrying"
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => {
                if e.is_cancelled() {
                    return Err(e);
                }
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Fetch failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "Fetch failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add up to 100% random jitter to a delay
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
