//! Worker pool draining one content session's queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::{PoolConfig, ReductionConfig};
use crate::descramble;
use crate::error::{Error, Result};
use crate::fetcher::Fetch;
use crate::types::{ContentId, Event, PoolSummary, WorkItem};

use super::queue::WorkQueue;

/// State shared by the workers of one content session
///
/// Created when the pool starts and dropped when it joins, so nothing leaks from one
/// content id into the next.
pub(crate) struct SessionContext {
    pub(crate) content_id: ContentId,
    pub(crate) dest: PathBuf,
    pub(crate) queue: WorkQueue,
    pub(crate) total: usize,
    /// Items written by this session
    pub(crate) done: AtomicUsize,
    pub(crate) skipped: AtomicUsize,
    pub(crate) dropped: AtomicUsize,
    pub(crate) fetcher: Arc<dyn Fetch>,
    pub(crate) pool: PoolConfig,
    pub(crate) reduction: ReductionConfig,
    /// Child of the downloader's token
    pub(crate) cancel: CancellationToken,
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl SessionContext {
    /// Column count to descramble `item` with, or `None` to keep the bytes as fetched
    pub(crate) fn columns_for(&self, item: &WorkItem) -> Option<u32> {
        if !self.reduction.enabled || !self.content_id.at_least(self.reduction.activation_threshold)
        {
            return None;
        }
        Some(descramble::column_count(
            &self.content_id,
            item.page_id(),
            self.reduction.hashed_columns_threshold,
        ))
    }

    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

/// Run `worker_count` workers over the session queue and wait for all of them
///
/// # Errors
/// [`Error::Cancelled`] if the session was cancelled before the queue drained.
pub(crate) async fn run_pool(ctx: Arc<SessionContext>, worker_count: usize) -> Result<PoolSummary> {
    let mut workers = JoinSet::new();
    for worker_id in 0..worker_count {
        let ctx = ctx.clone();
        workers.spawn(async move { (worker_id, run_worker(worker_id, ctx).await) });
    }

    let mut per_worker = vec![0; worker_count];
    let mut failure: Option<Error> = None;
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((worker_id, Ok(handled))) => {
                if let Some(slot) = per_worker.get_mut(worker_id) {
                    *slot = handled;
                }
            }
            Ok((worker_id, Err(e))) => {
                tracing::debug!(content_id = %ctx.content_id, worker_id, error = %e, "Worker stopped early");
                ctx.cancel.cancel();
                failure.get_or_insert(e);
            }
            Err(e) => {
                tracing::error!(content_id = %ctx.content_id, error = %e, "Worker task failed");
                ctx.cancel.cancel();
                failure.get_or_insert(Error::from(e));
            }
        }
    }
    if let Some(e) = failure {
        return Err(e);
    }

    Ok(PoolSummary {
        total: ctx.total,
        done: ctx.done.load(Ordering::SeqCst),
        skipped: ctx.skipped.load(Ordering::SeqCst),
        dropped: ctx.dropped.load(Ordering::SeqCst),
        per_worker,
    })
}

/// Drain the queue until it is empty; returns the number of items this worker handled
async fn run_worker(worker_id: usize, ctx: Arc<SessionContext>) -> Result<usize> {
    let mut handled = 0;

    while let Some(mut item) = ctx.queue.try_pop().await {
        if ctx.cancel.is_cancelled() {
            ctx.queue.push(item).await;
            return Err(Error::Cancelled);
        }

        let path = ctx.dest.join(&item.id);
        if !ctx.pool.redownload && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(worker_id, item = %item.id, "Already on disk, skipping");
            ctx.skipped.fetch_add(1, Ordering::SeqCst);
            handled += 1;
            ctx.emit(Event::ItemSkipped {
                content_id: ctx.content_id.clone(),
                item: item.id.clone(),
            });
            continue;
        }

        match process_item(&ctx, &item, &path).await {
            Ok(()) => {
                handled += 1;
                let done = ctx.done.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::debug!(
                    content_id = %ctx.content_id,
                    worker_id,
                    item = %item.id,
                    done,
                    total = ctx.total,
                    "Item saved"
                );
                ctx.emit(Event::ItemCompleted {
                    content_id: ctx.content_id.clone(),
                    item: item.id.clone(),
                    done,
                    total: ctx.total,
                });
                tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(ctx.pool.item_delay) => {}
                }
            }
            Err(e) if e.is_cancelled() => {
                ctx.queue.push(item).await;
                return Err(e);
            }
            Err(e) => {
                item.attempts += 1;
                if item.attempts < ctx.pool.item_retry_ceiling {
                    tracing::warn!(
                        content_id = %ctx.content_id,
                        worker_id,
                        item = %item.id,
                        attempt = item.attempts,
                        error = %e,
                        "Item failed, requeueing"
                    );
                    ctx.emit(Event::ItemRetried {
                        content_id: ctx.content_id.clone(),
                        item: item.id.clone(),
                        attempts: item.attempts,
                        error: e.to_string(),
                    });
                    ctx.queue.push(item).await;
                } else {
                    tracing::error!(
                        content_id = %ctx.content_id,
                        worker_id,
                        item = %item.id,
                        url = %item.url,
                        attempts = item.attempts,
                        error = %e,
                        "Item failed too often, dropping"
                    );
                    ctx.dropped.fetch_add(1, Ordering::SeqCst);
                    ctx.emit(Event::ItemDropped {
                        content_id: ctx.content_id.clone(),
                        item: item.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    tracing::debug!(content_id = %ctx.content_id, worker_id, handled, "Worker finished");
    Ok(handled)
}

/// Fetch, validate, optionally descramble and persist one item
async fn process_item(ctx: &SessionContext, item: &WorkItem, path: &Path) -> Result<()> {
    let bytes = ctx.fetcher.fetch(&item.url, &ctx.cancel).await?;
    let columns = ctx.columns_for(item);
    let payload = tokio::task::spawn_blocking(move || prepare_payload(bytes, columns)).await??;

    // a half-written file would be skipped as done on the next run
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);
    let written = match tokio::fs::write(&partial, &payload).await {
        Ok(()) => tokio::fs::rename(&partial, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
            tracing::debug!(path = %partial.display(), error = %cleanup, "Partial file not removed");
        }
        return Err(e.into());
    }
    Ok(())
}

fn prepare_payload(bytes: Vec<u8>, columns: Option<u32>) -> Result<Vec<u8>> {
    let (image, format) = descramble::decode(&bytes)?;
    match columns {
        Some(columns) => descramble::descramble_to_bytes(&image, format, columns),
        None => Ok(bytes),
    }
}
