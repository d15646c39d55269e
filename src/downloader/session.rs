//! Orchestration: targets → content ids and albums → crawl → pool → session log.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use chrono::Local;

use crate::config::DownloadTarget;
use crate::crawler::is_plain_file_name;
use crate::error::Result;
use crate::session_log::{SessionLog, SessionRecord};
use crate::types::{ContentId, ContentReport, Event, PoolSummary, WorkItem};
use crate::utils::resolve_destination;

use super::Downloader;
use super::pool::{SessionContext, run_pool};
use super::queue::WorkQueue;

impl Downloader {
    /// Run every configured target, then append the session log
    ///
    /// A content id whose crawl fails is reported and skipped; the run goes on.
    ///
    /// # Errors
    /// [`crate::Error::Cancelled`] after [`Downloader::shutdown`]; nothing is logged
    /// in that case. Log write failures are also returned.
    pub async fn run(&self) -> Result<Vec<SessionRecord>> {
        let mut records = Vec::new();
        for target in &self.config.targets {
            if target.is_empty() {
                tracing::debug!("Skipping target with nothing to download");
                continue;
            }
            records.push(self.run_target(target).await?);
        }

        SessionLog::new(self.config.log_file_path.clone())
            .append(&records)
            .await?;

        let contents: usize = records.iter().map(|r| r.contents.len()).sum();
        self.emit_event(Event::SessionFinished { contents });
        tracing::info!(targets = records.len(), contents, "Session finished");
        Ok(records)
    }

    /// Download every content id and album of one target
    pub async fn run_target(&self, target: &DownloadTarget) -> Result<SessionRecord> {
        let time = Local::now();
        let dest = resolve_destination(&self.config.download_dir, &target.sub_dir).await;
        tracing::info!(dest = %dest.display(), sub_dir = %target.sub_dir, "Starting target");

        let comic_ids = target.comic_id_list();
        let album_ids = target.album_id_list();
        let mut contents = Vec::new();

        for id in &comic_ids {
            let content_id = ContentId::new(id.as_str());
            if let Some(report) = self.download_content_reported(&content_id, &dest).await? {
                contents.push(report);
            }
        }

        for album_id in &album_ids {
            contents.extend(self.download_album(album_id, &dest).await?);
        }

        Ok(SessionRecord {
            time,
            comic_ids,
            album_ids,
            sub_dir: target.sub_dir.clone(),
            dest,
            worker_count: self.config.pool.worker_count,
            contents,
        })
    }

    /// Crawl one content id into `dest_root/<title>` and download all its items
    ///
    /// # Errors
    /// Crawl failures and cancellation. Individual item failures are not errors; they
    /// show up as `dropped` in the report.
    pub async fn download_content(
        &self,
        content_id: &ContentId,
        dest_root: &Path,
    ) -> Result<ContentReport> {
        let started_at = Local::now();
        let url = self.config.content_url(content_id.as_str());
        let crawl = self.crawler().crawl(content_id, &url, dest_root).await?;

        let item_count = crawl.items.len();
        let summary = self
            .download_items(content_id, &crawl.dest_path, crawl.items)
            .await?;

        tracing::info!(
            content_id = %content_id,
            title = %crawl.title,
            done = summary.handled(),
            total = summary.total,
            skipped = summary.skipped,
            dropped = summary.dropped,
            "All workers are done"
        );
        self.emit_event(Event::ContentFinished {
            content_id: content_id.clone(),
            done: summary.handled(),
            total: summary.total,
        });

        Ok(ContentReport {
            content_id: content_id.clone(),
            title: crawl.title,
            path: crawl.dest_path,
            page_count: crawl.page_count,
            item_count,
            done: summary.handled(),
            dropped: summary.dropped,
            worker_count: self.config.pool.worker_count,
            started_at,
        })
    }

    /// Download `items` into `dest` with a fresh worker pool
    ///
    /// # Errors
    /// [`crate::Error::Cancelled`] if the run is cancelled before the queue drains.
    pub async fn download_items(
        &self,
        content_id: &ContentId,
        dest: &Path,
        items: Vec<WorkItem>,
    ) -> Result<PoolSummary> {
        let total = items.len();
        let ctx = Arc::new(SessionContext {
            content_id: content_id.clone(),
            dest: dest.to_path_buf(),
            queue: WorkQueue::new(items),
            total,
            done: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
            fetcher: self.fetcher.clone(),
            pool: self.config.pool.clone(),
            reduction: self.config.reduction.clone(),
            cancel: self.cancel.child_token(),
            event_tx: self.event_tx.clone(),
        });
        let workers = self.config.pool.worker_count;
        tracing::info!(content_id = %content_id, total, workers, "Starting worker pool");

        run_pool(ctx, workers).await
    }

    /// Discover an album and download each linked content id into
    /// `dest_root/<album title>`
    ///
    /// An album whose page cannot be fetched or parsed is reported and yields no
    /// contents.
    pub async fn download_album(
        &self,
        album_id: &str,
        dest_root: &Path,
    ) -> Result<Vec<ContentReport>> {
        let url = self.config.album_url(album_id);
        let album = match self.crawler().discover_album(&url).await {
            Ok(album) => album,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                tracing::error!(album_id, url = %url, error = %e, "Album discovery failed");
                return Ok(Vec::new());
            }
        };

        let title = if album.title.is_empty() || !is_plain_file_name(&album.title) {
            album_id.to_string()
        } else {
            album.title
        };
        let dest = dest_root.join(title);

        let mut reports = Vec::new();
        for content_id in &album.content_ids {
            if let Some(report) = self.download_content_reported(content_id, &dest).await? {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    /// [`Downloader::download_content`], turning failures other than cancellation
    /// into a logged event
    async fn download_content_reported(
        &self,
        content_id: &ContentId,
        dest_root: &Path,
    ) -> Result<Option<ContentReport>> {
        match self.download_content(content_id, dest_root).await {
            Ok(report) => Ok(Some(report)),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                tracing::error!(content_id = %content_id, error = %e, "Content download failed");
                self.emit_event(Event::ContentFailed {
                    content_id: content_id.clone(),
                    error: e.to_string(),
                });
                Ok(None)
            }
        }
    }
}
