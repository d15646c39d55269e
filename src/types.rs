//! Core types and events for comic-dl

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifier of one downloadable content item (one chapter/gallery)
///
/// Ids are kept as the site presents them. Thresholds compare the numeric value;
/// an id that is not a plain unsigned integer never reaches any threshold.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub String);

impl ContentId {
    /// Create a new ContentId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as written
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the id, if it is one
    pub fn numeric(&self) -> Option<u64> {
        self.0.trim().parse().ok()
    }

    /// True if the id is numeric and at least `threshold`
    pub fn at_least(&self, threshold: u64) -> bool {
        self.numeric().is_some_and(|n| n >= threshold)
    }

    /// Take the last path segment of a content URL (`.../photo/12345` -> `12345`)
    pub fn from_url(url: &str) -> Self {
        let trimmed = url.trim_end_matches('/');
        let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
        Self(last.to_string())
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One page-level download task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Target file name inside the content directory (e.g. "00001.webp")
    pub id: String,
    /// Image URL
    pub url: String,
    /// Failed attempts so far
    pub attempts: u32,
}

impl WorkItem {
    /// Create a fresh work item
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            attempts: 0,
        }
    }

    /// Page id used by the column resolver: the file name up to its first dot
    pub fn page_id(&self) -> &str {
        self.id.split('.').next().unwrap_or(&self.id)
    }
}

/// Outcome of one worker pool run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSummary {
    /// Items handed to the pool
    pub total: usize,
    /// Items fetched and written
    pub done: usize,
    /// Items whose destination already existed
    pub skipped: usize,
    /// Items dropped after exhausting their retry ceiling
    pub dropped: usize,
    /// Handled (done + skipped) count per worker, indexed by worker id
    pub per_worker: Vec<usize>,
}

impl PoolSummary {
    /// Sum of per-worker handled counts
    pub fn handled(&self) -> usize {
        self.per_worker.iter().sum()
    }
}

/// Result of downloading one content id
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentReport {
    /// Content id
    pub content_id: ContentId,
    /// Sanitized title
    pub title: String,
    /// Directory the images were written to
    pub path: PathBuf,
    /// Pages walked by the crawler
    pub page_count: usize,
    /// Work items discovered
    pub item_count: usize,
    /// Items handled (written or already present)
    pub done: usize,
    /// Items given up on
    pub dropped: usize,
    /// Workers used
    pub worker_count: usize,
    /// When the content session started
    pub started_at: DateTime<Local>,
}

/// Events emitted during a run
///
/// Consumers subscribe via [`crate::Downloader::subscribe`]; nothing blocks on slow
/// or missing subscribers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Crawl of a content id started
    CrawlStarted {
        /// Content id
        content_id: ContentId,
        /// First page URL
        url: String,
    },

    /// One page of the chain was parsed
    PageCrawled {
        /// Content id
        content_id: ContentId,
        /// 1-based page number
        page: usize,
        /// Entries found on this page
        items: usize,
    },

    /// An item was fetched and written
    ItemCompleted {
        /// Content id
        content_id: ContentId,
        /// Work item id
        item: String,
        /// Items completed so far in this content session
        done: usize,
        /// Items in this content session
        total: usize,
    },

    /// An item was skipped because the file exists
    ItemSkipped {
        /// Content id
        content_id: ContentId,
        /// Work item id
        item: String,
    },

    /// An item failed and was put back on the queue
    ItemRetried {
        /// Content id
        content_id: ContentId,
        /// Work item id
        item: String,
        /// Failed attempts so far
        attempts: u32,
        /// Error message
        error: String,
    },

    /// An item exhausted its retry ceiling
    ItemDropped {
        /// Content id
        content_id: ContentId,
        /// Work item id
        item: String,
        /// Error message of the last attempt
        error: String,
    },

    /// A content id finished downloading
    ContentFinished {
        /// Content id
        content_id: ContentId,
        /// Items handled
        done: usize,
        /// Items discovered
        total: usize,
    },

    /// A content id was abandoned (fatal crawl error)
    ContentFailed {
        /// Content id
        content_id: ContentId,
        /// Error message
        error: String,
    },

    /// All targets processed and the log appended
    SessionFinished {
        /// Content ids processed
        contents: usize,
    },
}
