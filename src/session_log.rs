//! Append-only JSON-lines record of finished download targets.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::types::ContentReport;

/// What one download target produced
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// When the target started
    pub time: DateTime<Local>,
    /// Content ids as configured
    pub comic_ids: Vec<String>,
    /// Album ids as configured
    pub album_ids: Vec<String>,
    /// Configured sub-directory (prefix) before redirect resolution
    pub sub_dir: String,
    /// Resolved destination directory
    pub dest: PathBuf,
    /// Workers per content session
    pub worker_count: usize,
    /// One report per content id that was crawled successfully
    pub contents: Vec<ContentReport>,
}

impl SessionRecord {
    /// Work items discovered across all contents
    pub fn item_count(&self) -> usize {
        self.contents.iter().map(|c| c.item_count).sum()
    }
}

/// Session log file
#[derive(Clone, Debug)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    /// Log at `path`; the file is created on first append
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line per record that discovered any work
    ///
    /// Returns the number of lines written.
    pub async fn append(&self, records: &[SessionRecord]) -> Result<usize> {
        let mut lines = String::new();
        let mut written = 0;
        for record in records.iter().filter(|r| r.item_count() > 0) {
            lines.push_str(&serde_json::to_string(record)?);
            lines.push('\n');
            written += 1;
        }
        if written == 0 {
            return Ok(0);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(lines.as_bytes()).await?;
        file.flush().await?;

        tracing::info!(path = %self.path.display(), records = written, "Session log updated");
        Ok(written)
    }

    /// Read every record back; a missing file reads as empty
    pub async fn read_all(&self) -> Result<Vec<SessionRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str::<SessionRecord>(line).map_err(Error::from))
            .collect()
    }
}
