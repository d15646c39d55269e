//! Shared test helpers for creating Downloader instances in tests.

use std::sync::Arc;
use std::time::Duration;

use tempfile::{TempDir, tempdir};

use crate::config::{Config, DownloadTarget};
use crate::downloader::Downloader;
use crate::fetcher::Fetch;

pub(crate) const ENDPOINT: &str = "https://gallery.test";

/// Config rooted in a fresh temp dir, with delays shrunk for tests
pub(crate) fn test_config() -> (Config, TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = Config::default();
    config.endpoint = ENDPOINT.to_string();
    config.download_dir = temp_dir.path().join("downloads");
    config.log_file_path = temp_dir.path().join("session.log");
    config.pool.item_delay = Duration::from_millis(1);
    config.crawl.parse_retry_pause = Duration::from_millis(1);
    config.retry.initial_delay = Duration::from_millis(1);
    std::fs::create_dir_all(&config.download_dir).unwrap();
    (config, temp_dir)
}

/// Downloader over `fetcher` with [`test_config`]
pub(crate) fn create_test_downloader(fetcher: Arc<dyn Fetch>) -> (Downloader, TempDir) {
    let (config, temp_dir) = test_config();
    (Downloader::with_fetcher(config, fetcher).unwrap(), temp_dir)
}

pub(crate) fn target(comic_ids: &str, sub_dir: &str, album_pages: &str) -> DownloadTarget {
    DownloadTarget {
        comic_ids: comic_ids.to_string(),
        sub_dir: sub_dir.to_string(),
        album_pages: album_pages.to_string(),
    }
}

pub(crate) fn content_url(id: &str) -> String {
    format!("{ENDPOINT}/photo/{id}")
}

pub(crate) fn image_url(content_id: &str, item: &str) -> String {
    format!("{ENDPOINT}/media/photos/{content_id}/{item}")
}
