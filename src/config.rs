//! Configuration types for comic-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// One entry of the download list.
///
/// Both id lists are whitespace separated, mirroring how they are typically pasted
/// from a browser. An entry with neither content ids nor album ids is ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTarget {
    /// Content ids (one chapter/gallery each), separated by whitespace
    #[serde(default)]
    pub comic_ids: String,

    /// Optional sub-directory of the download root (exact name or name prefix)
    #[serde(default)]
    pub sub_dir: String,

    /// Album ids; each album expands into its linked content ids
    #[serde(default)]
    pub album_pages: String,
}

impl DownloadTarget {
    /// Content ids of this target, in configured order
    pub fn comic_id_list(&self) -> Vec<String> {
        split_ids(&self.comic_ids)
    }

    /// Album ids of this target, in configured order
    pub fn album_id_list(&self) -> Vec<String> {
        split_ids(&self.album_pages)
    }

    /// True if the target names nothing to download
    pub fn is_empty(&self) -> bool {
        self.comic_id_list().is_empty() && self.album_id_list().is_empty()
    }
}

fn split_ids(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

/// HTTP client settings shared by every request of a run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Proxy address applied to all requests (e.g. "http://localhost:8888")
    #[serde(default)]
    pub proxy: Option<String>,

    /// Request headers as `key: value` lines, as copied from browser dev tools
    #[serde(default)]
    pub headers: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_ms_serde")]
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            headers: String::new(),
            timeout: default_request_timeout(),
        }
    }
}

/// Retry configuration for a single fetch
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts including the first one (default: 10)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts (default: 100 ms)
    #[serde(default = "default_initial_delay", with = "duration_ms_serde")]
    pub initial_delay: Duration,

    /// Applied to the delay once more than half the attempts are used (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Worker pool behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of concurrent workers per content id (default: 5)
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Download again even if the destination file exists (default: false)
    #[serde(default)]
    pub redownload: bool,

    /// Attempts per work item before it is dropped (default: 3)
    #[serde(default = "default_item_retry_ceiling")]
    pub item_retry_ceiling: u32,

    /// Pause after each completed item (default: 100 ms)
    #[serde(default = "default_item_delay", with = "duration_ms_serde")]
    pub item_delay: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            redownload: false,
            item_retry_ceiling: default_item_retry_ceiling(),
            item_delay: default_item_delay(),
        }
    }
}

/// Page chain walking limits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Hard cap on pages visited for one content id (default: 500)
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Pause before re-fetching a later page that failed to parse (default: 1 second)
    #[serde(default = "default_parse_retry_pause", with = "duration_ms_serde")]
    pub parse_retry_pause: Duration,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            parse_retry_pause: default_parse_retry_pause(),
        }
    }
}

/// Image descrambling ("reduction") settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReductionConfig {
    /// Descramble downloaded images (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// First content id whose images are scrambled (default: 223301)
    #[serde(default = "default_activation_threshold")]
    pub activation_threshold: u64,

    /// First content id using hashed per-page column counts (default: 268850)
    #[serde(default = "default_hashed_columns_threshold")]
    pub hashed_columns_threshold: u64,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            activation_threshold: default_activation_threshold(),
            hashed_columns_threshold: default_hashed_columns_threshold(),
        }
    }
}

/// Main configuration for a download run
///
/// Every field has a default, so an empty JSON object is a valid (if useless) config.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Site base URL; content pages live at `{endpoint}/photo/{id}`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Download root directory (default: "downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Append-only JSON-lines session log (default: "comic-dl.log")
    #[serde(default = "default_log_file_path")]
    pub log_file_path: PathBuf,

    /// What to download
    #[serde(default)]
    pub targets: Vec<DownloadTarget>,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Per-fetch retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Worker pool settings
    #[serde(default)]
    pub pool: PoolConfig,

    /// Crawl limits
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Descrambling settings
    #[serde(default)]
    pub reduction: ReductionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            download_dir: default_download_dir(),
            log_file_path: default_log_file_path(),
            targets: Vec::new(),
            http: HttpConfig::default(),
            retry: RetryConfig::default(),
            pool: PoolConfig::default(),
            crawl: CrawlConfig::default(),
            reduction: ReductionConfig::default(),
        }
    }
}

impl Config {
    /// Load and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {e}", path.display()),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the downloader cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::config("endpoint", "endpoint must not be empty"));
        }
        url::Url::parse(&self.endpoint).map_err(|e| {
            Error::config("endpoint", format!("invalid endpoint {}: {e}", self.endpoint))
        })?;
        if let Some(proxy) = &self.http.proxy {
            url::Url::parse(proxy)
                .map_err(|e| Error::config("http.proxy", format!("invalid proxy {proxy}: {e}")))?;
        }
        if self.pool.worker_count == 0 {
            return Err(Error::config("pool.worker_count", "need at least one worker"));
        }
        if self.pool.item_retry_ceiling == 0 {
            return Err(Error::config(
                "pool.item_retry_ceiling",
                "item retry ceiling must be at least 1",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config(
                "retry.max_attempts",
                "at least one fetch attempt is required",
            ));
        }
        if self.crawl.max_pages == 0 {
            return Err(Error::config("crawl.max_pages", "page cap must be at least 1"));
        }
        Ok(())
    }

    /// URL of a content (chapter) page
    pub fn content_url(&self, content_id: &str) -> String {
        format!("{}/photo/{}", self.endpoint.trim_end_matches('/'), content_id)
    }

    /// URL of an album page
    pub fn album_url(&self, album_id: &str) -> String {
        format!("{}/album/{}", self.endpoint.trim_end_matches('/'), album_id)
    }
}

// Default value functions
fn default_endpoint() -> String {
    "https://example.com".to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_log_file_path() -> PathBuf {
    PathBuf::from("comic-dl.log")
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_worker_count() -> usize {
    5
}

fn default_item_retry_ceiling() -> u32 {
    3
}

fn default_item_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_max_pages() -> usize {
    500
}

fn default_parse_retry_pause() -> Duration {
    Duration::from_secs(1)
}

fn default_true() -> bool {
    true
}

fn default_activation_threshold() -> u64 {
    223_301
}

fn default_hashed_columns_threshold() -> u64 {
    268_850
}

// Durations are written as integer milliseconds
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
