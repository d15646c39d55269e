//! Paginated gallery crawling.
//!
//! A content id is served as a chain of pages. Each page carries a batch of image
//! entries, the gallery title and (except the last) a link to the next page. The
//! whole chain is walked before any image is downloaded.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use scraper::{ElementRef, Html, Selector};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::CrawlConfig;
use crate::error::{Error, Result};
use crate::fetcher::Fetch;
use crate::types::{ContentId, Event, WorkItem};
use crate::utils::sanitize_title;

#[allow(clippy::expect_used)]
fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

static PANEL: LazyLock<Selector> = LazyLock::new(|| selector("div.panel-body"));
static ENTRY: LazyLock<Selector> = LazyLock::new(|| selector("div.center.scramble-page"));
static ENTRY_IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("img"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("div.panel-heading div.pull-left"));
static NEXT_PAGE: LazyLock<Selector> = LazyLock::new(|| selector("a.prevnext"));
static ALBUM_LINKS: LazyLock<Selector> = LazyLock::new(|| selector("ul.btn-toolbar"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a"));
static DOC_TITLE: LazyLock<Selector> = LazyLock::new(|| selector("title"));

/// One parsed gallery page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedPage {
    /// Entries in download order (reverse of document order)
    pub items: Vec<WorkItem>,
    /// Sanitized title
    pub title: String,
    /// Absolute URL of the next page, if any
    pub next: Option<Url>,
}

/// Everything learned about one content id
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrawlResult {
    /// Sanitized title (directory name)
    pub title: String,
    /// Directory the images go to; created by the crawl
    pub dest_path: PathBuf,
    /// All entries of all pages
    pub items: Vec<WorkItem>,
    /// Pages visited
    pub page_count: usize,
}

/// Content ids linked from an album page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlbumPage {
    /// Sanitized document title; empty if the page has none
    pub title: String,
    /// Linked content ids in page order, without duplicates
    pub content_ids: Vec<ContentId>,
}

/// Entry ids and titles become single path components under the download root
pub(crate) fn is_plain_file_name(id: &str) -> bool {
    id != "." && id != ".." && !id.contains(['/', '\\'])
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// Parse a gallery page
///
/// Fails if the content panel or the title heading is missing. Entries without an
/// id or image source are skipped.
pub fn parse_page(html: &str, page_url: &Url) -> Result<ParsedPage> {
    let document = Html::parse_document(html);

    let panel = document
        .select(&PANEL)
        .next()
        .ok_or_else(|| Error::parse(page_url.as_str(), "missing content panel"))?;

    let mut items = Vec::new();
    for entry in panel.select(&ENTRY) {
        let Some(id) = entry.value().attr("id").map(str::trim).filter(|id| !id.is_empty()) else {
            tracing::warn!(url = %page_url, "Skipping entry without id");
            continue;
        };
        if !is_plain_file_name(id) {
            tracing::warn!(url = %page_url, entry = id, "Skipping entry whose id is not a file name");
            continue;
        }
        let Some(src) = entry
            .select(&ENTRY_IMAGE)
            .find_map(|img| img.value().attr("data-original"))
        else {
            tracing::warn!(url = %page_url, entry = id, "Skipping entry without image source");
            continue;
        };
        match page_url.join(src.trim()) {
            Ok(image_url) => items.push(WorkItem::new(id, image_url.as_str())),
            Err(e) => {
                tracing::warn!(url = %page_url, entry = id, error = %e, "Skipping entry with bad image URL");
            }
        }
    }
    // pages list entries in display order; downloads go the other way
    items.reverse();

    let title = document
        .select(&TITLE)
        .next()
        .map(text_of)
        .ok_or_else(|| Error::parse(page_url.as_str(), "missing title heading"))?;

    let next = document
        .select(&NEXT_PAGE)
        .next()
        .and_then(|link| link.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .and_then(|href| page_url.join(href).ok());

    Ok(ParsedPage {
        items,
        title: sanitize_title(&title),
        next,
    })
}

/// Parse an album page into its linked content ids
pub fn parse_album(html: &str, page_url: &Url) -> Result<AlbumPage> {
    let document = Html::parse_document(html);

    let toolbar = document
        .select(&ALBUM_LINKS)
        .next()
        .ok_or_else(|| Error::parse(page_url.as_str(), "missing album chapter list"))?;

    let mut seen = HashSet::new();
    let content_ids = toolbar
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| ContentId::from_url(href.trim()))
        .filter(|id| !id.as_str().is_empty())
        .filter(|id| seen.insert(id.clone()))
        .collect();

    let title = document
        .select(&DOC_TITLE)
        .next()
        .map(|t| sanitize_title(&text_of(t)))
        .unwrap_or_default();

    Ok(AlbumPage { title, content_ids })
}

/// Walks page chains through a shared [`Fetch`]
pub struct Crawler {
    fetcher: Arc<dyn Fetch>,
    config: CrawlConfig,
    cancel: CancellationToken,
    event_tx: broadcast::Sender<Event>,
}

impl Crawler {
    /// Create a crawler
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        config: CrawlConfig,
        cancel: CancellationToken,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            fetcher,
            config,
            cancel,
            event_tx,
        }
    }

    /// Walk the page chain of one content id starting at `start_url`
    ///
    /// The title of the first page names the destination directory under
    /// `dest_root`, which is created. A URL seen before in this chain is treated as
    /// the end of the chain, and at most `max_pages` pages are visited.
    ///
    /// # Errors
    /// Any failure on the first page; a fetch failure or a repeated parse failure on
    /// a later page; cancellation.
    pub async fn crawl(
        &self,
        content_id: &ContentId,
        start_url: &str,
        dest_root: &Path,
    ) -> Result<CrawlResult> {
        self.event_tx
            .send(Event::CrawlStarted {
                content_id: content_id.clone(),
                url: start_url.to_string(),
            })
            .ok();

        let mut visited: HashSet<Url> = HashSet::new();
        let mut next = Some(Url::parse(start_url)?);
        let mut items = Vec::new();
        let mut title: Option<String> = None;
        let mut page_count = 0;

        while let Some(url) = next.take() {
            if page_count >= self.config.max_pages {
                tracing::warn!(
                    content_id = %content_id,
                    max_pages = self.config.max_pages,
                    "Page cap reached, stopping crawl"
                );
                break;
            }
            if !visited.insert(url.clone()) {
                tracing::warn!(content_id = %content_id, url = %url, "Next page already visited, stopping crawl");
                break;
            }

            let page = self.fetch_page(&url, page_count == 0).await?;
            page_count += 1;

            tracing::debug!(
                content_id = %content_id,
                page = page_count,
                items = page.items.len(),
                has_next = page.next.is_some(),
                "Parsed page"
            );
            self.event_tx
                .send(Event::PageCrawled {
                    content_id: content_id.clone(),
                    page: page_count,
                    items: page.items.len(),
                })
                .ok();

            items.extend(page.items);
            if title.is_none() {
                title = Some(page.title);
            }
            next = page.next;
        }

        let title = title
            .filter(|t| is_plain_file_name(t) && !t.is_empty())
            .unwrap_or_else(|| content_id.to_string());
        let dest_path = dest_root.join(&title);
        tokio::fs::create_dir_all(&dest_path).await?;

        tracing::info!(
            content_id = %content_id,
            title = %title,
            path = %dest_path.display(),
            pages = page_count,
            items = items.len(),
            "Crawl finished"
        );

        Ok(CrawlResult {
            title,
            dest_path,
            items,
            page_count,
        })
    }

    /// Fetch and parse a page; later pages get one more chance after a pause
    async fn fetch_page(&self, url: &Url, first: bool) -> Result<ParsedPage> {
        let body = self.fetcher.fetch(url.as_str(), &self.cancel).await?;
        match parse_page(&String::from_utf8_lossy(&body), url) {
            Ok(page) => Ok(page),
            Err(e) if first => Err(e),
            Err(e) => {
                tracing::warn!(
                    url = %url,
                    error = %e,
                    pause_ms = self.config.parse_retry_pause.as_millis(),
                    "Page did not parse, retrying once"
                );
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(self.config.parse_retry_pause) => {}
                }
                let body = self.fetcher.fetch(url.as_str(), &self.cancel).await?;
                parse_page(&String::from_utf8_lossy(&body), url)
            }
        }
    }

    /// Fetch an album page and list its content ids
    pub async fn discover_album(&self, album_url: &str) -> Result<AlbumPage> {
        let url = Url::parse(album_url)?;
        let body = self.fetcher.fetch(url.as_str(), &self.cancel).await?;
        let album = parse_album(&String::from_utf8_lossy(&body), &url)?;
        tracing::info!(
            url = album_url,
            title = %album.title,
            chapters = album.content_ids.len(),
            "Album discovered"
        );
        Ok(album)
    }
}
