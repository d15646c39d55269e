//! Shared test helpers: in-memory fetchers and page/image builders.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::fetcher::Fetch;

/// [`Fetch`] serving canned bodies by URL and counting calls.
///
/// Unknown URLs answer with a 404 status error, like a real server after the
/// retry budget is spent.
#[derive(Default)]
pub(crate) struct MapFetcher {
    bodies: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MapFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Always answer `url` with `body`
    pub(crate) fn with(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), vec![body.into()]);
        self
    }

    /// Answer `url` with each body in turn; the last one repeats
    pub(crate) fn with_sequence(self, url: &str, bodies: Vec<Vec<u8>>) -> Self {
        self.bodies.lock().unwrap().insert(url.to_string(), bodies);
        self
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait::async_trait]
impl Fetch for MapFetcher {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(url.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        let bodies = self.bodies.lock().unwrap();
        match bodies.get(url) {
            Some(seq) if !seq.is_empty() => Ok(seq[(call - 1).min(seq.len() - 1)].clone()),
            _ => Err(Error::HttpStatus {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

/// [`Fetch`] that never answers until cancelled
pub(crate) struct StallingFetcher;

#[async_trait::async_trait]
impl Fetch for StallingFetcher {
    async fn fetch(&self, _url: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        cancel.cancelled().await;
        Err(Error::Cancelled)
    }
}

/// PNG whose pixel values equal their row index
pub(crate) fn row_indexed_png(width: u32, height: u32) -> Vec<u8> {
    let image = GrayImage::from_fn(width, height, |_, y| Luma([y as u8]));
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Gallery page in the layout the crawler understands
///
/// `entries` are `(id, image src)` pairs in document order.
pub(crate) fn gallery_page(title: &str, entries: &[(&str, &str)], next: Option<&str>) -> String {
    let entries: String = entries
        .iter()
        .map(|(id, src)| {
            format!(
                r#"<div class="center scramble-page" id="{id}"><img src="blank.gif" data-original="{src}"></div>"#
            )
        })
        .collect();
    let next = next
        .map(|href| format!(r#"<a class="prevnext" href="{href}">Next</a>"#))
        .unwrap_or_default();
    format!(
        r#"<html><head><title>{title} - site</title></head><body>
<div class="panel panel-default">
  <div class="panel-heading"><div class="pull-left">{title}</div></div>
  <div class="panel-body">{entries}</div>
</div>
{next}
</body></html>"#
    )
}

/// Album page linking to the given content ids
pub(crate) fn album_page(title: &str, content_ids: &[&str]) -> String {
    let links: String = content_ids
        .iter()
        .map(|id| format!(r#"<li><a href="/photo/{id}">Chapter {id}</a></li>"#))
        .collect();
    format!(
        r#"<html><head><title>{title}</title></head><body><ul class="btn-toolbar">{links}</ul></body></html>"#
    )
}
