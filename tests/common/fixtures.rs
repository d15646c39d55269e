//! Page and image fixtures served by the mock gallery

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// PNG whose pixel values equal their row index
pub fn row_indexed_png(width: u32, height: u32) -> Vec<u8> {
    let image = GrayImage::from_fn(width, height, |_, y| Luma([y as u8]));
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Value of the first pixel of every row of a saved grayscale image
pub fn row_values(path: &Path) -> Vec<u8> {
    let image = image::open(path).unwrap().to_luma8();
    (0..image.height()).map(|y| image.get_pixel(0, y)[0]).collect()
}

/// Gallery page markup; `entries` are `(id, src)` in document order
pub fn gallery_page(title: &str, entries: &[(&str, &str)], next: Option<&str>) -> String {
    let entries: String = entries
        .iter()
        .map(|(id, src)| {
            format!(
                r#"<div class="center scramble-page" id="{id}"><img data-original="{src}" src="loading.gif"/></div>"#
            )
        })
        .collect();
    let next = next
        .map(|href| format!(r#"<a class="prevnext" href="{href}">Next page</a>"#))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html><html><head><title>{title}</title></head><body>
<div class="panel panel-default">
<div class="panel-heading"><div class="pull-left">{title}</div></div>
<div class="panel-body">{entries}</div>
</div>
<div class="pagination">{next}</div>
</body></html>"#
    )
}

/// Mount a page at `page_path`, optionally only for `?page=<n>`
pub async fn mount_page(server: &MockServer, page_path: &str, page: Option<&str>, html: String) {
    let response = ResponseTemplate::new(200).set_body_string(html);
    let mock = match page {
        Some(n) => Mock::given(method("GET"))
            .and(path(page_path))
            .and(query_param("page", n))
            .respond_with(response)
            .with_priority(1),
        None => Mock::given(method("GET"))
            .and(path(page_path))
            .respond_with(response),
    };
    mock.mount(server).await;
}

/// Mount an image expected to be fetched exactly `times` times
pub async fn mount_image(server: &MockServer, image_path: &str, body: Vec<u8>, times: u64) {
    Mock::given(method("GET"))
        .and(path(image_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(times)
        .mount(server)
        .await;
}

/// Config JSON for a run against `endpoint`, rooted in `root`
pub fn config_json(endpoint: &str, root: &Path, comic_ids: &str) -> serde_json::Value {
    json!({
        "endpoint": endpoint,
        "download_dir": root.join("downloads"),
        "log_file_path": root.join("comic-dl.log"),
        "targets": [{ "comic_ids": comic_ids, "sub_dir": "", "album_pages": "" }],
        "http": {
            "headers": "Referer: https://gallery.test/\nAccept: image/webp,*/*\nnot a header line",
            "timeout": 5000
        },
        "retry": { "max_attempts": 1, "initial_delay": 1 },
        "pool": { "worker_count": 3, "item_delay": 1 },
        "crawl": { "parse_retry_pause": 1 }
    })
}
