//! End-to-end runs against a mock gallery served by wiremock
//!
//! Each test writes a JSON config into a temp dir, loads it the way the binary does,
//! and drives a full session over real HTTP.

mod common;

use common::{config_json, gallery_page, mount_image, mount_page, row_indexed_png, row_values};
use comic_dl::{Config, Downloader, Error, SessionLog};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_config(dir: &TempDir, value: &serde_json::Value) -> std::path::PathBuf {
    let config_path = dir.path().join("comic-dl.json");
    std::fs::write(&config_path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
    config_path
}

async fn mount_two_page_chapter(server: &MockServer) {
    mount_page(
        server,
        "/photo/300001",
        None,
        gallery_page(
            "Vol.1 Start",
            &[("00001.png", "/media/photos/300001/00001.png")],
            Some("?page=2"),
        ),
    )
    .await;
    mount_page(
        server,
        "/photo/300001",
        Some("2"),
        gallery_page(
            "Vol.1 Start (page 2)",
            &[
                ("00002.png", "/media/photos/300001/00002.png"),
                ("00003.png", "/media/photos/300001/00003.png"),
            ],
            None,
        ),
    )
    .await;
}

#[tokio::test]
async fn test_full_session_downloads_descrambles_and_logs() {
    let server = MockServer::start().await;
    mount_two_page_chapter(&server).await;
    // written once, then skipped on the second run
    mount_image(&server, "/media/photos/300001/00001.png", row_indexed_png(3, 40), 1).await;
    mount_image(&server, "/media/photos/300001/00002.png", row_indexed_png(3, 40), 1).await;
    // dropped after three attempts, in each of the two runs
    Mock::given(method("GET"))
        .and(path("/media/photos/300001/00003.png"))
        .respond_with(ResponseTemplate::new(500))
        .expect(6)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(&dir, &config_json(&server.uri(), dir.path(), "300001"));

    let config = Config::from_file(&config_path).unwrap();
    let records = Downloader::new(config.clone()).unwrap().run().await.unwrap();

    let chapter = dir.path().join("downloads").join("Vol.1 Start");
    // page 00001 of 300001 uses 20 bands of 2 rows
    assert_eq!(row_values(&chapter.join("00001.png"))[..4], [38, 39, 36, 37]);
    // page 00002 uses 18 bands: 6 rows on top, then 2 per band
    assert_eq!(row_values(&chapter.join("00002.png"))[..8], [34, 35, 36, 37, 38, 39, 32, 33]);
    assert!(!chapter.join("00003.png").exists());

    assert_eq!(records.len(), 1);
    let content = &records[0].contents[0];
    assert_eq!(content.page_count, 2);
    assert_eq!(content.item_count, 3);
    assert_eq!(content.done, 2);
    assert_eq!(content.dropped, 1);

    // second run: images on disk are not fetched again
    let again = Downloader::new(config.clone()).unwrap().run().await.unwrap();
    assert_eq!(again[0].contents[0].done, 2);

    let logged = SessionLog::new(&config.log_file_path).read_all().await.unwrap();
    assert_eq!(logged.len(), 2);
    assert_eq!(logged[0].comic_ids, vec!["300001"]);
    assert_eq!(logged[0].contents[0].title, "Vol.1 Start");
}

#[tokio::test]
async fn test_low_content_id_is_saved_unchanged() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/photo/1200",
        None,
        gallery_page("Old: Chapter?", &[("00001.png", "/img/1200/00001.png")], None),
    )
    .await;
    mount_image(&server, "/img/1200/00001.png", row_indexed_png(3, 40), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(&dir, &config_json(&server.uri(), dir.path(), "1200"));
    let config = Config::from_file(&config_path).unwrap();

    Downloader::new(config).unwrap().run().await.unwrap();

    let saved = dir.path().join("downloads").join("Old Chapter").join("00001.png");
    assert_eq!(std::fs::read(saved).unwrap(), row_indexed_png(3, 40));
}

#[tokio::test]
async fn test_configured_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photo/1300"))
        .and(header("referer", "https://gallery.test/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(gallery_page(
            "With Headers",
            &[("00001.png", "/img/1300/00001.png")],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/1300/00001.png"))
        .and(header("referer", "https://gallery.test/"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(row_indexed_png(2, 4)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(&dir, &config_json(&server.uri(), dir.path(), "1300"));
    let config = Config::from_file(&config_path).unwrap();

    let records = Downloader::new(config).unwrap().run().await.unwrap();

    assert_eq!(records[0].contents[0].done, 1);
}

#[tokio::test]
async fn test_missing_chapter_does_not_stop_the_run() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/photo/1400",
        None,
        gallery_page("Present", &[("00001.png", "/img/1400/00001.png")], None),
    )
    .await;
    mount_image(&server, "/img/1400/00001.png", row_indexed_png(2, 4), 1).await;

    let dir = tempfile::tempdir().unwrap();
    // 1399 is not served at all
    let config_path = write_config(&dir, &config_json(&server.uri(), dir.path(), "1399 1400"));
    let config = Config::from_file(&config_path).unwrap();

    let records = Downloader::new(config).unwrap().run().await.unwrap();

    assert_eq!(records[0].contents.len(), 1);
    assert_eq!(records[0].contents[0].title, "Present");
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut value = config_json("https://gallery.test", dir.path(), "1");
    value["pool"]["worker_count"] = serde_json::json!(0);
    let config_path = write_config(&dir, &value);

    match Config::from_file(&config_path) {
        Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("pool.worker_count")),
        other => panic!("expected config error, got: {other:?}"),
    }
}
