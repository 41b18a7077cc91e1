//! Integration tests for the JSON fetch loops.
//!
//! wiremock stands in for the Shopee and Tiki endpoints so the full
//! search → detail → checkpoint cycle can run offline.

use std::fs;
use std::path::Path;

use listing_scout::scrapers::{ShopeeConfig, ShopeeScraper, TikiConfig, TikiScraper};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn shopee_config(server: &MockServer, out_dir: &Path) -> ShopeeConfig {
    ShopeeConfig {
        search_api: format!("{}/api/v4/search/search_items", server.uri()),
        detail_api: format!("{}/api/v4/item/get", server.uri()),
        referer_base: server.uri(),
        sleep_range: (0.0, 0.0),
        checkpoint_every: 1,
        out_dir: out_dir.to_path_buf(),
        ..ShopeeConfig::default()
    }
}

fn tiki_config(server: &MockServer) -> TikiConfig {
    TikiConfig {
        api_url: format!("{}/api/v2/products", server.uri()),
        pages: 3,
        sleep_range: (0.0, 0.0),
        ..TikiConfig::default()
    }
}

fn search_items(pairs: &[(u64, u64)]) -> serde_json::Value {
    json!({
        "items": pairs
            .iter()
            .map(|(itemid, shopid)| json!({"item_basic": {"itemid": itemid, "shopid": shopid}}))
            .collect::<Vec<_>>()
    })
}

async fn mount_search(server: &MockServer, offset: u32, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/v4/search/search_items"))
        .and(query_param("newest", offset.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, itemid: u64, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api/v4/item/get"))
        .and(query_param("itemid", itemid.to_string()))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn shopee_two_phase_run_collects_details_and_checkpoints() {
    let server = MockServer::start().await;
    let out_dir = tempfile::tempdir().unwrap();

    mount_search(&server, 0, search_items(&[(1, 11), (2, 22)])).await;
    mount_search(&server, 60, json!({"items": []})).await;

    mount_detail(
        &server,
        1,
        ResponseTemplate::new(200).set_body_json(json!({
            "item": {
                "name": "Áo khoác dù",
                "price": 12_300_000,
                "attributes": [
                    {"name": "Brand", "value": "First"},
                    {"name": "Brand", "value": "Second"}
                ]
            }
        })),
    )
    .await;
    mount_detail(
        &server,
        2,
        ResponseTemplate::new(200).set_body_json(json!({
            "item": {"name": "Áo thun", "price": 9_900_000}
        })),
    )
    .await;

    let scraper = ShopeeScraper::with_config(shopee_config(&server, out_dir.path())).unwrap();
    let rows = scraper.fetch_products("ao khoac", &[0, 60]).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].itemid, 1);
    assert_eq!(rows[0].price, 123.0);
    assert_eq!(rows[0].attributes.get("Brand"), Some(&json!("Second")));
    assert_eq!(rows[1].itemid, 2);

    let checkpoint = out_dir.path().join("shopee_ao_khoac_checkpoint.csv");
    let bytes = fs::read(&checkpoint).unwrap();
    assert!(bytes.starts_with(b"\xef\xbb\xbf"));
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("Brand"));
    assert!(text.contains("Second"));
}

#[tokio::test]
async fn shopee_failed_detail_skips_only_that_pair() {
    let server = MockServer::start().await;
    let out_dir = tempfile::tempdir().unwrap();

    mount_search(&server, 0, search_items(&[(1, 11), (2, 22), (3, 33)])).await;
    mount_detail(
        &server,
        1,
        ResponseTemplate::new(200).set_body_json(json!({"item": {"name": "a"}})),
    )
    .await;
    mount_detail(&server, 2, ResponseTemplate::new(500)).await;
    mount_detail(
        &server,
        3,
        ResponseTemplate::new(200).set_body_json(json!({"item": {"name": "c"}})),
    )
    .await;

    let scraper = ShopeeScraper::with_config(shopee_config(&server, out_dir.path())).unwrap();
    let rows = scraper.fetch_products("tv", &[0]).await.unwrap();

    let itemids: Vec<u64> = rows.iter().map(|r| r.itemid).collect();
    assert_eq!(itemids, vec![1, 3]);
}

#[tokio::test]
async fn shopee_run_with_no_pairs_is_fatal() {
    let server = MockServer::start().await;
    let out_dir = tempfile::tempdir().unwrap();

    mount_search(&server, 0, json!({"items": [], "error_msg": "invalid cookie"})).await;
    mount_search(&server, 60, json!({"items": []})).await;

    let scraper = ShopeeScraper::with_config(shopee_config(&server, out_dir.path())).unwrap();
    let result = scraper.fetch_products("tv", &[0, 60]).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn shopee_failed_search_offset_is_skipped() {
    let server = MockServer::start().await;
    let out_dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/v4/search/search_items"))
        .and(query_param("newest", "0"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_search(&server, 60, search_items(&[(5, 55)])).await;
    mount_detail(
        &server,
        5,
        ResponseTemplate::new(200).set_body_json(json!({"item": {"name": "e"}})),
    )
    .await;

    let scraper = ShopeeScraper::with_config(shopee_config(&server, out_dir.path())).unwrap();
    let rows = scraper.fetch_products("tv", &[0, 60]).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].itemid, 5);
}

#[tokio::test]
async fn tiki_failed_page_skips_only_that_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/products"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "id": 1,
                    "name": "Nồi chiên",
                    "price": 990_000,
                    "seller": {"id": 9, "name": "Tiki Trading"},
                    "badges": [{"code": "freeship"}]
                },
                {"id": 2, "name": "Bàn phím"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/products"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/products"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 3, "name": "Chuột"}]
        })))
        .mount(&server)
        .await;

    let scraper = TikiScraper::with_config(tiki_config(&server)).unwrap();
    let rows = scraper.fetch_products("phu kien").await.unwrap();

    let ids: Vec<Option<i64>> = rows.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);
    assert_eq!(rows[0].seller_name.as_deref(), Some("Tiki Trading"));
    assert_eq!(rows[0].badges, "freeship");
}
