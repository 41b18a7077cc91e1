//! Retailer scraper for Tiki's product-listing API.
//!
//! One GET per result page; each item payload is flattened into a fixed
//! record. Every nested accessor is total: an absent or wrong-typed
//! sub-object degrades to all-None columns instead of failing the item.

use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER};
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use crate::models::TikiProduct;
use crate::scrapers::{send_json, value_to_string};

const TIKI_API_URL: &str = "https://tiki.vn/api/v2/products";
const PRODUCT_BASE_URL: &str = "https://tiki.vn";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct TikiConfig {
    pub api_url: String,
    pub product_base_url: String,
    pub pages: u32,
    pub limit: u32,
    pub timeout: Duration,
    /// Min/max seconds slept between page requests.
    pub sleep_range: (f64, f64),
}

impl Default for TikiConfig {
    fn default() -> Self {
        Self {
            api_url: TIKI_API_URL.to_string(),
            product_base_url: PRODUCT_BASE_URL.to_string(),
            pages: 5,
            limit: 40,
            timeout: Duration::from_secs(20),
            sleep_range: (1.5, 3.0),
        }
    }
}

pub struct TikiScraper {
    client: Client,
    config: TikiConfig,
}

impl TikiScraper {
    pub fn new() -> Result<Self> {
        Self::with_config(TikiConfig::default())
    }

    pub fn with_config(config: TikiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(REFERER, HeaderValue::from_static("https://tiki.vn/"));

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Crawls pages 1..=N for a keyword. A failed page logs and is skipped;
    /// the run never fails outright.
    pub async fn fetch_products(&self, keyword: &str) -> Result<Vec<TikiProduct>> {
        let mut rows = Vec::new();

        for page in 1..=self.config.pages {
            let request = self.client.get(&self.config.api_url).query(&[
                ("q", keyword.to_string()),
                ("limit", self.config.limit.to_string()),
                ("page", page.to_string()),
            ]);

            let payload = match send_json(request).await {
                Ok(payload) => payload,
                Err(err) => {
                    warn!("Page {} failed: {}", page, err);
                    self.sleep_polite().await;
                    continue;
                }
            };

            let items = payload
                .get("data")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if items.is_empty() {
                warn!("No products returned for page {}", page);
            }
            for item in &items {
                rows.push(extract_product(item, &self.config.product_base_url));
            }

            self.sleep_polite().await;
        }

        Ok(rows)
    }

    async fn sleep_polite(&self) {
        let (min_s, max_s) = self.config.sleep_range;
        if max_s <= 0.0 {
            return;
        }
        let secs = rand::thread_rng().gen_range(min_s..=max_s);
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }
}

fn get_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn get_i64(value: &Value, key: &str) -> Option<i64> {
    value.get(key).and_then(Value::as_i64)
}

fn get_f64(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(Value::as_f64)
}

fn get_bool(value: &Value, key: &str) -> Option<bool> {
    value.get(key).and_then(Value::as_bool)
}

/// Coerces a sub-object to an object, or to an empty one when absent or
/// wrong-typed.
fn object_field(item: &Value, key: &str) -> Value {
    match item.get(key) {
        Some(value) if value.is_object() => value.clone(),
        _ => Value::Object(Default::default()),
    }
}

/// quantity_sold arrives either as a bare number or as {"value", "text"}.
fn quantity_sold(value: Option<&Value>) -> (Option<i64>, Option<String>) {
    match value {
        Some(Value::Object(map)) => (
            map.get("value").and_then(Value::as_i64),
            map.get("text").and_then(Value::as_str).map(str::to_string),
        ),
        Some(other) => (other.as_i64(), None),
        None => (None, None),
    }
}

/// impression_info is an object with a metadata key, or a list of such
/// objects; the first non-empty metadata object wins.
fn impression_metadata(impression_info: Option<&Value>) -> Value {
    match impression_info {
        Some(Value::Object(map)) => match map.get("metadata") {
            Some(metadata) if metadata.is_object() => metadata.clone(),
            _ => Value::Object(Default::default()),
        },
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| entry.get("metadata"))
            .find(|metadata| metadata.as_object().is_some_and(|m| !m.is_empty()))
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default())),
        _ => Value::Object(Default::default()),
    }
}

fn extract_category(item: &Value) -> (Option<i64>, Option<String>) {
    if let Some(category) = item.get("category").filter(|c| c.is_object()) {
        return (get_i64(category, "id"), get_str(category, "name"));
    }
    if let Some(first) = item
        .get("categories")
        .and_then(Value::as_array)
        .and_then(|list| list.first())
    {
        return (get_i64(first, "id"), get_str(first, "name"));
    }
    (None, None)
}

/// Reduces the badge list to a semicolon-joined string of codes (falling
/// back to titles). A malformed list yields an empty string.
fn extract_badges(item: &Value) -> String {
    let badges = match item.get("badges").and_then(Value::as_array) {
        Some(badges) => badges,
        None => return String::new(),
    };
    badges
        .iter()
        .filter_map(|badge| {
            badge
                .get("code")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .or_else(|| {
                    badge
                        .get("title")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                })
                .map(str::to_string)
        })
        .collect::<Vec<_>>()
        .join(";")
}

pub(crate) fn extract_product(item: &Value, base_url: &str) -> TikiProduct {
    let seller = object_field(item, "seller");
    let stock = object_field(item, "stock_item");
    let metadata = impression_metadata(item.get("impression_info"));
    let (category_id, category_name) = extract_category(item);
    let (quantity_sold, quantity_sold_text) = quantity_sold(item.get("quantity_sold"));
    let product_url = item
        .get("url_path")
        .and_then(Value::as_str)
        .map(|path| format!("{}/{}", base_url, path));

    TikiProduct {
        id: get_i64(item, "id"),
        product_id: get_i64(item, "product_id"),
        tiki_product_id: get_i64(item, "tiki_product_id"),
        seller_product_id: get_i64(item, "seller_product_id"),
        sku: get_str(item, "sku"),
        name: get_str(item, "name"),
        short_description: get_str(item, "short_description"),
        kind: get_str(item, "type"),
        brand_name: get_str(item, "brand_name"),
        brand_id: get_i64(item, "brand_id"),
        price: get_f64(item, "price"),
        list_price: get_f64(item, "list_price"),
        original_price: get_f64(item, "original_price"),
        market_price: get_f64(item, "market_price"),
        discount: get_f64(item, "discount"),
        discount_rate: get_f64(item, "discount_rate"),
        rating_average: get_f64(item, "rating_average"),
        review_count: get_i64(item, "review_count"),
        quantity_sold,
        quantity_sold_text,
        is_official_store: get_bool(&metadata, "is_official_store"),
        is_freeship: get_bool(item, "is_freeship").or_else(|| get_bool(item, "is_free_ship")),
        inventory_status: get_str(item, "inventory_status"),
        is_tikinow: get_bool(item, "is_tikinow"),
        tikinow_time: item.get("tikinow_time").and_then(value_to_string),
        thumbnail_url: get_str(item, "thumbnail_url"),
        product_url,
        badges: extract_badges(item),
        seller_id: get_i64(item, "seller_id").or_else(|| get_i64(&seller, "id")),
        seller_name: get_str(item, "seller_name").or_else(|| get_str(&seller, "name")),
        seller_type: get_str(&seller, "seller_type"),
        seller_logo: get_str(&seller, "logo"),
        seller_rating: get_f64(&seller, "average_rating"),
        seller_reviews: get_i64(&seller, "review_count"),
        seller_followers: get_i64(&seller, "followers"),
        category_id,
        category_name,
        stock_qty: get_i64(&stock, "qty"),
        stock_available: get_bool(&stock, "available"),
        stock_preorder: get_bool(&stock, "preorder"),
        stock_min_sale_qty: get_i64(&stock, "min_sale_qty"),
        stock_max_sale_qty: get_i64(&stock, "max_sale_qty"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_sub_objects_and_badges() {
        let item = json!({
            "id": 101,
            "name": "Nồi chiên không dầu",
            "type": "simple",
            "price": 1_290_000,
            "rating_average": 4.6,
            "quantity_sold": {"value": 812, "text": "Đã bán 812"},
            "url_path": "noi-chien-khong-dau-p101.html",
            "impression_info": [{"metadata": {"is_official_store": true}}],
            "seller": {
                "id": 9,
                "name": "Tiki Trading",
                "seller_type": "trusted",
                "average_rating": 4.9,
                "review_count": 1200,
                "followers": 50_000
            },
            "category": {"id": 44, "name": "Gia dụng"},
            "stock_item": {"qty": 35, "available": true, "preorder": false,
                           "min_sale_qty": 1, "max_sale_qty": 5},
            "badges": [
                {"code": "freeship"},
                {"title": "Hàng chính hãng"},
                "bogus-entry"
            ]
        });

        let product = extract_product(&item, "https://tiki.vn");
        assert_eq!(product.id, Some(101));
        assert_eq!(product.kind.as_deref(), Some("simple"));
        assert_eq!(product.quantity_sold, Some(812));
        assert_eq!(product.quantity_sold_text.as_deref(), Some("Đã bán 812"));
        assert_eq!(product.is_official_store, Some(true));
        assert_eq!(
            product.product_url.as_deref(),
            Some("https://tiki.vn/noi-chien-khong-dau-p101.html")
        );
        assert_eq!(product.seller_id, Some(9));
        assert_eq!(product.seller_name.as_deref(), Some("Tiki Trading"));
        assert_eq!(product.category_id, Some(44));
        assert_eq!(product.stock_qty, Some(35));
        assert_eq!(product.stock_available, Some(true));
        assert_eq!(product.badges, "freeship;Hàng chính hãng");
    }

    #[test]
    fn malformed_sub_objects_degrade_to_none() {
        let item = json!({
            "id": 7,
            "seller": "not an object",
            "stock_item": 5,
            "badges": "not a list",
            "quantity_sold": 42,
            "impression_info": {"metadata": "bogus"},
            "categories": []
        });

        let product = extract_product(&item, "https://tiki.vn");
        assert_eq!(product.id, Some(7));
        assert_eq!(product.seller_name, None);
        assert_eq!(product.stock_qty, None);
        assert_eq!(product.badges, "");
        assert_eq!(product.quantity_sold, Some(42));
        assert_eq!(product.quantity_sold_text, None);
        assert_eq!(product.is_official_store, None);
        assert_eq!(product.product_url, None);
    }

    #[test]
    fn category_falls_back_to_categories_list() {
        let item = json!({"categories": [{"id": 3, "name": "Sách"}]});
        let product = extract_product(&item, "https://tiki.vn");
        assert_eq!(product.category_id, Some(3));
        assert_eq!(product.category_name.as_deref(), Some("Sách"));
    }
}
