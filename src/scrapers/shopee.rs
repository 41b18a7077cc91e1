//! Marketplace scraper for Shopee's search and detail APIs.
//!
//! Two-phase pipeline: the search endpoint yields (itemid, shopid) pairs per
//! pagination offset, then the detail endpoint is queried per pair. A failed
//! request at either phase skips that unit of work; only a run that finds no
//! pairs at all is fatal.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER};
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::export;
use crate::models::ShopeeProduct;
use crate::scrapers::{send_json, value_to_string};

const SEARCH_API: &str = "https://shopee.vn/api/v4/search/search_items";
const DETAIL_API: &str = "https://shopee.vn/api/v4/item/get";
const REFERER_BASE: &str = "https://shopee.vn";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/144.0.0.0 Safari/537.36";

/// Source-specific knobs.
///
/// `price_divisor` converts the API's currency-subunit integers to VND and
/// the default mirrors the live payload format; verify both it and the
/// endpoints against the live source before relying on exact values.
#[derive(Debug, Clone)]
pub struct ShopeeConfig {
    pub search_api: String,
    pub detail_api: String,
    pub referer_base: String,
    pub limit: u32,
    pub timeout: Duration,
    /// Min/max seconds slept after every request.
    pub sleep_range: (f64, f64),
    /// Checkpoint the accumulated rows every N processed pairs; 0 disables.
    pub checkpoint_every: usize,
    pub out_dir: PathBuf,
    pub cookie: Option<String>,
    pub price_divisor: f64,
}

impl Default for ShopeeConfig {
    fn default() -> Self {
        Self {
            search_api: SEARCH_API.to_string(),
            detail_api: DETAIL_API.to_string(),
            referer_base: REFERER_BASE.to_string(),
            limit: 60,
            timeout: Duration::from_secs(20),
            sleep_range: (3.0, 6.0),
            checkpoint_every: 10,
            out_dir: PathBuf::from("data/raw"),
            cookie: None,
            price_divisor: 100_000.0,
        }
    }
}

pub struct ShopeeScraper {
    client: Client,
    config: ShopeeConfig,
}

impl ShopeeScraper {
    pub fn new() -> Result<Self> {
        Self::with_config(ShopeeConfig::default())
    }

    pub fn with_config(config: ShopeeConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("af-ac-enc-dat", HeaderValue::from_static("5e40808d1c7bbe81"));
        headers.insert("x-api-source", HeaderValue::from_static("pc"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("vi-VN,vi;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        if let Some(cookie) = &config.cookie {
            let safe_cookie = cookie.trim().replace(['\n', '\r'], "");
            headers.insert(
                COOKIE,
                HeaderValue::from_str(&safe_cookie).context("Invalid cookie header")?,
            );
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Phase one: collect (itemid, shopid) pairs across the given offsets.
    /// Failed or empty offsets are logged and skipped.
    async fn collect_item_pairs(
        &self,
        keyword: &str,
        offsets: &[u32],
        referer: &str,
    ) -> Vec<(u64, u64)> {
        let mut pairs = Vec::new();

        for &offset in offsets {
            let request = self
                .client
                .get(&self.config.search_api)
                .header(REFERER, referer)
                .query(&[
                    ("keyword", keyword.to_string()),
                    ("limit", self.config.limit.to_string()),
                    ("newest", offset.to_string()),
                ]);

            let payload = match send_json(request).await {
                Ok(payload) => payload,
                Err(err) => {
                    warn!("Search offset {} failed: {}", offset, err);
                    self.sleep_polite().await;
                    continue;
                }
            };

            let items = payload
                .get("items")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if items.is_empty() {
                let reason = payload
                    .get("error")
                    .or_else(|| payload.get("error_msg"))
                    .and_then(|v| value_to_string(v))
                    .unwrap_or_else(|| "no_items".to_string());
                warn!("Empty search results at offset {}: {}", offset, reason);
            }

            for entry in &items {
                let basic = entry.get("item_basic");
                let itemid = basic.and_then(|b| b.get("itemid")).and_then(Value::as_u64);
                let shopid = basic.and_then(|b| b.get("shopid")).and_then(Value::as_u64);
                if let (Some(itemid), Some(shopid)) = (itemid, shopid) {
                    pairs.push((itemid, shopid));
                }
            }

            self.sleep_polite().await;
        }

        pairs
    }

    /// Runs the full two-phase pipeline for a keyword, checkpointing the
    /// accumulated table every `checkpoint_every` processed pairs.
    ///
    /// Fails when phase one yields zero pairs: the cookie has likely expired
    /// or the keyword matched nothing, and an empty table would be
    /// indistinguishable from a successful run.
    pub async fn fetch_products(
        &self,
        keyword: &str,
        offsets: &[u32],
    ) -> Result<Vec<ShopeeProduct>> {
        let keyword = normalize_keyword(keyword);
        let referer = search_referer(&self.config.referer_base, &keyword);

        info!("Collecting Shopee item pairs for '{}'", keyword);
        let pairs = self.collect_item_pairs(&keyword, offsets, &referer).await;
        if pairs.is_empty() {
            bail!("No itemid/shopid pairs found; the cookie may have expired or the keyword matched nothing");
        }
        info!("Found {} item pairs", pairs.len());

        std::fs::create_dir_all(&self.config.out_dir).with_context(|| {
            format!("Failed to create {}", self.config.out_dir.display())
        })?;
        let checkpoint_path = self.config.out_dir.join(format!(
            "shopee_{}_checkpoint.csv",
            export::safe_keyword(&keyword)
        ));

        let mut rows: Vec<ShopeeProduct> = Vec::new();

        for (index, &(itemid, shopid)) in pairs.iter().enumerate() {
            let request = self
                .client
                .get(&self.config.detail_api)
                .header(REFERER, &referer)
                .query(&[
                    ("itemid", itemid.to_string()),
                    ("shopid", shopid.to_string()),
                ]);

            match send_json(request).await {
                Ok(payload) => {
                    let item = payload.get("item").cloned().unwrap_or(Value::Null);
                    rows.push(extract_product(
                        &item,
                        itemid,
                        shopid,
                        self.config.price_divisor,
                    ));
                }
                Err(err) => {
                    warn!("Detail fetch failed for item {}: {}", itemid, err);
                    self.sleep_polite().await;
                    continue;
                }
            }

            if self.config.checkpoint_every > 0 && (index + 1) % self.config.checkpoint_every == 0
            {
                export::write_shopee_csv(&checkpoint_path, &rows)?;
                debug!(
                    "Checkpointed {} rows to {}",
                    rows.len(),
                    checkpoint_path.display()
                );
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

fn normalize_keyword(keyword: &str) -> String {
    keyword.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn search_referer(base: &str, keyword: &str) -> String {
    match Url::parse_with_params(&format!("{}/search", base), [("keyword", keyword)]) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}/search", base),
    }
}

/// Flattens one detail payload into a record. Field-level misses degrade to
/// None; prices of a missing item come out as zero after scaling, matching
/// the source system.
pub(crate) fn extract_product(
    item: &Value,
    itemid: u64,
    shopid: u64,
    price_divisor: f64,
) -> ShopeeProduct {
    ShopeeProduct {
        itemid,
        shopid,
        name: item.get("name").and_then(Value::as_str).map(str::to_string),
        description: item
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        price: item.get("price").and_then(Value::as_f64).unwrap_or(0.0) / price_divisor,
        price_before_discount: item
            .get("price_before_discount")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            / price_divisor,
        discount: item.get("discount").and_then(value_to_string),
        historical_sold: item.get("historical_sold").and_then(Value::as_i64),
        rating_star: item
            .get("item_rating")
            .and_then(|rating| rating.get("rating_star"))
            .and_then(Value::as_f64),
        stock: item.get("stock").and_then(Value::as_i64),
        brand: item.get("brand").and_then(Value::as_str).map(str::to_string),
        category_id: item.get("catid").and_then(Value::as_i64),
        shop_location: item
            .get("shop_location")
            .and_then(Value::as_str)
            .map(str::to_string),
        is_official_shop: item.get("is_official_shop").and_then(Value::as_bool),
        is_preferred_plus_seller: item
            .get("is_preferred_plus_seller")
            .and_then(Value::as_bool),
        liked_count: item.get("liked_count").and_then(Value::as_i64),
        cmt_count: item.get("cmt_count").and_then(Value::as_i64),
        attributes: attributes_to_map(item.get("attributes")),
    }
}

/// Ordered fold of the payload's attribute list into a name→value map.
/// A later duplicate name overwrites the earlier value.
pub(crate) fn attributes_to_map(attributes: Option<&Value>) -> BTreeMap<String, Value> {
    let mut map = BTreeMap::new();
    let list = match attributes.and_then(Value::as_array) {
        Some(list) => list,
        None => return map,
    };
    for attr in list {
        if let Some(name) = attr.get("name").and_then(Value::as_str) {
            let value = attr.get("value").cloned().unwrap_or(Value::Null);
            map.insert(name.to_string(), value);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_named_fields_and_scales_prices() {
        let item = json!({
            "name": "Áo khoác",
            "description": "Hàng mới",
            "price": 12_300_000,
            "price_before_discount": 15_000_000,
            "discount": "-18%",
            "historical_sold": 321,
            "item_rating": {"rating_star": 4.8},
            "stock": 12,
            "brand": "NoBrand",
            "catid": 100_017,
            "shop_location": "TP. Hồ Chí Minh",
            "is_official_shop": false,
            "is_preferred_plus_seller": true,
            "liked_count": 55,
            "cmt_count": 40,
            "attributes": [
                {"name": "Chất liệu", "value": "Cotton"},
                {"name": "Xuất xứ", "value": "Việt Nam"}
            ]
        });

        let product = extract_product(&item, 7, 11, 100_000.0);
        assert_eq!(product.itemid, 7);
        assert_eq!(product.shopid, 11);
        assert_eq!(product.name.as_deref(), Some("Áo khoác"));
        assert_eq!(product.price, 123.0);
        assert_eq!(product.price_before_discount, 150.0);
        assert_eq!(product.discount.as_deref(), Some("-18%"));
        assert_eq!(product.rating_star, Some(4.8));
        assert_eq!(product.is_preferred_plus_seller, Some(true));
        assert_eq!(
            product.attributes.get("Chất liệu"),
            Some(&json!("Cotton"))
        );
    }

    #[test]
    fn missing_item_payload_degrades_to_defaults() {
        let product = extract_product(&Value::Null, 1, 2, 100_000.0);
        assert_eq!(product.itemid, 1);
        assert_eq!(product.name, None);
        assert_eq!(product.price, 0.0);
        assert!(product.attributes.is_empty());
    }

    #[test]
    fn later_duplicate_attribute_name_wins() {
        let attrs = json!([
            {"name": "Brand", "value": "First"},
            {"name": "Brand", "value": "Second"},
            {"value": "nameless is dropped"},
            {"name": "Size"}
        ]);
        let map = attributes_to_map(Some(&attrs));
        assert_eq!(map.get("Brand"), Some(&json!("Second")));
        assert_eq!(map.get("Size"), Some(&Value::Null));
        assert_eq!(map.len(), 2);
    }
}
