use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One real-estate listing card scraped from batdongsan.com.vn.
///
/// Every field except the source URL is nullable: a card missing a
/// sub-element yields None for that field rather than failing the record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Listing {
    pub price: Option<f64>,
    pub area: Option<f64>,
    pub price_per_m2: Option<f64>,
    pub bedrooms: Option<i64>,
    pub toilets: Option<i64>,
    pub street: Option<String>,
    pub ward: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub has_red_book: bool,
    pub contact_name: Option<String>,
    pub source_url: String,
}

/// One marketplace item from Shopee's detail API.
///
/// Fixed named fields plus the item's own attribute list promoted to a
/// name→value map; attribute keys vary per item, so the map carries no
/// fixed schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopeeProduct {
    pub itemid: u64,
    pub shopid: u64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: f64,
    pub price_before_discount: f64,
    pub discount: Option<String>,
    pub historical_sold: Option<i64>,
    pub rating_star: Option<f64>,
    pub stock: Option<i64>,
    pub brand: Option<String>,
    pub category_id: Option<i64>,
    pub shop_location: Option<String>,
    pub is_official_shop: Option<bool>,
    pub is_preferred_plus_seller: Option<bool>,
    pub liked_count: Option<i64>,
    pub cmt_count: Option<i64>,
    pub attributes: BTreeMap<String, Value>,
}

/// One retailer product from Tiki's listing API, with seller, category and
/// stock sub-objects flattened into top-level columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TikiProduct {
    pub id: Option<i64>,
    pub product_id: Option<i64>,
    pub tiki_product_id: Option<i64>,
    pub seller_product_id: Option<i64>,
    pub sku: Option<String>,
    pub name: Option<String>,
    pub short_description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub brand_name: Option<String>,
    pub brand_id: Option<i64>,
    pub price: Option<f64>,
    pub list_price: Option<f64>,
    pub original_price: Option<f64>,
    pub market_price: Option<f64>,
    pub discount: Option<f64>,
    pub discount_rate: Option<f64>,
    pub rating_average: Option<f64>,
    pub review_count: Option<i64>,
    pub quantity_sold: Option<i64>,
    pub quantity_sold_text: Option<String>,
    pub is_official_store: Option<bool>,
    pub is_freeship: Option<bool>,
    pub inventory_status: Option<String>,
    pub is_tikinow: Option<bool>,
    pub tikinow_time: Option<String>,
    pub thumbnail_url: Option<String>,
    pub product_url: Option<String>,
    pub badges: String,
    pub seller_id: Option<i64>,
    pub seller_name: Option<String>,
    pub seller_type: Option<String>,
    pub seller_logo: Option<String>,
    pub seller_rating: Option<f64>,
    pub seller_reviews: Option<i64>,
    pub seller_followers: Option<i64>,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub stock_qty: Option<i64>,
    pub stock_available: Option<bool>,
    pub stock_preorder: Option<bool>,
    pub stock_min_sale_qty: Option<i64>,
    pub stock_max_sale_qty: Option<i64>,
}
