//! CSV persistence for scraped tables, plus the detail-URL input reader.
//!
//! Shopee files get a UTF-8 BOM so spreadsheet tools pick up Vietnamese
//! text, and their column set is the fixed fields followed by the sorted
//! union of attribute keys seen across the rows. Writes are plain
//! create-and-overwrite; there is no locking or atomic rename.

use std::fs::{self, File};
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use serde_json::Value;

use crate::models::{Listing, ShopeeProduct, TikiProduct};

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Columns written before the per-item attribute columns in Shopee CSVs.
const SHOPEE_BASE_COLUMNS: &[&str] = &[
    "itemid",
    "shopid",
    "name",
    "description",
    "price",
    "price_before_discount",
    "discount",
    "historical_sold",
    "rating_star",
    "stock",
    "brand",
    "category_id",
    "shop_location",
    "is_official_shop",
    "is_preferred_plus_seller",
    "liked_count",
    "cmt_count",
];

/// Folds a keyword into filename-safe form: trimmed, lowercased, whitespace
/// runs replaced with underscores.
pub fn safe_keyword(keyword: &str) -> String {
    keyword
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Writes real-estate listings to `batdongsan_<keyword>_<YYYYMMDD>.csv`.
pub fn write_listings_csv(rows: &[Listing], keyword: &str, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    let stamp = Local::now().format("%Y%m%d");
    let path = out_dir.join(format!("batdongsan_{}_{}.csv", safe_keyword(keyword), stamp));

    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(path)
}

/// Writes retailer products to `tiki_<keyword>_<YYYYMMDD>.csv`.
pub fn write_tiki_csv(rows: &[TikiProduct], keyword: &str, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    let stamp = Local::now().format("%Y%m%d");
    let path = out_dir.join(format!("tiki_{}_{}.csv", safe_keyword(keyword), stamp));

    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(path)
}

/// Writes marketplace rows to `path`, overwriting. Used for both the
/// periodic checkpoint and the final full dataset.
pub fn write_shopee_csv(path: &Path, rows: &[ShopeeProduct]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut buffered = BufWriter::new(file);
    buffered.write_all(UTF8_BOM)?;
    let mut writer = csv::Writer::from_writer(buffered);

    let mut attr_columns: Vec<String> = rows
        .iter()
        .flat_map(|row| row.attributes.keys().cloned())
        .collect();
    attr_columns.sort();
    attr_columns.dedup();

    let mut header: Vec<String> = SHOPEE_BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend(attr_columns.iter().cloned());
    writer.write_record(&header)?;

    for row in rows {
        let mut record = shopee_fixed_cells(row);
        for column in &attr_columns {
            record.push(row.attributes.get(column).map(cell).unwrap_or_default());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the final marketplace table to `shopee_<keyword>_full.csv`.
pub fn save_full_dataset(
    rows: &[ShopeeProduct],
    keyword: &str,
    out_dir: &Path,
) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    let path = out_dir.join(format!("shopee_{}_full.csv", safe_keyword(keyword)));
    write_shopee_csv(&path, rows)?;
    Ok(path)
}

/// Reads the `detail_url` column of a CSV of pages to visit.
pub fn read_detail_urls(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let column = match headers.iter().position(|h| h == "detail_url") {
        Some(index) => index,
        None => bail!("{} must contain a 'detail_url' column", path.display()),
    };

    let mut urls = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(url) = record.get(column) {
            let url = url.trim();
            if !url.is_empty() {
                urls.push(url.to_string());
            }
        }
    }
    Ok(urls)
}

fn opt_cell<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn shopee_fixed_cells(row: &ShopeeProduct) -> Vec<String> {
    vec![
        row.itemid.to_string(),
        row.shopid.to_string(),
        row.name.clone().unwrap_or_default(),
        row.description.clone().unwrap_or_default(),
        row.price.to_string(),
        row.price_before_discount.to_string(),
        row.discount.clone().unwrap_or_default(),
        opt_cell(&row.historical_sold),
        opt_cell(&row.rating_star),
        opt_cell(&row.stock),
        row.brand.clone().unwrap_or_default(),
        opt_cell(&row.category_id),
        row.shop_location.clone().unwrap_or_default(),
        opt_cell(&row.is_official_shop),
        opt_cell(&row.is_preferred_plus_seller),
        opt_cell(&row.liked_count),
        opt_cell(&row.cmt_count),
    ]
}
