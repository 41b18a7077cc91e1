use std::path::Path;

use listing_scout::export;
use listing_scout::scrapers::{batdongsan, BrowserConfig, ShopeeScraper, TikiScraper};
use tracing::{info, warn, Level};

const DEFAULT_KEYWORD: &str = "dien thoai";
const SHOPEE_OFFSETS: &[u32] = &[0, 60, 120];
const OUT_DIR: &str = "data/raw";
const LINKS_CSV: &str = "data/processed/links.csv";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let keyword = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_KEYWORD.to_string());
    let out_dir = Path::new(OUT_DIR);

    info!("Listing Scout - collecting '{}'", keyword);

    let tiki = TikiScraper::new()?;
    match tiki.fetch_products(&keyword).await {
        Ok(rows) => {
            info!("Tiki returned {} products", rows.len());
            let path = export::write_tiki_csv(&rows, &keyword, out_dir)?;
            info!("Saved Tiki products to {}", path.display());
        }
        Err(err) => warn!("Tiki scrape failed: {}", err),
    }

    let shopee = ShopeeScraper::new()?;
    match shopee.fetch_products(&keyword, SHOPEE_OFFSETS).await {
        Ok(rows) => {
            info!("Shopee returned {} products", rows.len());
            let path = export::save_full_dataset(&rows, &keyword, out_dir)?;
            info!("Saved Shopee products to {}", path.display());
        }
        Err(err) => warn!("Shopee scrape failed: {}", err),
    }

    // The real-estate portal renders via scripting, so its pages go through
    // headless Chrome; feed it a CSV of detail URLs to visit.
    let links = Path::new(LINKS_CSV);
    if links.exists() {
        let urls = export::read_detail_urls(links)?;
        info!("Scraping {} batdongsan pages via headless Chrome", urls.len());
        let rows = batdongsan::scrape_listing_pages_threaded(urls, BrowserConfig::default()).await?;
        info!("Batdongsan returned {} listings", rows.len());
        let path = export::write_listings_csv(&rows, &keyword, out_dir)?;
        info!("Saved listings to {}", path.display());
    } else {
        info!("No {} found; skipping batdongsan browser scrape", LINKS_CSV);
    }

    Ok(())
}
