//! Real-estate listing scraper for batdongsan.com.vn.
//!
//! Cards are extracted from the rendered search/listing pages with
//! structural selectors; each field is parsed independently and a missing
//! sub-element yields a null field, never a failed record.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use crate::models::Listing;
use crate::parsing::{
    has_red_book, has_verified_badge, parse_area, parse_integer, parse_location_vn, parse_price,
};
use crate::scrapers::browser::{BrowserConfig, BrowserSession};

/// Selector the browser loop waits for before reading page content.
pub const CARD_SELECTOR: &str = "div.re__card-info";

static CARD: Lazy<Selector> = Lazy::new(|| Selector::parse(CARD_SELECTOR).unwrap());
static PRICE: Lazy<Selector> = Lazy::new(|| Selector::parse("span.re__card-config-price").unwrap());
static AREA: Lazy<Selector> = Lazy::new(|| Selector::parse("span.re__card-config-area").unwrap());
static PRICE_PER_M2: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.re__card-config-price_per_m2").unwrap());
static BEDROOM: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.re__card-config-bedroom").unwrap());
static TOILET: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.re__card-config-toilet").unwrap());
static LOCATION: Lazy<Selector> = Lazy::new(|| Selector::parse("div.re__card-location").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h3.re__card-title").unwrap());
static DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.re__card-description").unwrap());
static CONTACT: Lazy<Selector> = Lazy::new(|| Selector::parse(".re__contact-name").unwrap());

fn select_text(card: ElementRef, selector: &Selector) -> Option<String> {
    let element = card.select(selector).next()?;
    let text = element.text().collect::<String>().trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Like [`select_text`], but falls back to the accessibility label when the
/// element renders no visible text (bedroom/toilet counts often do).
fn select_text_or_aria(card: ElementRef, selector: &Selector) -> Option<String> {
    let element = card.select(selector).next()?;
    let text = element.text().collect::<String>().trim().to_string();
    if !text.is_empty() {
        return Some(text);
    }
    element.value().attr("aria-label").map(str::to_string)
}

fn parse_card(card: ElementRef, source_url: &str) -> Listing {
    let price_text = select_text(card, &PRICE);
    let area_text = select_text(card, &AREA);
    let price_per_m2_text = select_text(card, &PRICE_PER_M2);
    let bedrooms_text = select_text_or_aria(card, &BEDROOM);
    let toilets_text = select_text_or_aria(card, &TOILET);
    let location_text = select_text(card, &LOCATION);
    let title_text = select_text(card, &TITLE);
    let description_text = select_text(card, &DESCRIPTION);
    let contact_name_text = select_text(card, &CONTACT);

    let address = parse_location_vn(location_text.as_deref());

    Listing {
        price: parse_price(price_text.as_deref()),
        area: parse_area(area_text.as_deref()),
        price_per_m2: parse_price(price_per_m2_text.as_deref()),
        bedrooms: parse_integer(bedrooms_text.as_deref()),
        toilets: parse_integer(toilets_text.as_deref()),
        street: address.street,
        ward: address.ward,
        district: address.district,
        city: address.city,
        title: title_text,
        description: description_text.clone(),
        has_red_book: has_red_book(description_text.as_deref()),
        contact_name: contact_name_text,
        source_url: source_url.to_string(),
    }
}

/// Extracts every listing card present in the page HTML.
pub fn parse_cards(html: &str, source_url: &str) -> Vec<Listing> {
    let document = Html::parse_document(html);
    document
        .select(&CARD)
        .map(|card| parse_card(card, source_url))
        .collect()
}

/// Visits each URL in order with the given session, parsing whatever cards
/// render. A failed navigation logs and skips the URL.
pub fn scrape_listing_pages(session: &BrowserSession, urls: &[String]) -> Result<Vec<Listing>> {
    let tab = session.open_tab()?;
    let mut rows = Vec::new();

    for (index, url) in urls.iter().enumerate() {
        let html = match session.fetch_rendered(&tab, url, CARD_SELECTOR) {
            Ok(html) => html,
            Err(err) => {
                warn!("Navigation failed for {}: {}", url, err);
                session.sleep_between_pages();
                continue;
            }
        };

        if index == 0 {
            session.save_debug_snapshot(&html);
        }
        if has_verified_badge(Some(html.as_str())) {
            info!("Portal verification badge present on {}", url);
        }

        let cards = parse_cards(&html, url);
        if cards.is_empty() {
            warn!("No listing cards found on {}", url);
        }
        rows.extend(cards);

        if index + 1 < urls.len() {
            session.sleep_between_pages();
        }
    }

    Ok(rows)
}

/// Runs the whole blocking browser batch on the runtime's blocking pool and
/// presents an ordinary async call over it. One worker, no cancellation; the
/// call resolves when the batch completes.
pub async fn scrape_listing_pages_threaded(
    urls: Vec<String>,
    config: BrowserConfig,
) -> Result<Vec<Listing>> {
    let handle = tokio::task::spawn_blocking(move || {
        let session = BrowserSession::launch(config)?;
        scrape_listing_pages(&session, &urls)
    });
    handle.await.context("Browser task panicked")?
}
