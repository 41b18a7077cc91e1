//! Text normalization and field parsing for Vietnamese listing text.
//!
//! Everything here operates on the output of [`normalize`]: lowercase,
//! diacritic-stripped, whitespace-collapsed text. Prices like "1,5 tỷ" and
//! areas like "85m²" arrive as free-form strings and leave as typed values.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static DECIMAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:[\.,]\d+)?)").unwrap());
static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").unwrap());
static VERIFIED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"batdongsan\.com\.vn.{0,120}da xac thuc").unwrap());

/// City-name substrings recognized by the address heuristic, with and
/// without diacritics. Compared against the lowercased last segment.
const CITY_KEYWORDS: &[&str] = &[
    "ho chi minh",
    "hồ chí minh",
    "ha noi",
    "hà nội",
    "da nang",
    "đà nẵng",
];

/// Parsed components of a comma-separated Vietnamese address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    pub street: Option<String>,
    pub ward: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
}

/// Folds text to a canonical comparison form: NFKD-decomposed with combining
/// marks dropped, lowercased, đ/Đ folded to "d", non-breaking spaces replaced
/// and whitespace runs collapsed. Idempotent.
pub fn normalize(text: &str) -> String {
    let replaced = text.replace('\u{a0}', " ");
    let stripped: String = replaced.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let lowered = stripped.to_lowercase().replace('đ', "d");
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_number(normalized: &str) -> Option<f64> {
    let caps = DECIMAL_RE.captures(normalized)?;
    caps.get(1)?.as_str().replace(',', ".").parse().ok()
}

/// Parses a price expression into base currency units (VND).
///
/// Returns None for missing text, the negotiable-price marker ("thỏa thuận"),
/// or text with no extractable number. Unit keywords are checked in order
/// tỷ → triệu → nghìn/ngàn; only the first match applies.
pub fn parse_price(text: Option<&str>) -> Option<f64> {
    let normalized = normalize(text?);
    if normalized.contains("thoa thuan") {
        return None;
    }
    let value = extract_number(&normalized)?;
    if normalized.contains("ty") {
        Some(value * 1_000_000_000.0)
    } else if normalized.contains("trieu") {
        Some(value * 1_000_000.0)
    } else if normalized.contains("nghin") || normalized.contains("ngan") {
        Some(value * 1_000.0)
    } else {
        Some(value)
    }
}

/// Extracts the first decimal number from an area expression ("85m²" → 85.0).
pub fn parse_area(text: Option<&str>) -> Option<f64> {
    extract_number(&normalize(text?))
}

/// Extracts the first run of digits ("3 phòng" → 3).
pub fn parse_integer(text: Option<&str>) -> Option<i64> {
    let normalized = normalize(text?);
    let caps = DIGITS_RE.captures(&normalized)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Splits a comma-separated Vietnamese address into street, ward, district
/// and city. Best-effort: the last segment is taken as the city only when it
/// names one of the major cities, and the remaining segments are assigned by
/// position. Not a geocoder.
pub fn parse_location_vn(text: Option<&str>) -> Address {
    let text = match text {
        Some(t) => t,
        None => return Address::default(),
    };
    let mut parts: Vec<&str> = text
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return Address::default();
    }

    let mut city: Option<String> = None;
    if parts.len() >= 2 {
        let last = parts[parts.len() - 1].to_lowercase();
        if CITY_KEYWORDS.iter().any(|key| last.contains(key)) {
            city = parts.pop().map(str::to_string);
        }
    }

    match parts.len() {
        1 => Address {
            street: None,
            ward: None,
            district: Some(parts[0].to_string()),
            city,
        },
        2 => Address {
            street: None,
            ward: None,
            district: Some(parts[0].to_string()),
            city: city.or_else(|| Some(parts[1].to_string())),
        },
        _ => Address {
            street: Some(parts[..parts.len() - 2].join(", ")),
            ward: Some(parts[parts.len() - 2].to_string()),
            district: Some(parts[parts.len() - 1].to_string()),
            city,
        },
    }
}

/// True when the description mentions a legal ownership certificate
/// ("sổ hồng" or "sổ đỏ").
pub fn has_red_book(description: Option<&str>) -> bool {
    let normalized = description.map(normalize).unwrap_or_default();
    ["so hong", "so do"]
        .iter()
        .any(|keyword| normalized.contains(keyword))
}

/// True when the rendered page text carries the portal's verification badge
/// phrase ("Batdongsan.com.vn đã xác thực").
pub fn has_verified_badge(text: Option<&str>) -> bool {
    match text {
        Some(t) => VERIFIED_RE.is_match(&normalize(t)),
        None => false,
    }
}
