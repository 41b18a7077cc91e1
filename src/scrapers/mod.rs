pub mod batdongsan;
pub mod browser;
pub mod shopee;
pub mod tiki;

pub use browser::{BrowserConfig, BrowserSession};
pub use shopee::{ShopeeConfig, ShopeeScraper};
pub use tiki::{TikiConfig, TikiScraper};

use anyhow::Result;
use serde_json::Value;

/// Sends a GET request and decodes the JSON body, treating HTTP error
/// statuses as failures.
pub(crate) async fn send_json(request: reqwest::RequestBuilder) -> Result<Value> {
    let response = request.send().await?.error_for_status()?;
    Ok(response.json::<Value>().await?)
}

/// Renders a JSON value as cell text: nulls vanish, strings pass through
/// unquoted, everything else uses its JSON form.
pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
