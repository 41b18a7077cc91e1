//! Headless-Chrome session wrapper for batdongsan.com.vn.
//!
//! The portal renders listing cards via scripting, so plain HTTP GET returns
//! an empty shell; a real browser session is driven instead. One session and
//! one tab are reused across all navigations of a run.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use rand::Rng;
use tracing::{info, warn};

pub const BASE_URL: &str = "https://batdongsan.com.vn/";

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Options for one browser scraping session.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub headless: bool,
    /// Bound on each navigation and wait-for-selector.
    pub timeout: Duration,
    /// Min/max seconds slept between page navigations.
    pub sleep_range: (f64, f64),
    /// Cookie header; falls back to the `BDS_COOKIE` environment variable.
    pub cookie: Option<String>,
    /// When set, the first rendered page is snapshotted here for debugging.
    pub debug_dir: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout: Duration::from_secs(30),
            sleep_range: (1.5, 3.5),
            cookie: None,
            debug_dir: None,
        }
    }
}

/// A launched Chrome instance plus the headers every tab should carry.
pub struct BrowserSession {
    browser: Browser,
    config: BrowserConfig,
}

impl BrowserSession {
    pub fn launch(config: BrowserConfig) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self { browser, config })
    }

    /// Opens a tab with the browser-mimicking User-Agent, Referer and
    /// optional Cookie header applied.
    pub fn open_tab(&self) -> Result<Arc<Tab>> {
        let tab = self.browser.new_tab()?;
        tab.set_user_agent(USER_AGENT, None, None)?;
        tab.set_default_timeout(self.config.timeout);

        let cookie = self
            .config
            .cookie
            .clone()
            .or_else(|| std::env::var("BDS_COOKIE").ok());

        let mut headers = HashMap::new();
        headers.insert("Referer", BASE_URL);
        if let Some(value) = cookie.as_deref() {
            headers.insert("Cookie", value);
        }
        tab.set_extra_http_headers(headers)?;

        Ok(tab)
    }

    /// Navigates to `url` and returns the rendered HTML. The wait for
    /// `selector` is bounded by the configured timeout; a timeout is soft
    /// and whatever content is present gets returned.
    pub fn fetch_rendered(&self, tab: &Tab, url: &str, selector: &str) -> Result<String> {
        tab.navigate_to(url)?;
        tab.wait_until_navigated()?;

        if tab
            .wait_for_element_with_custom_timeout(selector, self.config.timeout)
            .is_err()
        {
            warn!("Timed out waiting for '{}' on {}", selector, url);
        }

        tab.get_content()
    }

    /// Randomized politeness delay between navigations.
    pub fn sleep_between_pages(&self) {
        let (min_s, max_s) = self.config.sleep_range;
        if max_s <= 0.0 {
            return;
        }
        let secs = rand::thread_rng().gen_range(min_s..=max_s);
        thread::sleep(Duration::from_secs_f64(secs));
    }

    /// Writes the rendered HTML of a page into the configured debug
    /// directory. Failures are logged, never propagated.
    pub fn save_debug_snapshot(&self, html: &str) {
        let dir = match &self.config.debug_dir {
            Some(dir) => dir.clone(),
            None => return,
        };
        let path = dir.join("first_page.html");
        let result = fs::create_dir_all(&dir).and_then(|_| fs::write(&path, html));
        match result {
            Ok(()) => info!("Saved rendered HTML snapshot to {}", path.display()),
            Err(err) => warn!("Failed to save HTML snapshot: {}", err),
        }
    }
}
