use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

const DEFAULT_CONFIG: &str = "scraper";
const ENV_PREFIX: &str = "SCRAPER";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// spider.cloud, returns browser-rendered HTML
    Spider,
    /// Plain HTTP GET
    Http,
}

/// Static crawl options. Layered: defaults, then `scraper.toml` (or an
/// explicit `--config` file), then `SCRAPER_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub target_origin: String,
    pub listing_url: String,
    pub start_page: u32,
    pub max_listing_pages: u32,
    pub inter_page_delay_min_ms: u64,
    pub inter_page_delay_max_ms: u64,
    pub initial_settle_delay_ms: u64,
    pub challenge_requests: u32,
    pub profile_settle_delay_ms: u64,
    pub wait_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub frontier_path: PathBuf,
    pub ledger_path: PathBuf,
    pub listing_cards_path: Option<PathBuf>,
    pub renderer: RendererKind,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_origin: "https://clutch.co".into(),
            listing_url: "https://clutch.co/it-services/india".into(),
            start_page: 0,
            max_listing_pages: 115,
            inter_page_delay_min_ms: 4000,
            inter_page_delay_max_ms: 6000,
            initial_settle_delay_ms: 10_000,
            challenge_requests: 1,
            profile_settle_delay_ms: 2000,
            wait_timeout_ms: 20_000,
            poll_interval_ms: 1000,
            frontier_path: PathBuf::from("data/profile_urls.json"),
            ledger_path: PathBuf::from("data/profiles.jsonl"),
            listing_cards_path: None,
            renderer: RendererKind::Spider,
            user_agent: "directory_scraper/0.1".into(),
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG).required(false),
        };
        let settings: Settings = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.origin()?;
        Url::parse(&settings.listing_url)
            .with_context(|| format!("listing_url is not a URL: {}", settings.listing_url))?;
        Ok(settings)
    }

    pub fn origin(&self) -> Result<Url> {
        Url::parse(&self.target_origin)
            .with_context(|| format!("target_origin is not a URL: {}", self.target_origin))
    }

    /// URL of listing page `page` (0-based; page 0 is the bare listing URL).
    pub fn listing_page_url(&self, page: u32) -> String {
        if page == 0 {
            return self.listing_url.clone();
        }
        let sep = if self.listing_url.contains('?') { '&' } else { '?' };
        format!("{}{}page={}", self.listing_url, sep, page)
    }

    pub fn inter_page_delay_range(&self) -> (Duration, Duration) {
        let lo = self.inter_page_delay_min_ms.min(self.inter_page_delay_max_ms);
        let hi = self.inter_page_delay_min_ms.max(self.inter_page_delay_max_ms);
        (Duration::from_millis(lo), Duration::from_millis(hi))
    }

    pub fn initial_settle_delay(&self) -> Duration {
        Duration::from_millis(self.initial_settle_delay_ms)
    }

    pub fn profile_settle_delay(&self) -> Duration {
        Duration::from_millis(self.profile_settle_delay_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
