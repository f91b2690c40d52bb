//! Page rendering behind a narrow interface: navigate, read the current
//! document, wait for a readiness condition, advance pagination.

mod http;
mod spider;

pub use http::HttpSource;
pub use spider::SpiderSource;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use scraper::Html;
use tracing::debug;
use url::Url;

use crate::error::FetchError;
use crate::parser::locator::{collapse_whitespace, select};

/// What "ready" means for the page currently loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyCondition {
    /// At least one node matches the selector.
    ElementPresent(String),
    /// The current URL differs from the given one.
    UrlChanged(String),
}

impl ReadyCondition {
    pub fn element(css: &str) -> Self {
        ReadyCondition::ElementPresent(css.to_string())
    }

    fn is_met(&self, url: Option<&str>, html: Option<&str>) -> bool {
        match self {
            ReadyCondition::ElementPresent(css) => html
                .map(|h| !select(Html::parse_document(h).root_element(), css).is_empty())
                .unwrap_or(false),
            ReadyCondition::UrlChanged(from) => url.is_some_and(|u| u != from),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationAdvance {
    Advanced,
    Unavailable,
}

/// A single, exclusively-owned rendering session.
#[async_trait]
pub trait PageRenderer: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError>;

    /// Raw markup of the page currently loaded.
    fn current_html(&self) -> Option<&str>;

    fn current_url(&self) -> Option<&str>;

    async fn wait_until(
        &mut self,
        condition: &ReadyCondition,
        timeout: Duration,
    ) -> Result<(), FetchError>;

    async fn trigger_pagination_advance(&mut self) -> Result<PaginationAdvance, FetchError>;

    fn current_document(&self) -> Option<Html> {
        self.current_html().map(Html::parse_document)
    }
}

/// Final URL and fully rendered markup for one request.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
}

/// Anything that can hand back rendered HTML for a URL.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Selectors tried, in order, to find the listing's "next page" control.
const NEXT_SELECTORS: &[&str] = &[
    "a[rel~='next']",
    "li.page-item.next a",
    "li.next a",
    ".pagination .next a",
];

/// A [`PageRenderer`] over a source that returns finished documents.
/// Waiting means re-fetching the current URL until the condition holds.
pub struct StaticRenderer<S> {
    source: S,
    poll_interval: Duration,
    page: Option<FetchedPage>,
}

impl<S: PageSource> StaticRenderer<S> {
    pub fn new(source: S, poll_interval: Duration) -> Self {
        Self {
            source,
            poll_interval,
            page: None,
        }
    }
}

#[async_trait]
impl<S: PageSource> PageRenderer for StaticRenderer<S> {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        let page = self.source.fetch(url).await?;
        if page.html.trim().is_empty() {
            return Err(FetchError::EmptyDocument { url: url.to_string() });
        }
        debug!("Loaded {} ({} bytes)", page.url, page.html.len());
        self.page = Some(page);
        Ok(())
    }

    fn current_html(&self) -> Option<&str> {
        self.page.as_ref().map(|p| p.html.as_str())
    }

    fn current_url(&self) -> Option<&str> {
        self.page.as_ref().map(|p| p.url.as_str())
    }

    async fn wait_until(
        &mut self,
        condition: &ReadyCondition,
        timeout: Duration,
    ) -> Result<(), FetchError> {
        let start = Instant::now();
        loop {
            if condition.is_met(self.current_url(), self.current_html()) {
                return Ok(());
            }
            let url = self
                .current_url()
                .map(str::to_string)
                .ok_or(FetchError::NoPage)?;
            if start.elapsed() + self.poll_interval > timeout {
                return Err(FetchError::Timeout {
                    url,
                    waited_ms: start.elapsed().as_millis() as u64,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
            // A failed re-fetch keeps the last good page and keeps polling.
            if let Ok(page) = self.source.fetch(&url).await {
                self.page = Some(page);
            }
        }
    }

    async fn trigger_pagination_advance(&mut self) -> Result<PaginationAdvance, FetchError> {
        let page = self.page.as_ref().ok_or(FetchError::NoPage)?;
        let Some(next) = find_next_href(&page.html, &page.url) else {
            return Ok(PaginationAdvance::Unavailable);
        };
        if next == page.url {
            return Ok(PaginationAdvance::Unavailable);
        }
        self.navigate(&next).await?;
        Ok(PaginationAdvance::Advanced)
    }
}

/// Absolute URL of the page's "next" control, if it has one.
fn find_next_href(html: &str, base: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let by_selector = NEXT_SELECTORS
        .iter()
        .flat_map(|css| select(root, css))
        .find_map(|a| a.value().attr("href").map(str::to_string));
    let href = by_selector.or_else(|| {
        select(root, "a[href]").into_iter().find_map(|a| {
            let text = collapse_whitespace(&a.text().collect::<String>());
            text.starts_with("Next")
                .then(|| a.value().attr("href").map(str::to_string))
                .flatten()
        })
    })?;

    let mut next = base.join(href.trim()).ok()?;
    next.set_fragment(None);
    Some(next.to_string())
}
