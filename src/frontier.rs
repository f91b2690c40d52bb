use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use scraper::Html;
use tracing::{info, warn};

use crate::crawl::Crawler;
use crate::error::{DiscoveryError, FetchError};
use crate::ledger::Ledger;
use crate::parser::listing::{self, LISTING_READY};
use crate::parser::locator::FieldExtractor;
use crate::record::ListingCard;
use crate::render::{PaginationAdvance, ReadyCondition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontierState {
    Uninitialized,
    Discovering,
    Discovered,
    DiscoveryStoppedEarly,
}

/// Detail links in discovery order, without repeats. Only ever grows.
#[derive(Debug)]
pub struct Frontier {
    path: PathBuf,
    links: Vec<String>,
    seen: HashSet<String>,
    state: FrontierState,
}

impl Frontier {
    /// Load the persisted frontier. A missing file is an uninitialized
    /// frontier; a non-empty one counts as already discovered.
    pub fn load(path: &Path) -> Result<Self> {
        let mut frontier = Self {
            path: path.to_path_buf(),
            links: Vec::new(),
            seen: HashSet::new(),
            state: FrontierState::Uninitialized,
        };
        if !path.exists() {
            return Ok(frontier);
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read frontier: {}", path.display()))?;
        if raw.trim().is_empty() {
            return Ok(frontier);
        }
        let links: Vec<String> = serde_json::from_str(&raw)
            .with_context(|| format!("Frontier is not a JSON array of URLs: {}", path.display()))?;
        for link in links {
            frontier.insert(link);
        }
        if !frontier.is_empty() {
            frontier.state = FrontierState::Discovered;
        }
        Ok(frontier)
    }

    /// Returns `true` if the link was new.
    pub fn insert(&mut self, link: String) -> bool {
        if self.seen.contains(&link) {
            return false;
        }
        self.seen.insert(link.clone());
        self.links.push(link);
        true
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn state(&self) -> FrontierState {
        self.state
    }

    /// Overwrite the frontier file as a pretty JSON array
    /// (write to a temp file, fsync, then rename over the target).
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        let json = serde_json::to_string_pretty(&self.links)?;
        {
            let mut file = std::fs::File::create(&temp)
                .with_context(|| format!("Failed to create {}", temp.display()))?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        std::fs::rename(&temp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

/// Outcome of one discovery pass.
#[derive(Debug)]
pub struct DiscoveryReport {
    pub pages: u32,
    pub new_links: usize,
    pub stopped: Option<DiscoveryError>,
}

/// Walk the listing pages from `start_page`, merging every detail link
/// found into `frontier`. The frontier is saved before returning whether
/// discovery ran out of pages or stopped on an error.
///
/// Only local I/O failures are returned as `Err`; a listing that could not
/// be walked to the end is reported through [`DiscoveryReport::stopped`].
pub async fn discover(
    crawler: &mut Crawler,
    frontier: &mut Frontier,
    mut cards: Option<&mut Ledger<ListingCard>>,
) -> Result<DiscoveryReport> {
    frontier.state = FrontierState::Discovering;
    let already = frontier.len();
    let timeout = crawler.settings.wait_timeout();
    let max_pages = crawler.settings.max_listing_pages.max(1);
    let listing_delay = crawler.listing_delay;

    let mut page = crawler.settings.start_page;
    let mut pages = 0u32;
    let first = crawler.settings.listing_page_url(page);
    info!("Discovering detail links from {}", first);

    crawler.pacer.settle(&listing_delay).await;
    let mut stopped = crawler
        .renderer
        .navigate(&first)
        .await
        .err()
        .map(|source| DiscoveryError::PageFailed { page, source });

    while stopped.is_none() {
        let ready = ReadyCondition::element(LISTING_READY);
        if let Err(e) = crawler.renderer.wait_until(&ready, timeout).await {
            warn!("Listing page {} not ready ({}), reading it as is", page, e);
        }

        let (links, page_cards) = crawler
            .renderer
            .current_document()
            .map(|doc| read_listing(&doc, &crawler.extractor))
            .unwrap_or_default();
        pages += 1;

        if links.is_empty() {
            info!("Listing page {} has no detail links, stopping", page);
            break;
        }
        let found = links.len();
        let added = links.into_iter().filter_map(|l| frontier.insert(l).then_some(())).count();
        info!(
            "Listing page {}: {} links ({} new, {} total)",
            page,
            found,
            added,
            frontier.len()
        );

        if let Some(ledger) = cards.as_deref_mut() {
            for card in &page_cards {
                if let Err(e) = ledger.append(card) {
                    frontier.save()?;
                    return Err(e);
                }
            }
        }

        if pages >= max_pages {
            warn!("Reached the {} listing page limit, stopping discovery", max_pages);
            break;
        }

        crawler.pacer.settle(&listing_delay).await;
        let before = crawler.renderer.current_url().unwrap_or_default().to_string();
        match crawler.renderer.trigger_pagination_advance().await {
            Ok(PaginationAdvance::Advanced) => {
                page += 1;
                let changed = ReadyCondition::UrlChanged(before);
                if let Err(e) = crawler.renderer.wait_until(&changed, timeout).await {
                    warn!("Listing page {} URL did not change: {}", page, e);
                }
            }
            Ok(PaginationAdvance::Unavailable) => {
                info!("Listing page {} has no next page, stopping", page);
                break;
            }
            Err(source) => stopped = Some(DiscoveryError::AdvanceFailed { page, source }),
        }
    }

    if frontier.is_empty() {
        stopped = stopped.map(|e| DiscoveryError::NothingDiscovered(into_fetch_error(e)));
    }
    frontier.state = if stopped.is_some() {
        FrontierState::DiscoveryStoppedEarly
    } else {
        FrontierState::Discovered
    };
    frontier.save()?;

    if let Some(e) = &stopped {
        warn!("Discovery stopped early: {}", e);
    }
    Ok(DiscoveryReport {
        pages,
        new_links: frontier.len() - already,
        stopped,
    })
}

/// Links and cards of the current listing page. The document is dropped
/// before the next `.await`: `Html` is not `Send`.
fn read_listing(doc: &Html, fx: &FieldExtractor) -> (Vec<String>, Vec<ListingCard>) {
    (listing::detail_links(doc, fx), listing::cards(doc, fx))
}

fn into_fetch_error(e: DiscoveryError) -> FetchError {
    match e {
        DiscoveryError::NothingDiscovered(source)
        | DiscoveryError::PageFailed { source, .. }
        | DiscoveryError::AdvanceFailed { source, .. } => source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::render::testing::FakeSite;
    use crate::render::StaticRenderer;

    const LISTING: &str = "https://clutch.co/it-services/india";

    fn listing_page(slugs: &[&str], next: Option<u32>) -> String {
        let mut html = String::from("<ul>");
        for slug in slugs {
            html.push_str(&format!(
                r#"<li class="provider-list-item"><h3 class="provider__title"><a href="/profile/{0}">{0}</a></h3></li>"#,
                slug
            ));
        }
        html.push_str("</ul>");
        if let Some(n) = next {
            html.push_str(&format!(r#"<a rel="next" href="/it-services/india?page={}">Next</a>"#, n));
        }
        html
    }

    fn settings(dir: &Path) -> Settings {
        Settings {
            inter_page_delay_min_ms: 0,
            inter_page_delay_max_ms: 0,
            initial_settle_delay_ms: 0,
            profile_settle_delay_ms: 0,
            wait_timeout_ms: 20,
            poll_interval_ms: 5,
            frontier_path: dir.join("frontier.json"),
            ledger_path: dir.join("profiles.jsonl"),
            ..Settings::default()
        }
    }

    fn crawler(site: &FakeSite, settings: Settings) -> Crawler {
        let renderer = StaticRenderer::new(site.clone(), settings.poll_interval());
        Crawler::new(Box::new(renderer), settings).unwrap()
    }

    #[test]
    fn load_missing_and_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frontier.json");

        let f = Frontier::load(&path).unwrap();
        assert_eq!(f.state(), FrontierState::Uninitialized);
        assert!(f.is_empty());

        std::fs::write(&path, r#"["https://clutch.co/profile/a", "https://clutch.co/profile/a", "https://clutch.co/profile/b"]"#).unwrap();
        let f = Frontier::load(&path).unwrap();
        assert_eq!(f.state(), FrontierState::Discovered);
        assert_eq!(f.links(), ["https://clutch.co/profile/a", "https://clutch.co/profile/b"]);
    }

    #[test]
    fn save_is_pretty_array_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/frontier.json");
        let mut f = Frontier::load(&path).unwrap();
        assert!(f.insert("https://clutch.co/profile/a".into()));
        assert!(!f.insert("https://clutch.co/profile/a".into()));
        f.save().unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("[\n"));
        let back: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, vec!["https://clutch.co/profile/a"]);
        assert!(!dir.path().join("data/frontier.json.tmp").exists());
    }

    #[test]
    fn corrupt_frontier_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frontier.json");
        std::fs::write(&path, "{not a list").unwrap();
        assert!(Frontier::load(&path).is_err());
    }

    #[tokio::test]
    async fn walks_until_empty_page() {
        let dir = tempfile::tempdir().unwrap();
        let site = FakeSite::default();
        site.page(LISTING, &listing_page(&["a", "b", "c"], Some(1)));
        site.page(&format!("{}?page=1", LISTING), &listing_page(&["c", "d"], Some(2)));
        site.page(&format!("{}?page=2", LISTING), &listing_page(&[], Some(3)));

        let settings = settings(dir.path());
        let mut frontier = Frontier::load(&settings.frontier_path).unwrap();
        let mut c = crawler(&site, settings.clone());
        let report = discover(&mut c, &mut frontier, None).await.unwrap();

        assert!(report.stopped.is_none());
        assert_eq!(report.pages, 3);
        assert_eq!(report.new_links, 4);
        assert_eq!(frontier.state(), FrontierState::Discovered);
        assert_eq!(site.fetches(&format!("{}?page=3", LISTING)), 0);

        let saved = Frontier::load(&settings.frontier_path).unwrap();
        assert_eq!(saved.links(), frontier.links());
    }

    #[tokio::test]
    async fn page_cap_stops_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let site = FakeSite::default();
        site.page(LISTING, &listing_page(&["a"], Some(1)));
        site.page(&format!("{}?page=1", LISTING), &listing_page(&["b"], Some(2)));

        let settings = Settings {
            max_listing_pages: 1,
            ..settings(dir.path())
        };
        let mut frontier = Frontier::load(&settings.frontier_path).unwrap();
        let mut c = crawler(&site, settings);
        let report = discover(&mut c, &mut frontier, None).await.unwrap();

        assert!(report.stopped.is_none());
        assert_eq!(frontier.len(), 1);
        assert_eq!(site.fetches(&format!("{}?page=1", LISTING)), 0);
    }

    #[tokio::test]
    async fn failed_advance_keeps_partial_frontier() {
        let dir = tempfile::tempdir().unwrap();
        let site = FakeSite::default();
        site.page(LISTING, &listing_page(&["a", "b"], Some(1)));
        site.fail(&format!("{}?page=1", LISTING));

        let settings = settings(dir.path());
        let mut frontier = Frontier::load(&settings.frontier_path).unwrap();
        let mut c = crawler(&site, settings.clone());
        let report = discover(&mut c, &mut frontier, None).await.unwrap();

        assert!(matches!(report.stopped, Some(DiscoveryError::AdvanceFailed { page: 0, .. })));
        assert_eq!(frontier.state(), FrontierState::DiscoveryStoppedEarly);
        assert_eq!(Frontier::load(&settings.frontier_path).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unreachable_listing_is_nothing_discovered() {
        let dir = tempfile::tempdir().unwrap();
        let site = FakeSite::default();
        site.fail(LISTING);

        let settings = settings(dir.path());
        let mut frontier = Frontier::load(&settings.frontier_path).unwrap();
        let mut c = crawler(&site, settings);
        let report = discover(&mut c, &mut frontier, None).await.unwrap();

        assert!(matches!(report.stopped, Some(DiscoveryError::NothingDiscovered(_))));
        assert!(frontier.is_empty());
    }

    #[tokio::test]
    async fn rediscovery_merges_into_existing_links() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        std::fs::write(&settings.frontier_path, r#"["https://clutch.co/profile/old"]"#).unwrap();

        let site = FakeSite::default();
        site.page(LISTING, &listing_page(&["a", "old"], None));

        let mut frontier = Frontier::load(&settings.frontier_path).unwrap();
        let mut c = crawler(&site, settings);
        let report = discover(&mut c, &mut frontier, None).await.unwrap();

        assert_eq!(report.new_links, 1);
        assert_eq!(
            frontier.links(),
            ["https://clutch.co/profile/old", "https://clutch.co/profile/a"]
        );
    }

    #[tokio::test]
    async fn writes_listing_cards_once() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let site = FakeSite::default();
        site.page(LISTING, &listing_page(&["a", "b"], Some(1)));
        site.page(&format!("{}?page=1", LISTING), &listing_page(&["b"], None));

        let cards_path = dir.path().join("cards.jsonl");
        let mut cards: Ledger<ListingCard> = Ledger::open(&cards_path).unwrap();
        let mut frontier = Frontier::load(&settings.frontier_path).unwrap();
        let mut c = crawler(&site, settings);
        discover(&mut c, &mut frontier, Some(&mut cards)).await.unwrap();

        assert_eq!(cards.len(), 2);
        let raw = std::fs::read_to_string(&cards_path).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }
}
