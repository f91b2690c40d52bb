use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use scraper::Html;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::FetchError;
use crate::frontier::{self, DiscoveryReport, Frontier, FrontierState};
use crate::ledger::Ledger;
use crate::pacing::{DelayPolicy, Pacer};
use crate::parser::locator::FieldExtractor;
use crate::parser::profile::{self, PROFILE_READY};
use crate::record::{ListingCard, ProfileRecord};
use crate::render::{PageRenderer, ReadyCondition};

/// Owns the one rendering session and the pacing state for a run.
pub struct Crawler {
    pub(crate) renderer: Box<dyn PageRenderer>,
    pub(crate) settings: Settings,
    pub(crate) extractor: FieldExtractor,
    pub(crate) pacer: Pacer,
    pub(crate) listing_delay: DelayPolicy,
    pub(crate) profile_delay: DelayPolicy,
}

/// Scrape stats returned after completion.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScrapeStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
    /// Frontier links already in the ledger before this run.
    pub skipped: usize,
}

impl Crawler {
    pub fn new(renderer: Box<dyn PageRenderer>, settings: Settings) -> Result<Self> {
        let extractor = FieldExtractor::new(settings.origin()?);
        let pacer = Pacer::new(settings.initial_settle_delay(), settings.challenge_requests);
        let listing_delay = DelayPolicy::jitter(settings.inter_page_delay_range());
        let profile_delay = DelayPolicy::Fixed(settings.profile_settle_delay());
        Ok(Self {
            renderer,
            settings,
            extractor,
            pacer,
            listing_delay,
            profile_delay,
        })
    }

    /// Run discovery unless a persisted frontier already exists.
    /// `rediscover` forces a pass that merges into the existing links.
    pub async fn ensure_frontier(
        &mut self,
        frontier: &mut Frontier,
        rediscover: bool,
        cards: Option<&mut Ledger<ListingCard>>,
    ) -> Result<Option<DiscoveryReport>> {
        if frontier.state() == FrontierState::Discovered && !rediscover {
            info!(
                "Frontier already holds {} links, skipping discovery",
                frontier.len()
            );
            return Ok(None);
        }
        frontier::discover(self, frontier, cards).await.map(Some)
    }

    /// Build and append a record for every frontier link not yet in the
    /// ledger, in frontier order. A link that fails is logged and left for
    /// the next run.
    pub async fn scrape(
        &mut self,
        frontier: &Frontier,
        ledger: &mut Ledger<ProfileRecord>,
        limit: Option<usize>,
    ) -> Result<ScrapeStats> {
        let remaining: Vec<&String> = frontier
            .links()
            .iter()
            .filter(|url| !ledger.contains(url))
            .collect();
        let skipped = frontier.len() - remaining.len();
        let pending: Vec<String> = remaining
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        let total = pending.len();

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
                .progress_chars("=> "),
        );

        let mut ok = 0usize;
        let mut errors = 0usize;
        for url in &pending {
            match self.scrape_one(url).await {
                Ok(record) => {
                    ledger.append(&record)?;
                    ok += 1;
                }
                Err(e) => {
                    warn!("Skipping {}: {}", url, e);
                    errors += 1;
                }
            }
            pb.inc(1);
        }

        pb.finish_and_clear();
        info!("Scraped {} profiles ({} ok, {} errors)", total, ok, errors);

        Ok(ScrapeStats {
            total,
            ok,
            errors,
            skipped,
        })
    }

    async fn scrape_one(&mut self, url: &str) -> Result<ProfileRecord, FetchError> {
        let delay = self.profile_delay;
        self.pacer.settle(&delay).await;
        self.renderer.navigate(url).await?;
        self.renderer
            .wait_until(
                &ReadyCondition::element(PROFILE_READY),
                self.settings.wait_timeout(),
            )
            .await?;
        let doc = self.renderer.current_document().ok_or(FetchError::NoPage)?;
        Ok(profile::build(&doc, url, &self.extractor))
    }
}

/// Parse and build in one synchronous step: `Html` is not `Send`.
pub fn build_record(html: &str, profile_url: &str, fx: &FieldExtractor) -> ProfileRecord {
    let doc = Html::parse_document(html);
    profile::build(&doc, profile_url, fx)
}
