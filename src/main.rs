mod config;
mod crawl;
mod error;
mod frontier;
mod ledger;
mod pacing;
mod parser;
mod record;
mod render;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use config::{RendererKind, Settings};
use crawl::Crawler;
use frontier::{DiscoveryReport, Frontier};
use ledger::Ledger;
use parser::locator::FieldExtractor;
use record::{LedgerRecord, ListingCard, ProfileRecord};
use render::{HttpSource, PageRenderer, SpiderSource, StaticRenderer};

#[derive(Parser)]
#[command(
    name = "directory_scraper",
    about = "Business-directory crawler: listing discovery, then profile extraction"
)]
struct Cli {
    /// Settings file (default: ./scraper.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the listing pages and save the profile URL frontier
    Discover {
        /// Walk the listing again, merging into the saved frontier
        #[arg(long)]
        rediscover: bool,
    },
    /// Scrape frontier profiles not yet in the ledger
    Scrape {
        /// Max profiles to scrape (default: all pending)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Discover (if needed) + scrape in one pipeline
    Run {
        /// Max profiles to scrape
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Walk the listing again even if a frontier exists
        #[arg(long)]
        rediscover: bool,
    },
    /// Show frontier and ledger counts
    Stats,
    /// Build a record from a saved profile page and print it
    Extract {
        /// HTML file of a rendered profile page
        html_file: PathBuf,
        /// Profile URL to record the page under
        #[arg(long)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Discover { rediscover } => {
            let mut frontier = Frontier::load(&settings.frontier_path)?;
            let mut cards = open_cards(&settings)?;
            let mut crawler = Crawler::new(build_renderer(&settings)?, settings.clone())?;
            match crawler
                .ensure_frontier(&mut frontier, rediscover, cards.as_mut())
                .await?
            {
                Some(report) => print_discovery(&report, &frontier),
                None => println!(
                    "Frontier already has {} URLs. Use --rediscover to walk the listing again.",
                    frontier.len()
                ),
            }
            Ok(())
        }
        Commands::Scrape { limit } => {
            let frontier = Frontier::load(&settings.frontier_path)?;
            if frontier.is_empty() {
                println!("No frontier found. Run 'discover' first.");
                return Ok(());
            }
            let mut ledger: Ledger<ProfileRecord> = Ledger::open(&settings.ledger_path)?;
            let mut crawler = Crawler::new(build_renderer(&settings)?, settings.clone())?;
            println!(
                "Scraping profiles ({} in frontier, {} already ledgered)...",
                frontier.len(),
                ledger.len()
            );
            let stats = crawler.scrape(&frontier, &mut ledger, limit).await?;
            println!(
                "Done: {} scraped ({} ok, {} errors, {} skipped as already done).",
                stats.total, stats.ok, stats.errors, stats.skipped
            );
            Ok(())
        }
        Commands::Run { limit, rediscover } => {
            let mut frontier = Frontier::load(&settings.frontier_path)?;
            let mut cards = open_cards(&settings)?;
            let mut ledger: Ledger<ProfileRecord> = Ledger::open(&settings.ledger_path)?;
            let mut crawler = Crawler::new(build_renderer(&settings)?, settings.clone())?;

            // Phase 1: Discover
            let t_discover = Instant::now();
            if let Some(report) = crawler
                .ensure_frontier(&mut frontier, rediscover, cards.as_mut())
                .await?
            {
                print_discovery(&report, &frontier);
                println!("Discovery took {:.1}s", t_discover.elapsed().as_secs_f64());
            }
            if frontier.is_empty() {
                println!("Nothing to scrape (no profile URLs discovered).");
                return Ok(());
            }

            // Phase 2: Scrape
            let t_scrape = Instant::now();
            println!(
                "Pipeline: scraping profiles ({} in frontier, {} already ledgered)...",
                frontier.len(),
                ledger.len()
            );
            let stats = crawler.scrape(&frontier, &mut ledger, limit).await?;
            println!(
                "Scraped {} profiles ({} ok, {} errors) in {:.1}s",
                stats.total,
                stats.ok,
                stats.errors,
                t_scrape.elapsed().as_secs_f64()
            );
            Ok(())
        }
        Commands::Stats => {
            let frontier = Frontier::load(&settings.frontier_path)?;
            let done = ledger::read_keys(&settings.ledger_path, ProfileRecord::KEY_FIELD)?;
            let pending = frontier
                .links()
                .iter()
                .filter(|url| !done.keys.contains(*url))
                .count();
            println!("Frontier:  {}", frontier.len());
            println!("Ledgered:  {}", done.keys.len());
            println!("Pending:   {}", pending);
            if done.unreadable > 0 {
                println!("Unreadable ledger lines: {}", done.unreadable);
            }
            if let Some(path) = &settings.listing_cards_path {
                let cards = ledger::read_keys(path, ListingCard::KEY_FIELD)?;
                println!("Cards:     {}", cards.keys.len());
            }
            Ok(())
        }
        Commands::Extract { html_file, url } => {
            let html = std::fs::read_to_string(&html_file)
                .with_context(|| format!("Failed to read {}", html_file.display()))?;
            let extractor = FieldExtractor::new(settings.origin()?);
            let record = crawl::build_record(&html, &url, &extractor);
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn build_renderer(settings: &Settings) -> anyhow::Result<Box<dyn PageRenderer>> {
    let poll = settings.poll_interval();
    Ok(match settings.renderer {
        RendererKind::Spider => Box::new(StaticRenderer::new(SpiderSource::from_env()?, poll)),
        RendererKind::Http => Box::new(StaticRenderer::new(
            HttpSource::new(&settings.user_agent, settings.wait_timeout())?,
            poll,
        )),
    })
}

fn open_cards(settings: &Settings) -> anyhow::Result<Option<Ledger<ListingCard>>> {
    settings
        .listing_cards_path
        .as_deref()
        .map(Ledger::open)
        .transpose()
}

fn print_discovery(report: &DiscoveryReport, frontier: &Frontier) {
    println!(
        "Walked {} listing pages: {} new profile URLs ({} total)",
        report.pages,
        report.new_links,
        frontier.len()
    );
    if let Some(e) = &report.stopped {
        println!("Discovery stopped early: {}", e);
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
