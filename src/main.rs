use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use event_ingest::browser::BrowserPool;
use event_ingest::common::constants::get_supported_scrapers;
use event_ingest::config::AppConfig;
use event_ingest::extraction::{CostTracker, EventExtractor, ExtractOptions, HybridExtractor, MistralExtractor};
use event_ingest::import::CsvImportService;
use event_ingest::logging;
use event_ingest::metrics;
use event_ingest::scrapers::{ScraperService, ScraperType};
use event_ingest::storage::{
    CategoryService, InMemoryCategoryService, InMemoryEventService, InMemoryLocationSearch,
};

#[derive(Parser)]
#[command(name = "event_ingest")]
#[command(about = "Event listing ingestion: site scrapers, hybrid LLM extraction and CSV import")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML config file (defaults to ./config.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the listing sites for a date or a date range
    Scrape {
        /// Single day (YYYY-MM-DD)
        #[arg(long, conflicts_with_all = ["from", "to"])]
        date: Option<NaiveDate>,
        /// First day of the range (YYYY-MM-DD)
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,
        /// Last day of the range (YYYY-MM-DD)
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
        /// Scrapers to run (comma-separated). Available: event_finder, curt, rausgegangen, eventbrite, parks
        #[arg(long)]
        scrapers: Option<String>,
    },
    /// Scrape a single listing page with one scraper
    ScrapeUrl {
        scraper: ScraperType,
        url: String,
    },
    /// Extract events from any page with the LLM, falling back to a site scraper
    Extract {
        url: String,
        /// Do not fall back to a site scraper when the LLM finds nothing
        #[arg(long)]
        no_fallback: bool,
    },
    /// Import events from a CSV file in the import template format
    Import {
        file: PathBuf,
        /// JSON file with the category list ([{"id": ..., "name": ...}])
        #[arg(long)]
        categories: Option<PathBuf>,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_scraper_list(list: &str) -> anyhow::Result<Vec<ScraperType>> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            name.parse::<ScraperType>().with_context(|| {
                format!(
                    "unknown scraper '{}', available: {}",
                    name,
                    get_supported_scrapers().join(", ")
                )
            })
        })
        .collect()
}

async fn run(cli: Cli, config: AppConfig, pool: Arc<BrowserPool>) -> anyhow::Result<()> {
    match cli.command {
        Commands::Scrape {
            date,
            from,
            to,
            scrapers,
        } => {
            let service = ScraperService::new(pool, &config);
            if let Some(list) = scrapers {
                let wanted = parse_scraper_list(&list)?;
                for kind in ScraperType::all() {
                    if !wanted.contains(&kind) {
                        service.deactivate_scraper(kind).await;
                    }
                }
            }

            let events = match (date, from, to) {
                (Some(date), _, _) => service.scrape_events_for_date(date).await?,
                (None, Some(from), Some(to)) => service.scrape_events_for_date_range(from, to).await?,
                _ => {
                    let today = chrono::Local::now().date_naive();
                    service.scrape_events_for_date(today).await?
                }
            };
            info!(events = events.len(), "Scrape finished");
            print_json(&events)?;
        }
        Commands::ScrapeUrl { scraper, url } => {
            let service = ScraperService::new(pool, &config);
            let result = service
                .scrape_events_from_url(scraper, &url)
                .await
                .with_context(|| format!("scraping {} with {}", url, scraper))?;
            print_json(&result)?;
        }
        Commands::Extract { url, no_fallback } => {
            let tracker = Arc::new(CostTracker::new());
            let extractor: Option<Arc<dyn EventExtractor>> =
                match MistralExtractor::new(&config.mistral, tracker.clone()) {
                    Ok(extractor) => Some(Arc::new(extractor)),
                    Err(e) => {
                        warn!(error = %e, "LLM extraction unavailable, using site scrapers only");
                        None
                    }
                };
            let scrapers = Arc::new(ScraperService::new(pool.clone(), &config));
            let hybrid = HybridExtractor::new(pool, extractor, scrapers);
            let options = ExtractOptions {
                fallback: !no_fallback,
            };

            let extraction = hybrid
                .extract_from_url(&url, options)
                .await
                .with_context(|| format!("extracting events from {}", url))?;
            print_json(&extraction)?;
            eprintln!("{}", tracker.summary());
        }
        Commands::Import { file, categories } => {
            if !file.exists() {
                bail!("CSV file not found: {}", file.display());
            }
            let categories: Arc<dyn CategoryService> = match categories {
                Some(path) => Arc::new(
                    InMemoryCategoryService::from_json_file(&path)
                        .with_context(|| format!("reading categories from {}", path.display()))?,
                ),
                None => Arc::new(InMemoryCategoryService::standard()),
            };
            let service = CsvImportService::new(
                Arc::new(InMemoryEventService::new()),
                Arc::new(InMemoryLocationSearch::new()),
                categories,
            )
            .with_settings(&config.import);

            let result = service
                .import_file(&file)
                .await
                .with_context(|| format!("importing {}", file.display()))?;
            print_json(&result)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();
    metrics::init_metrics();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let pool = Arc::new(BrowserPool::http(config.browser.clone()));

    let outcome = run(cli, config, pool.clone()).await;
    if let Err(e) = pool.close_browser().await {
        warn!(error = %e, "Closing the browser failed");
    }
    outcome
}
