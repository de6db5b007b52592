//! Listing Harvester main entry point
//!
//! This is the command-line interface for the Listing Harvester crawler.

use anyhow::{bail, Context};
use clap::Parser;
use listing_harvester::config::{load_config_with_hash, Config};
use listing_harvester::crawler::{
    build_http_client, page_url, CrawlController, HtmlExtractor, ReqwestPageFetcher,
};
use listing_harvester::geocoding::NominatimResolver;
use listing_harvester::output::{load_statistics, print_statistics};
use listing_harvester::storage::{
    open_storage, CheckpointStore, JsonCheckpointStore, ListingStore, SqliteStorage,
};
use listing_harvester::{HarvestError, ListingRecord};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Listing Harvester: a resumable real-estate listing crawler
///
/// Walks a paginated listing source page by page, enriches every listing
/// with its detail page and coordinates, drops near-duplicates and stores
/// the result in SQLite.
#[derive(Parser, Debug)]
#[command(name = "listing-harvester")]
#[command(version)]
#[command(about = "A resumable real-estate listing crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume from the stored checkpoint
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Discard the stored checkpoint and start at page 1
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Stop after this page number (0 = unbounded)
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Skip detail pages; store listing stubs only
    #[arg(long)]
    no_details: bool,

    /// Skip coordinate lookups
    #[arg(long)]
    no_enrichment: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration
    fn apply_overrides(&self, config: &mut Config) {
        if self.resume {
            config.crawler.resume = true;
        }
        if let Some(max_pages) = self.max_pages {
            config.crawler.max_pages = max_pages;
        }
        if self.no_details {
            config.crawler.fetch_details = false;
        }
        if self.no_enrichment {
            config.crawler.enable_enrichment = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    cli.apply_overrides(&mut config);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_harvester=info,warn"),
            1 => EnvFilter::new("listing_harvester=debug,info"),
            2 => EnvFilter::new("listing_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let crawler = &config.crawler;
    let base = Url::parse(&crawler.base_url)?;

    println!("=== Listing Harvester Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Source: {}", crawler.source);
    println!("  Base URL: {}", crawler.base_url);
    match crawler.max_pages {
        0 => println!("  Max pages: unbounded"),
        n => println!("  Max pages: {}", n),
    }
    println!("  Fetch details: {}", crawler.fetch_details);
    println!("  Enrichment: {}", crawler.enable_enrichment);
    println!("  Workers: {}", crawler.max_workers);
    println!("  Batch size: {}", crawler.batch_size);
    println!("  Resume: {}", crawler.resume);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    match &config.output.checkpoint_path {
        Some(path) => println!("  Checkpoints: {}", path),
        None => println!("  Checkpoints: database"),
    }

    println!("\nDeduplication:");
    println!("  Threshold: {}", config.dedup.threshold);
    println!("  Keep best source: {}", config.dedup.keep_best_source);
    println!("  Source priority: {}", config.dedup.source_priority.join(", "));

    println!("\nFirst pages:");
    for page in 1..=3 {
        println!("  {}: {}", page, page_url(&base, &crawler.page_param, page));
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    // Open the database
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    // Load statistics
    let stats = load_statistics(&storage)?;

    // Print statistics
    print_statistics(&stats);

    Ok(())
}

/// Picks the checkpoint backend: the JSON file if configured, else the database
fn checkpoint_store(
    config: &Config,
    storage: &Arc<Mutex<SqliteStorage>>,
) -> Box<dyn CheckpointStore> {
    match &config.output.checkpoint_path {
        Some(path) => Box::new(JsonCheckpointStore::new(path)),
        None => Box::new(Arc::clone(storage)),
    }
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, fresh: bool) -> anyhow::Result<()> {
    let storage = Arc::new(Mutex::new(open_storage(Path::new(
        &config.output.database_path,
    ))?));

    let mut checkpoints = checkpoint_store(&config, &storage);
    if fresh {
        tracing::info!("Starting fresh crawl (discarding checkpoint)");
        checkpoints.clear(&config.crawler.base_url)?;
    }

    let client = build_http_client(&config.user_agent)?;
    let fetcher = Arc::new(
        ReqwestPageFetcher::new(client.clone())
            .with_block_markers(config.extractor.block_markers.clone()),
    );
    let extractor = Arc::new(HtmlExtractor::new(
        fetcher.clone(),
        Url::parse(&config.crawler.base_url)?,
        config.crawler.source.clone(),
        &config.extractor,
    ));
    let resolver = Arc::new(NominatimResolver::new(client, &config.geocoding));

    let mut store = Arc::clone(&storage);
    let mut controller = CrawlController::from_config(&config, fetcher, extractor)?
        .with_resolver(resolver)
        .with_checkpoints(checkpoints)
        .with_batch_callback(Box::new(move |batch: &[ListingRecord]| {
            store.save_batch(batch).map_err(HarvestError::from)
        }));

    let outcome = controller.run().await;

    tracing::info!(
        "Pages fetched: {}, listings collected: {}, stored: {}, failed batches: {}",
        outcome.pages_fetched,
        outcome.listings.len(),
        outcome.listings_saved,
        outcome.batches_failed
    );

    if !outcome.is_done() {
        bail!("crawl aborted: {}", outcome.terminal_reason);
    }

    Ok(())
}
