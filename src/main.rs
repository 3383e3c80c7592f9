//! Harvest Engine main entry point
//!
//! This is the command-line host for the crawl engine: it loads the
//! configuration, opens the SQLite store and drives the engine until the
//! frontier runs dry or Ctrl-C is pressed.

use anyhow::Context;
use clap::Parser;
use harvest_engine::config::{load_config_with_hash, Config};
use harvest_engine::crawler::{CrawlEngine, CrawlEvent, HttpPageFetcher};
use harvest_engine::output::{load_statistics, print_statistics};
use harvest_engine::storage::open_storage;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

/// Harvest Engine: a learning crawl prioritizer
///
/// Visits the most promising discovered URL at a polite pace, learns which
/// URL shapes yield the most entities, and keeps its frontier across runs.
#[derive(Parser, Debug)]
#[command(name = "harvest-engine")]
#[command(version)]
#[command(about = "A learning crawl prioritizer", long_about = None)]
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

    /// Override the configured dispatch interval (milliseconds)
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Forget visited URLs so the whole frontier is eligible again
    #[arg(long)]
    reset_visited: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, cli.interval_ms);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, cli.interval_ms, cli.reset_visited).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("harvest_engine=info,warn"),
            1 => EnvFilter::new("harvest_engine=debug,info"),
            2 => EnvFilter::new("harvest_engine=trace,debug"),
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
fn handle_dry_run(config: &Config, interval_ms: Option<u64>) {
    println!("=== Harvest Engine Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Request interval: {}ms (±{:.0}% jitter)",
        interval_ms.unwrap_or(config.crawler.request_interval_ms),
        config.crawler.jitter * 100.0
    );
    println!("  Fetch timeout: {}ms", config.crawler.fetch_timeout_ms);
    println!("  Cooldown: {}ms", config.crawler.cooldown_ms);
    println!(
        "  Base domain delay: {}ms",
        config.crawler.base_domain_delay_ms
    );
    println!(
        "  Blocking keywords: {}",
        config.crawler.blocking_keywords.join(", ")
    );

    println!("\nLearning:");
    println!("  Frontier capacity: {}", config.frontier.capacity);
    println!("  Learn threshold: {} entities", config.learner.learn_threshold);
    println!("  Entity paths: {}", config.target.entity_paths.join(", "));
    println!(
        "  Collection patterns: {}",
        config.target.collection_patterns.join(", ")
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    if config.target.allowed_domains.is_empty() {
        println!("\nAllowed Domains: any");
    } else {
        println!(
            "\nAllowed Domains ({}):",
            config.target.allowed_domains.len()
        );
        for domain in &config.target.allowed_domains {
            println!("  - {}", domain);
        }
    }

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  * {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open {}", config.output.database_path))?;
    let stats = load_statistics(&store, config).context("Failed to read engine tables")?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    interval_ms: Option<u64>,
    reset_visited: bool,
) -> anyhow::Result<()> {
    let store = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open {}", config.output.database_path))?;
    let fetcher = HttpPageFetcher::new(&config).context("Failed to build HTTP client")?;
    let interval_ms = interval_ms.unwrap_or(config.crawler.request_interval_ms);

    tracing::info!("Seed URLs: {}", config.seeds.len());
    let engine = CrawlEngine::init(config, store, fetcher);

    if reset_visited {
        engine.reset_visited();
    }

    let mut events = engine.subscribe();
    let driver = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run().await }
    });

    engine.start_crawl(interval_ms);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping crawl");
                engine.stop_crawl();
                break;
            }
            event = events.recv() => match event {
                Ok(CrawlEvent::Complete) => break,
                Ok(CrawlEvent::Blocked { url, cooldown_ms }) => {
                    tracing::warn!("Blocked at {}; pausing {}s", url, cooldown_ms / 1000);
                }
                Ok(CrawlEvent::PersistenceWarning { message }) => {
                    tracing::warn!("{}", message);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!("Missed {} engine events", missed);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    engine
        .shutdown()
        .await
        .context("Failed to persist engine state on shutdown")?;
    driver.await.context("Crawl driver panicked")?;

    let snapshot = engine.get_state();
    let site = engine.get_site_statistics();
    tracing::info!(
        "Crawl finished: {} visited, {} waiting, {} failed, {} patterns learned",
        snapshot.visited_count,
        snapshot.unvisited_count,
        snapshot.failed_count,
        site.patterns_learned
    );

    Ok(())
}
