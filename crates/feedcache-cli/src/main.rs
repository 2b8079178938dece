//! feedcache - mirror a repository activity feed and browse natural events
//! by category from the terminal.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use feedcache_core::models::events_within_days;
use feedcache_core::utils::truncate_string;
use feedcache_core::{ApiClient, Category, CategoryMerger, Config, FeedRefresher, RefreshOutcome};
use futures::StreamExt;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ============================================================================
// Constants
// ============================================================================

/// Overrides the configured cache directory
const CACHE_DIR_ENV: &str = "FEEDCACHE_CACHE_DIR";

/// Column width for actor names in the feed listing
const ACTOR_COLUMN_WIDTH: usize = 20;

/// Event titles longer than this are cut in the category listing
const MAX_TITLE_WIDTH: usize = 70;

const USAGE: &str = "\
Usage: feedcache <command> [options]

Commands:
  init                 Write the current configuration to the config file
  show                 Print the cached feed, fetching it first if nothing is cached
  refresh              Fetch new feed events and print the merged feed
  categories [--days N]
                       Load event categories and their open/closed events;
                       with --days, list the events dated within N days

Environment:
  RUST_LOG             Log filter (default: warn)
  FEEDCACHE_CACHE_DIR  Cache directory override";

/// Initialize the tracing subscriber for logging
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = init_tracing();

    let args: Vec<String> = std::env::args().collect();

    let mut config = Config::load()?;
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
        config.cache_dir = Some(PathBuf::from(dir));
    }

    match args.get(1).map(String::as_str) {
        Some("init") => write_config(&config),
        Some("show") => show_feed(&config).await,
        Some("refresh") => refresh_feed(&config).await,
        Some("categories") => {
            let days = parse_days(&args[2..])?;
            load_categories(&config, days).await
        }
        Some("--help") | Some("-h") | None => {
            println!("{}", USAGE);
            Ok(())
        }
        Some(other) => {
            eprintln!("{}", USAGE);
            Err(anyhow::anyhow!("Unknown command: {}", other))
        }
    }
}

fn write_config(config: &Config) -> Result<()> {
    config.save()?;
    println!("Wrote {}", Config::config_path()?.display());
    Ok(())
}

fn parse_days(args: &[String]) -> Result<Option<u32>> {
    match args {
        [] => Ok(None),
        [flag, value] if flag == "--days" => {
            let days = value
                .parse()
                .with_context(|| format!("Invalid --days value: {}", value))?;
            Ok(Some(days))
        }
        _ => Err(anyhow::anyhow!("Unexpected arguments: {}", args.join(" "))),
    }
}

fn print_feed(refresher: &FeedRefresher) {
    for event in refresher.events() {
        println!(
            "{:<width$} {}  ({})",
            truncate_string(&event.actor_name, ACTOR_COLUMN_WIDTH),
            event.summary(),
            event.formatted_timestamp(),
            width = ACTOR_COLUMN_WIDTH
        );
    }
}

fn report(outcome: RefreshOutcome) {
    match outcome {
        RefreshOutcome::Updated { received, cached } => {
            eprintln!("Fetched {} events, {} in history", received, cached)
        }
        RefreshOutcome::NotModified => eprintln!("Feed unchanged since last refresh"),
        RefreshOutcome::Failed => eprintln!("Refresh failed, showing cached feed"),
    }
}

async fn show_feed(config: &Config) -> Result<()> {
    let refresher = FeedRefresher::from_config(config)?;
    if !refresher.has_cached_events() {
        info!("No cached feed, fetching");
        report(refresher.refresh().await);
    }
    print_feed(&refresher);
    Ok(())
}

async fn refresh_feed(config: &Config) -> Result<()> {
    let refresher = FeedRefresher::from_config(config)?;
    report(refresher.refresh().await);
    print_feed(&refresher);
    Ok(())
}

async fn load_categories(config: &Config, days: Option<u32>) -> Result<()> {
    let client = ApiClient::from_config(config)?;
    let merger = CategoryMerger::from_config(client, config);

    let mut snapshots = Box::pin(merger.load_categories_with_events());
    let mut latest: Vec<Category> = Vec::new();
    let mut received = 0usize;

    while let Some(snapshot) = snapshots.next().await {
        if received == 0 {
            eprintln!("Loaded {} categories, fetching events...", snapshot.len());
        } else {
            let attached: usize = snapshot.iter().map(|c| c.events.len()).sum();
            debug!(batch = received, attached = attached, "Category snapshot updated");
        }
        received += 1;
        latest = snapshot;
    }

    let now = Utc::now();
    for category in &latest {
        println!("{}", category.display_label());
        if let Some(days) = days {
            for event in events_within_days(&category.events, days, now) {
                println!(
                    "    {:<12} {}",
                    event.formatted_date(),
                    truncate_string(&event.title, MAX_TITLE_WIDTH)
                );
            }
        }
    }

    Ok(())
}
