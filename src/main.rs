use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use ses_scraper::config::Config;
use ses_scraper::fetch::ReqwestFetcher;
use ses_scraper::logging;
use ses_scraper::pipeline::Harvester;
use ses_scraper::storage::{InMemoryStorage, Storage};
use ses_scraper::sweep::Sweeper;

#[derive(Parser)]
#[command(name = "ses_scraper")]
#[command(about = "Sydney Event Scene listing scraper and reconciler")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape and reconcile without expiring stale records (diagnostic)
    Ingest {
        /// Specific sources to run (comma-separated). Available: Eventbrite, Meetup, TimeOut
        #[arg(long)]
        sources: Option<String>,
    },
    /// Run only the staleness sweep
    Sweep {
        /// Retention window in days (overrides config)
        #[arg(long)]
        days: Option<i64>,
    },
    /// Run the full cycle: scrape, reconcile, then sweep
    Run {
        /// Specific sources to run (comma-separated)
        #[arg(long)]
        sources: Option<String>,
    },
}

/// Apply a `--sources` filter, warning about names that match nothing.
fn apply_source_filter(config: &mut Config, filter: Option<String>) {
    let Some(filter) = filter else { return };
    let names: Vec<String> = filter.split(',').map(|s| s.trim().to_string()).collect();

    for name in config.retain_sources(&names) {
        println!(
            "⚠️  Unknown source: {name} (supported: {})",
            ses_scraper::constants::supported_sources().join(", ")
        );
    }
}

fn build_harvester(config: Config, storage: Arc<dyn Storage>) -> anyhow::Result<Harvester> {
    let fetcher = ReqwestFetcher::new(
        Duration::from_secs(config.fetch.timeout_seconds),
        &config.fetch.user_agent,
    )?;
    Ok(Harvester::new(Arc::new(fetcher), storage, config))
}

fn print_cycle_summary(result: &ses_scraper::pipeline::CycleResult) {
    println!("\n📊 Cycle results:");
    println!("   Sources: {} ({} failed)", result.sources_total, result.sources_failed.len());
    println!("   Drafts: {}", result.drafts);
    println!("   Created: {}", result.created);
    println!("   Updated: {}", result.updated);
    println!("   Unchanged: {}", result.unchanged);
    println!("   Skipped: {}", result.skipped);
    println!("   Expired: {}", result.expired);

    if !result.sources_failed.is_empty() {
        println!("\n⚠️  Failed sources:");
        for name in &result.sources_failed {
            println!("   - {name}");
        }
    }
    if result.deadline_hit {
        println!(
            "\n⚠️  Cycle deadline reached, {} sources not fetched",
            result.sources_skipped
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config)?;
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());

    match cli.command {
        Commands::Ingest { sources } => {
            println!("🔄 Running ingestion (no sweep)...");
            apply_source_filter(&mut config, sources);
            let harvester = build_harvester(config, storage)?;
            match harvester.run_cycle(false).await {
                Ok(result) => print_cycle_summary(&result),
                Err(e) => {
                    error!("Ingestion cycle failed: {}", e);
                    println!("❌ Ingestion cycle failed: {e}");
                }
            }
        }
        Commands::Sweep { days } => {
            println!("🧹 Running staleness sweep...");
            let window = chrono::Duration::days(days.unwrap_or(config.retention_days));
            let sweeper = Sweeper::new(storage);
            match sweeper.run(window, chrono::Utc::now()).await {
                Ok(expired) => println!("✅ Sweep expired {expired} records"),
                Err(e) => {
                    error!("Sweep failed: {}", e);
                    println!("❌ Sweep failed: {e}");
                }
            }
        }
        Commands::Run { sources } => {
            println!("🚀 Running full cycle (scrape + reconcile + sweep)...");
            apply_source_filter(&mut config, sources);
            let harvester = build_harvester(config, storage)?;
            match harvester.run_cycle(true).await {
                Ok(result) => {
                    print_cycle_summary(&result);
                    println!("\n✅ Cycle completed");
                }
                Err(e) => {
                    error!("Cycle failed: {}", e);
                    println!("❌ Cycle failed: {e}");
                }
            }
        }
    }
    Ok(())
}
