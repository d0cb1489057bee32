mod crawl;
mod db;
mod diff;
mod error;
mod model;
mod notify;
mod parser;
mod scheduler;
mod settings;

use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::db::{SnapshotStore, SqliteStore};
use crate::notify::{LogSink, Notifier, TelegramSink};
use crate::parser::Selectors;
use crate::scheduler::Scheduler;
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "price_watch", about = "Retail price tracker with change notifications")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the price history table
    Init,
    /// Scrape every listing page once and append the products to the history
    Scrape {
        /// Print the extracted products instead of storing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the current price change report without sending it
    Diff,
    /// Send price change reports on a fixed interval
    Watch {
        /// Seconds between ticks (default: PRICE_WATCH_INTERVAL_SECS or 30)
        #[arg(short, long)]
        interval: Option<u64>,
        /// Stop after this many ticks (default: run until interrupted)
        #[arg(short = 'n', long)]
        ticks: Option<u64>,
    },
    /// Show price history statistics
    Stats,
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
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Init => {
            open_store(&settings)?;
            println!("Price history ready at {}", settings.db_path);
            Ok(())
        }
        Commands::Scrape { dry_run } => {
            let selectors = Selectors::from_settings(&settings)?;
            let client = crawl::build_client(settings.request_timeout())?;
            let summary =
                crawl::scrape_site(&client, &settings.seed_url, &selectors, settings.concurrency)
                    .await?;

            if dry_run {
                for r in &summary.records {
                    println!("{} | {} | {}", r.name, r.price, r.detail_url);
                }
                println!(
                    "{} unique products from {} pages ({} failed). Nothing stored.",
                    summary.records.len(),
                    summary.pages,
                    summary.failed_pages
                );
                return Ok(());
            }

            let store = open_store(&settings)?;
            let written = store
                .append(&summary.records)
                .context("Failed to store scraped products")?;
            println!(
                "Done: {} pages ({} failed), {} products extracted, {} unique, {} stored.",
                summary.pages,
                summary.failed_pages,
                summary.extracted,
                summary.records.len(),
                written
            );
            Ok(())
        }
        Commands::Diff => {
            let store = open_store(&settings)?;
            let history = store.read_all_by_recency_desc()?;
            if let Some(newest) = history.first().and_then(|o| o.observed_at) {
                println!("{} observations, newest from {}", history.len(), newest);
            }
            let report = diff::compute_changes(&history);
            if report.is_empty() {
                println!("No price changes.");
            } else {
                println!("{}", report.render());
                println!("\n{} products changed price.", report.len());
            }
            Ok(())
        }
        Commands::Watch { interval, ticks } => {
            let store = open_store(&settings)?;
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| settings.interval());
            match settings.telegram()? {
                Some(tg) => {
                    let sink = TelegramSink::new(&tg.token, settings.request_timeout())?;
                    Scheduler::new(store, Notifier::new(sink, tg.chat_id), interval)
                        .run(ticks)
                        .await;
                }
                None => {
                    warn!("No Telegram bot configured, reports will only be logged");
                    Scheduler::new(store, Notifier::new(LogSink, "log"), interval)
                        .run(ticks)
                        .await;
                }
            }
            Ok(())
        }
        Commands::Stats => {
            let store = open_store(&settings)?;
            let s = store.stats()?;
            println!("Observations: {}", s.observations);
            println!("Products:     {}", s.products);
            println!("Comparable:   {}", s.comparable);
            match s.last_observed_at {
                Some(t) => println!("Last scrape:  {}", t),
                None => println!("Last scrape:  never"),
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn open_store(settings: &Settings) -> anyhow::Result<SqliteStore> {
    let store = SqliteStore::open(&settings.db_path)?;
    store.init_schema()?;
    Ok(store)
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_read_naturally() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn cli_parses_watch_flags() {
        let cli = Cli::try_parse_from(["price_watch", "watch", "--interval", "5", "-n", "2"]).unwrap();
        match cli.command {
            Commands::Watch { interval, ticks } => {
                assert_eq!(interval, Some(5));
                assert_eq!(ticks, Some(2));
            }
            _ => panic!("expected watch"),
        }
    }
}
