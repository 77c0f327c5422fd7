//! Disc-Harvest main entry point
//!
//! This is the command-line interface for the Disc-Harvest pipeline.

use clap::Parser;
use disc_harvest::config::{load_config_with_hash, Config};
use disc_harvest::crawler::{user_agent_string, Coordinator, RunOutcome};
use disc_harvest::output::{load_statistics, print_statistics, write_markdown_summary};
use disc_harvest::storage::SqliteStorage;
use disc_harvest::SqliteSink;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Disc-Harvest: a polite PDGA data harvester
///
/// Disc-Harvest crawls the PDGA manufacturer and approved-disc listings
/// (plus configured player profiles and events), reconciles what it reads
/// into one record per disc, company, player and event, and loads the
/// result into SQLite.
#[derive(Parser, Debug)]
#[command(name = "disc-harvest")]
#[command(version)]
#[command(about = "A polite PDGA data harvester", long_about = None)]
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

    /// Resume an unfinished run even if the config disables it
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh run, discarding any unfinished one
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be harvested without fetching
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show progress recorded in the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.resume {
        config.run.resume = true;
    }

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_harvest(config, &config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("disc_harvest=info,warn"),
            1 => EnvFilter::new("disc_harvest=debug,info"),
            2 => EnvFilter::new("disc_harvest=trace,debug"),
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

/// Handles the --dry-run mode: shows the configuration and the seed pages
fn handle_dry_run(config: &Config) {
    println!("=== Disc-Harvest Dry Run ===\n");

    println!("Source: {}", config.source.base_url);
    let categories: Vec<String> = config
        .source
        .categories
        .iter()
        .map(|c| format!("{:?}", c).to_lowercase())
        .collect();
    println!("  Categories: {}", categories.join(", "));

    println!("\nFetcher:");
    println!("  Workers: {}", config.fetcher.worker_count);
    println!("  Max attempts per page: {}", config.fetcher.max_retries);
    println!(
        "  Rate limit interval: {}ms",
        config.fetcher.rate_limit_interval
    );
    println!("  Request timeout: {}s", config.fetcher.request_timeout);
    println!("  Backoff base: {}ms", config.fetcher.backoff_base);
    println!("  User agent: {}", user_agent_string(&config.user_agent));

    println!("\nRun:");
    println!("  Resume: {}", config.run.resume);
    match config.run.page_budget {
        Some(budget) => println!("  Page budget: {}", budget),
        None => println!("  Page budget: none"),
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);

    if !config.company_aliases.is_empty() {
        println!("\nCompany Aliases ({}):", config.company_aliases.len());
        for alias in &config.company_aliases {
            println!("  - {} -> {}", alias.from, alias.to);
        }
    }

    let seeds: Vec<_> = config
        .source
        .categories
        .iter()
        .flat_map(|category| category.seeds(&config.source))
        .collect();
    println!("\nSeed Pages ({}):", seeds.len());
    for seed in &seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    config_hash: &str,
    fresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if fresh {
        tracing::info!("Starting fresh run (ignoring previous state)");
    } else if config.run.resume {
        tracing::info!("Starting run (will resume an unfinished one)");
    }

    let summary_path = PathBuf::from(&config.output.summary_path);
    let mut sink = SqliteSink::open(Path::new(&config.output.database_path))?;
    let mut coordinator = Coordinator::new(config, config_hash, fresh)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received; finishing in-flight pages");
                cancel.cancel();
            }
        });
    }

    match coordinator.run(&mut sink, cancel).await {
        Ok(outcome) => {
            write_markdown_summary(outcome.summary(), &summary_path)?;
            tracing::info!("Summary written to {}", summary_path.display());
            match outcome {
                RunOutcome::Completed(_) => tracing::info!("Harvest completed successfully"),
                RunOutcome::Halted(_) => tracing::info!("Harvest halted; run again to resume"),
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
