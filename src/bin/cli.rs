//! Bulletin monitor CLI
//!
//! Local execution entry point. For AWS Lambda, use `bulletin-monitor-lambda`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use bulletin_monitor::{
    deploy::{DeployConfig, ResourcePlan},
    error::Result,
    models::{Config, EmailTransport},
    pipeline::{self, Deduplicator, ListingSnapshot},
    services::{ListingScraper, PdfTextExtractor},
    storage::{LocalStorage, ObjectStore, keys, read_json},
    utils::http::HttpFetcher,
};

/// SAT technical bulletin monitor
#[derive(Parser, Debug)]
#[command(
    name = "bulletin-monitor",
    version,
    about = "Monitors SAT technical bulletins and emails keyword matches"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Use a local directory instead of the S3 bucket
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the monitoring pipeline once
    Run {
        /// Log the email instead of sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// Scrape the listing pages and print the bulletins found
    Scrape,

    /// Validate configuration
    Validate,

    /// Show stored listing snapshot and processed document count
    Info,

    /// Print the infrastructure resource plan as JSON
    Plan {
        /// Plan for LocalStack
        #[arg(long)]
        localstack: bool,

        /// Scheduler recurrence expression
        #[arg(long, default_value = "rate(1 day)")]
        schedule: String,

        /// Function timeout in seconds
        #[arg(long, default_value_t = 300)]
        timeout: u32,

        /// Function memory in MB
        #[arg(long, default_value_t = 512)]
        memory: u32,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Open the local storage directory, or the configured bucket.
async fn open_storage(cli: &Cli, config: &Config) -> Result<Box<dyn ObjectStore>> {
    match &cli.storage_dir {
        Some(dir) => {
            log::info!("Using local storage at {}", dir.display());
            Ok(Box::new(LocalStorage::new(dir)))
        }
        None => open_bucket(config).await,
    }
}

#[cfg(feature = "s3")]
async fn open_bucket(config: &Config) -> Result<Box<dyn ObjectStore>> {
    let storage = bulletin_monitor::storage::S3Storage::from_config(&config.storage).await?;
    log::info!("Using bucket {}", storage.bucket());
    Ok(Box::new(storage))
}

#[cfg(not(feature = "s3"))]
async fn open_bucket(_config: &Config) -> Result<Box<dyn ObjectStore>> {
    Err(bulletin_monitor::error::AppError::config(
        "no --storage-dir given and the `s3` feature is disabled",
    ))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env()?;
    log::info!(
        "Loaded configuration from {} (environment: {})",
        cli.config.display(),
        config.environment
    );

    match &cli.command {
        Command::Run { dry_run } => {
            if *dry_run {
                config.email.transport = EmailTransport::Log;
            }
            if cli.storage_dir.is_none() {
                config.require_environment()?;
            }

            let storage = open_storage(&cli, &config).await?;
            let summary =
                match pipeline::run_from_config(&config, storage.as_ref(), &PdfTextExtractor, None)
                    .await
                {
                    Ok(summary) => summary,
                    Err(e) => {
                        log::error!("Monitoring run failed: {}", e);
                        return Err(e);
                    }
                };

            log::info!(
                "Run complete: {} PDFs found, {} new, {} updates in {:.2}s",
                summary.bulletins_found,
                summary.new_bulletins,
                summary.updates_found(),
                summary.execution_time
            );
            for update in &summary.updates {
                log::info!("  {} [{}]", update.pdf, update.keywords.join(", "));
            }
        }

        Command::Scrape => {
            config.validate()?;
            let fetcher = HttpFetcher::from_config(&config.http)?;
            let bulletins = ListingScraper::new(&config.source)?
                .scrape(&fetcher)
                .await?;

            println!("{}", serde_json::to_string_pretty(&bulletins)?);
            log::info!("{} bulletins found", bulletins.len());
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({} keywords)", config.keywords.len());

            match config.require_environment() {
                Ok(()) => log::info!("✓ Deployment environment complete"),
                Err(e) => log::warn!("{}", e),
            }
        }

        Command::Info => {
            let storage = open_storage(&cli, &config).await?;

            match read_json::<ListingSnapshot>(storage.as_ref(), keys::LISTING_SNAPSHOT).await? {
                Some(snapshot) => {
                    log::info!("Last listing: {} bulletins", snapshot.count);
                    log::info!("Last updated: {}", snapshot.updated_at.to_rfc3339());
                }
                None => log::info!("No listing snapshot found yet."),
            }

            let processed = Deduplicator::new(storage.as_ref()).processed_count().await?;
            log::info!("Processed documents: {}", processed);

            let logs = storage.list(keys::LOGS_PREFIX).await?;
            log::info!("Run logs stored: {}", logs.len());
        }

        Command::Plan {
            localstack,
            schedule,
            timeout,
            memory,
        } => {
            let deploy = DeployConfig {
                environment: config.environment.clone(),
                use_localstack: *localstack,
                schedule_expression: schedule.clone(),
                timeout_secs: *timeout,
                memory_mb: *memory,
                ..Default::default()
            };
            let plan = ResourcePlan::generate(&deploy)?;
            println!("{}", plan.to_json()?);
            log::info!(
                "{} resources planned, {} active",
                plan.resources.len(),
                plan.active().count()
            );
        }
    }

    log::info!("Done!");

    Ok(())
}
