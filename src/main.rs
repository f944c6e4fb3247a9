mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use farecrawl::config::{Config, LoggingConfig};
use farecrawl::models::ProviderSystem;

#[derive(Parser)]
#[command(
    name = "farecrawl",
    version,
    about = "Flight fare crawler driven by fixed-month and holiday task generation",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "FARECRAWL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides `logging.format`
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate every configured task and crawl them
    Run {
        /// Reference date for generation (YYYY-MM-DD, default: today)
        #[arg(long)]
        today: Option<chrono::NaiveDate>,
    },

    /// Print the tasks that `run` would crawl, without crawling
    Plan {
        /// Reference date for generation (YYYY-MM-DD, default: today)
        #[arg(long)]
        today: Option<chrono::NaiveDate>,
    },

    /// Crawl a single route and date pair
    Crawl {
        /// Departure city code
        #[arg(long)]
        from: String,

        /// Arrival city code
        #[arg(long)]
        to: String,

        /// Departure date (YYYY-MM-DD)
        #[arg(long)]
        depart: chrono::NaiveDate,

        /// Return date (YYYY-MM-DD); one-way when omitted
        #[arg(long = "return")]
        return_date: Option<chrono::NaiveDate>,

        /// Only keep itineraries containing this flight number
        #[arg(long)]
        flight: Option<String>,

        /// Provider systems to query (default: all)
        #[arg(long = "system", value_parser = parse_system)]
        systems: Vec<ProviderSystem>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing/logging
    setup_tracing(&config.logging, cli.log_format.as_deref(), cli.verbose)?;

    tracing::info!(
        max_concurrent_tasks = config.scheduler.max_concurrent_tasks,
        "farecrawl starting"
    );

    match cli.command {
        Commands::Run { today } => {
            tracing::info!(today = ?today, "Starting run command");
            commands::run(config, today).await?;
        }

        Commands::Plan { today } => {
            tracing::info!(today = ?today, "Starting plan command");
            commands::plan(config, today).await?;
        }

        Commands::Crawl {
            from,
            to,
            depart,
            return_date,
            flight,
            systems,
        } => {
            tracing::info!(
                from = %from,
                to = %to,
                depart = %depart,
                return_date = ?return_date,
                flight = ?flight,
                "Starting crawl command"
            );
            commands::crawl(
                config,
                commands::CrawlParams {
                    from,
                    to,
                    depart,
                    return_date,
                    flight,
                    systems,
                },
            )
            .await?;
        }
    }

    tracing::info!("farecrawl completed successfully");
    Ok(())
}

fn parse_system(value: &str) -> Result<ProviderSystem, String> {
    ProviderSystem::parse(value).ok_or_else(|| format!("unknown provider system: {value}"))
}

fn setup_tracing(logging: &LoggingConfig, format_override: Option<&str>, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("farecrawl=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(format!("farecrawl={},warn", logging.level))
        })
    };

    match format_override.unwrap_or(logging.format.as_str()) {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("Failed to initialize logging")?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("Failed to initialize logging")?;
        }
    }

    Ok(())
}
