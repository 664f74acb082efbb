//! # Sales Sync CLI (`salesync`)
//!
//! ## Usage
//!
//! ```bash
//! salesync --config ./config/salesync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `salesync init` | Create the SQLite database and run schema migrations |
//! | `salesync hourly` | Ingest Square orders from the last hour |
//! | `salesync recover <DAYS>` | Ingest Square orders from the last DAYS days |
//! | `salesync stats` | Summarize ingested sales |
//! | `salesync stock` | Booqable consumable stock report |
//! | `salesync rentals` | Booqable order lines and units per product for one week |
//!
//! ## Exit codes
//!
//! `2` invalid input, `3` order source unavailable, `4` storage failure,
//! `5` configuration error, `1` anything else.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use sales_sync::config;
use sales_sync::error::SyncError;
use sales_sync::window::RunMode;
use sales_sync::{ingest, logging, migrate, rentals, stats, stock};

/// Sales Sync CLI — idempotent Square sales ingestion with Booqable reports.
#[derive(Parser)]
#[command(
    name = "salesync",
    about = "Idempotent Square sales ingestion with Booqable stock and rental reports",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/salesync.toml")]
    config: PathBuf,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `sold_items` table.
    /// Running it more than once is safe.
    Init,

    /// Ingest orders created in the last hour.
    ///
    /// Meant to be triggered by cron or a systemd timer. Newly ingested
    /// lines are exported to `hourly_<timestamp>.csv`.
    Hourly,

    /// Ingest orders created in the last DAYS days.
    ///
    /// Lines already in the store are skipped, so overlapping an earlier
    /// run is safe. Newly ingested lines are exported to
    /// `recovered_<timestamp>.csv`.
    Recover {
        /// Number of days to look back (>= 1).
        #[arg(allow_negative_numbers = true)]
        days: i64,
    },

    /// Summarize ingested sales per SKU.
    Stats,

    /// Report stock of non-archived consumable products from Booqable.
    Stock {
        /// Write the report as CSV to this path instead of printing a table.
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Report units per product for Booqable orders in one week.
    Rentals {
        /// How many weeks before the current one (0 = this week).
        #[arg(long, default_value_t = 3)]
        weeks_ago: u32,

        /// Write the per-line rows as CSV to this path instead of printing.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<SyncError>()
                .map(SyncError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Reject bad arguments before touching config, network, or disk.
    if let Commands::Recover { days } = cli.command {
        RunMode::recover(days)?;
    }

    let cfg = config::load_config(&cli.config)
        .map_err(|e| SyncError::Config(format!("{:#}", e)))?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Hourly => {
            ingest::run_sync(&cfg, RunMode::Hourly).await?;
        }
        Commands::Recover { days } => {
            ingest::run_sync(&cfg, RunMode::recover(days)?).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Stock { csv } => {
            stock::run_stock(&cfg, csv.as_deref()).await?;
        }
        Commands::Rentals { weeks_ago, csv } => {
            rentals::run_rentals(&cfg, weeks_ago, csv.as_deref()).await?;
        }
    }

    Ok(())
}
