//! # Sales Sync
//!
//! Idempotent ingestion of Square sales into SQLite, plus Booqable stock
//! and rental reports.
//!
//! The core is a fetch → dedupe → store → export pipeline: orders created in
//! a time window are pulled from Square, flattened into one record per sold
//! line, inserted into the store unless already present, and the newly
//! inserted ("recovered") lines are exported to a timestamped CSV file.
//! Running the same window twice recovers nothing the second time.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────┐   ┌──────────┐
//! │   Square   │──▶│ SyncPipeline │──▶│  SQLite  │   │   CSV    │
//! │ orders+cat │   │ flatten+dedup│──▶│sold_items│──▶│  export  │
//! └────────────┘   └──────────────┘   └──────────┘   └──────────┘
//!
//! ┌────────────┐   ┌──────────────────────┐
//! │  Booqable  │──▶│ stock / rentals (CLI)│
//! └────────────┘   └──────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! salesync init                 # create database
//! salesync hourly               # sync the last hour (run from cron)
//! salesync recover 7            # backfill the last week
//! salesync stats                # what the store holds
//! salesync stock --csv out.csv  # Booqable consumable stock
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`window`] | Run modes and time windows |
//! | [`filter`] | Typed Square order search filter |
//! | [`square`] | Square order source and catalog resolver |
//! | [`flatten`] | Orders → sale records |
//! | [`store`] | SQLite ingestion store |
//! | [`pipeline`] | The sync pipeline and its run report |
//! | [`export`] | CSV export sink |
//! | [`booqable`] | Booqable client and typed queries |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod booqable;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod filter;
pub mod flatten;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod rentals;
pub mod square;
pub mod stats;
pub mod stock;
pub mod store;
pub mod traits;
pub mod window;
