//! `salesync hourly` / `salesync recover` entry point.
//!
//! Wires the configured collaborators (Square client, SQLite store, CSV
//! sink) into a [`SyncPipeline`], runs it over the window selected by the
//! [`RunMode`], and prints the run summary.

use anyhow::{bail, Result};
use chrono::Utc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::Config;
use crate::db;
use crate::error::SyncError;
use crate::export::CsvExportSink;
use crate::migrate;
use crate::pipeline::{ExportStatus, RunReport, SyncPipeline};
use crate::square::SquareClient;
use crate::store::SqliteSalesStore;
use crate::window::RunMode;

pub async fn run_sync(config: &Config, mode: RunMode) -> Result<RunReport> {
    // `now` is read once; the window below is the one every step uses.
    let window = mode.window(Utc::now());
    info!(mode = mode.label(), %window, "starting sync");

    let client = SquareClient::new(&config.square)?;

    let pool = db::connect(config)
        .await
        .map_err(|e| SyncError::StorageFailure(format!("{:#}", e)))?;
    migrate::apply(&pool)
        .await
        .map_err(|e| SyncError::StorageFailure(format!("{:#}", e)))?;

    let store = SqliteSalesStore::new(
        pool.clone(),
        config.sync.dedupe,
        Duration::from_secs(config.sync.store_timeout_secs),
    );
    let sink = CsvExportSink::new(&config.export.dir);

    let pipeline = SyncPipeline::new(&client, &client, &store, &sink).with_scope(
        config.square.states.clone(),
        config.square.location_ids.clone(),
    );
    let result = pipeline.run(window, mode.label()).await;
    pool.close().await;

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            match e {
                SyncError::SourceUnavailable(_) => {
                    error!(error = %e, %window, "order source unavailable; nothing written")
                }
                SyncError::StorageFailure(_) => {
                    error!(error = %e, %window, "storage failed; run rolled back, nothing exported")
                }
                _ => error!(error = %e, "sync failed"),
            }
            return Err(e.into());
        }
    };

    report.log();
    for line in report.summary_lines() {
        println!("{}", line);
    }

    if let ExportStatus::Failed(ref reason) = report.export {
        bail!(
            "{} sale lines were stored but could not be exported: {}",
            report.recovered.len(),
            reason
        );
    }

    Ok(report)
}
