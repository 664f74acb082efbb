//! Collaborator seams of the sync pipeline.
//!
//! The pipeline only talks to the outside world through these four traits.
//! The shipped implementations are [`SquareClient`](crate::square::SquareClient)
//! (order source and catalog resolver), [`SqliteSalesStore`](crate::store::SqliteSalesStore)
//! and [`CsvExportSink`](crate::export::CsvExportSink). Tests substitute
//! in-memory versions.
//!
//! ```text
//! ┌─────────────┐  ┌──────────────┐
//! │ OrderSource │  │CatalogResolver│
//! └──────┬──────┘  └──────┬───────┘
//!        └───────┬────────┘
//!                ▼
//!          SyncPipeline::run
//!                │
//!        ┌───────┴────────┐
//!        ▼                ▼
//! ┌──────────────┐  ┌────────────┐
//! │IngestionStore│  │ ExportSink │
//! └──────────────┘  └────────────┘
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use crate::error::SyncResult;
use crate::filter::OrderFilter;
use crate::models::{RawOrder, SaleRecord};

/// Mapping from catalog object id to SKU. `None` marks an id that could not
/// be resolved to a SKU.
pub type SkuMap = HashMap<String, Option<String>>;

/// Source of orders for a window.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Return every order matching `filter`, across all result pages.
    ///
    /// Any failure is reported as
    /// [`SyncError::SourceUnavailable`](crate::error::SyncError::SourceUnavailable).
    /// An empty vector always means "no orders", never "could not ask".
    async fn search_orders(&self, filter: &OrderFilter) -> SyncResult<Vec<RawOrder>>;
}

/// Batch lookup of catalog object ids.
#[async_trait]
pub trait CatalogResolver: Send + Sync {
    /// Resolve all `ids` in one call. Every requested id is present in the
    /// returned map.
    async fn resolve_skus(&self, ids: &BTreeSet<String>) -> Result<SkuMap>;
}

/// Durable, deduplicating record of ingested sales.
#[async_trait]
pub trait IngestionStore: Send + Sync {
    /// Insert every record not already present, all in one transaction.
    ///
    /// Returns the records that were newly inserted, in input order. On
    /// error nothing from this call is committed.
    async fn ingest(&self, records: &[SaleRecord]) -> SyncResult<Vec<SaleRecord>>;
}

/// Destination for the records recovered by a run.
pub trait ExportSink: Send + Sync {
    /// Write `records` to a new artifact named after `label`.
    ///
    /// Returns `Ok(None)` without creating anything when `records` is empty.
    fn write(&self, records: &[SaleRecord], label: &str) -> Result<Option<PathBuf>>;
}
