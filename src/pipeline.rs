//! The fetch → dedupe → store → export pipeline.
//!
//! ```text
//! TimeWindow ─▶ OrderSource ─▶ CatalogResolver ─▶ flatten ─▶ IngestionStore ─▶ ExportSink
//!                  (fatal)        (degrades)                  (fatal, atomic)   (after commit)
//! ```
//!
//! A run either commits every new line it found or nothing at all, and the
//! export only ever sees committed lines. Because the store skips lines it
//! already holds, re-running any window is safe: the second run recovers
//! nothing.

use std::fmt;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::error::SyncResult;
use crate::filter::OrderFilter;
use crate::flatten::{catalog_ids, flatten};
use crate::models::{format_ts, SaleRecord};
use crate::traits::{CatalogResolver, ExportSink, IngestionStore, OrderSource, SkuMap};
use crate::window::TimeWindow;

/// What happened to catalog resolution during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverStatus {
    /// No sold lines, so nothing to resolve.
    NotNeeded,
    /// The batch call succeeded. `unresolved` ids had no SKU.
    Resolved { ids: usize, unresolved: usize },
    /// The batch call failed; every SKU in this run is `None`.
    Degraded { reason: String },
}

/// What happened to the export of recovered lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportStatus {
    NothingToWrite,
    Written(PathBuf),
    /// The store commit succeeded but the file could not be written.
    Failed(String),
}

/// Headline result of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The window held no sold lines.
    NoOrders,
    /// Every sold line was already in the store.
    NothingNew,
    /// This many lines were newly ingested.
    Recovered(usize),
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::NoOrders => write!(f, "no orders found in window"),
            RunOutcome::NothingNew => write!(f, "no missing orders"),
            RunOutcome::Recovered(n) => write!(f, "recovered {} sale lines", n),
        }
    }
}

/// Structured result of one run. Logging and console output are derived
/// from this value, never the other way round.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub window: TimeWindow,
    pub label: String,
    pub orders_fetched: usize,
    pub candidates: usize,
    pub recovered: Vec<SaleRecord>,
    pub resolver: ResolverStatus,
    pub export: ExportStatus,
}

impl RunReport {
    pub fn outcome(&self) -> RunOutcome {
        if self.candidates == 0 {
            RunOutcome::NoOrders
        } else if self.recovered.is_empty() {
            RunOutcome::NothingNew
        } else {
            RunOutcome::Recovered(self.recovered.len())
        }
    }

    /// Candidates already present in the store.
    pub fn skipped(&self) -> usize {
        self.candidates - self.recovered.len()
    }

    pub fn resolver_degraded(&self) -> bool {
        matches!(self.resolver, ResolverStatus::Degraded { .. })
    }

    /// Emit the report as structured log events.
    pub fn log(&self) {
        info!(
            label = %self.label,
            window = %self.window,
            orders = self.orders_fetched,
            candidates = self.candidates,
            recovered = self.recovered.len(),
            skipped = self.skipped(),
            outcome = %self.outcome(),
            "sync finished"
        );
        if let ResolverStatus::Degraded { ref reason } = self.resolver {
            warn!(%reason, "catalog resolver degraded; SKUs recorded as null");
        }
        if let ExportStatus::Failed(ref reason) = self.export {
            error!(%reason, "export failed after commit");
        }
    }

    /// Human-readable summary for stdout.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("sync {}", self.label),
            format!("  window: {}", self.window),
            format!("  orders fetched: {}", self.orders_fetched),
            format!("  sale lines: {}", self.candidates),
            format!("  recovered: {}", self.recovered.len()),
            format!("  already ingested: {}", self.skipped()),
        ];

        match &self.resolver {
            ResolverStatus::NotNeeded => {}
            ResolverStatus::Resolved { ids, unresolved } => {
                lines.push(format!("  catalog ids: {} ({} without SKU)", ids, unresolved))
            }
            ResolverStatus::Degraded { reason } => {
                lines.push(format!("  catalog resolver DEGRADED: {}", reason))
            }
        }

        match &self.export {
            ExportStatus::NothingToWrite => lines.push("  export: nothing to write".to_string()),
            ExportStatus::Written(path) => lines.push(format!("  export: {}", path.display())),
            ExportStatus::Failed(reason) => lines.push(format!("  export FAILED: {}", reason)),
        }

        for record in &self.recovered {
            lines.push(format!(
                "  + order {}  sku {}  qty {}  at {}",
                record.order_id,
                record.sku.as_deref().unwrap_or("(unresolved)"),
                record.quantity,
                format_ts(&record.created_at)
            ));
        }

        lines.push(self.outcome().to_string());
        lines
    }
}

/// Orchestrates one sync run over borrowed collaborators.
pub struct SyncPipeline<'a> {
    source: &'a dyn OrderSource,
    resolver: &'a dyn CatalogResolver,
    store: &'a dyn IngestionStore,
    sink: &'a dyn ExportSink,
    states: Vec<String>,
    location_ids: Vec<String>,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(
        source: &'a dyn OrderSource,
        resolver: &'a dyn CatalogResolver,
        store: &'a dyn IngestionStore,
        sink: &'a dyn ExportSink,
    ) -> Self {
        Self {
            source,
            resolver,
            store,
            sink,
            states: Vec::new(),
            location_ids: Vec::new(),
        }
    }

    /// Restrict the order search to `states` and `location_ids`.
    pub fn with_scope(mut self, states: Vec<String>, location_ids: Vec<String>) -> Self {
        self.states = states;
        self.location_ids = location_ids;
        self
    }

    /// Run the pipeline over `window`, exporting under `label`.
    ///
    /// # Errors
    ///
    /// - `SourceUnavailable` — the order search failed; nothing was written.
    /// - `StorageFailure` — the insert transaction failed; nothing was
    ///   committed and nothing was exported.
    pub async fn run(&self, window: TimeWindow, label: &str) -> SyncResult<RunReport> {
        let filter = OrderFilter::new(window)
            .with_states(self.states.iter().cloned())
            .with_locations(self.location_ids.iter().cloned());

        // 1. Fetch
        let orders = self.source.search_orders(&filter).await?;

        // 2. Resolve all catalog ids in one call
        let ids = catalog_ids(&orders);
        let (skus, resolver) = if ids.is_empty() {
            (SkuMap::new(), ResolverStatus::NotNeeded)
        } else {
            match self.resolver.resolve_skus(&ids).await {
                Ok(skus) => {
                    let unresolved = ids
                        .iter()
                        .filter(|id| skus.get(*id).map_or(true, Option::is_none))
                        .count();
                    let status = ResolverStatus::Resolved {
                        ids: ids.len(),
                        unresolved,
                    };
                    (skus, status)
                }
                Err(e) => {
                    warn!(error = %e, ids = ids.len(), "catalog resolution failed");
                    let status = ResolverStatus::Degraded {
                        reason: format!("{:#}", e),
                    };
                    (SkuMap::new(), status)
                }
            }
        };

        // 3. Flatten
        let candidates = flatten(&orders, &skus);

        // 4-5. Dedupe and insert in one transaction
        let recovered = if candidates.is_empty() {
            Vec::new()
        } else {
            self.store.ingest(&candidates).await?
        };

        // 6. Export only what was committed
        let export = match self.sink.write(&recovered, label) {
            Ok(Some(path)) => ExportStatus::Written(path),
            Ok(None) => ExportStatus::NothingToWrite,
            Err(e) => ExportStatus::Failed(format!("{:#}", e)),
        };

        Ok(RunReport {
            window,
            label: label.to_string(),
            orders_fetched: orders.len(),
            candidates: candidates.len(),
            recovered,
            resolver,
            export,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::models::{RawLineItem, RawOrder};
    use crate::window::RunMode;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::{BTreeSet, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FixedSource(Vec<RawOrder>);

    #[async_trait]
    impl OrderSource for FixedSource {
        async fn search_orders(&self, _filter: &OrderFilter) -> SyncResult<Vec<RawOrder>> {
            Ok(self.0.clone())
        }
    }

    struct DownSource;

    #[async_trait]
    impl OrderSource for DownSource {
        async fn search_orders(&self, _filter: &OrderFilter) -> SyncResult<Vec<RawOrder>> {
            Err(SyncError::SourceUnavailable("HTTP 503".into()))
        }
    }

    #[derive(Default)]
    struct CountingResolver {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl CatalogResolver for CountingResolver {
        async fn resolve_skus(&self, ids: &BTreeSet<String>) -> Result<SkuMap> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("catalog down");
            }
            Ok(ids
                .iter()
                .map(|id| (id.clone(), Some(format!("SKU-{}", id))))
                .collect())
        }
    }

    /// Keyed on (order_id, line_key), like the SQLite store in line mode.
    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<HashMap<(String, String), SaleRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl IngestionStore for MemoryStore {
        async fn ingest(&self, records: &[SaleRecord]) -> SyncResult<Vec<SaleRecord>> {
            if self.fail {
                return Err(SyncError::StorageFailure("disk full".into()));
            }
            let mut rows = self.rows.lock().unwrap();
            let mut recovered = Vec::new();
            for r in records {
                let key = (r.order_id.clone(), r.line_key.clone());
                if !rows.contains_key(&key) {
                    rows.insert(key, r.clone());
                    recovered.push(r.clone());
                }
            }
            Ok(recovered)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        writes: Mutex<Vec<(String, usize)>>,
    }

    impl ExportSink for RecordingSink {
        fn write(&self, records: &[SaleRecord], label: &str) -> Result<Option<PathBuf>> {
            if records.is_empty() {
                return Ok(None);
            }
            self.writes
                .lock()
                .unwrap()
                .push((label.to_string(), records.len()));
            Ok(Some(PathBuf::from(format!("{}.csv", label))))
        }
    }

    fn window() -> TimeWindow {
        RunMode::Hourly.window(Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap())
    }

    fn order(id: &str, qty: &str) -> RawOrder {
        RawOrder {
            id: id.to_string(),
            location_id: None,
            state: Some("COMPLETED".to_string()),
            created_at: Utc.with_ymd_and_hms(2025, 5, 1, 9, 30, 0).unwrap(),
            line_items: vec![RawLineItem {
                uid: Some(format!("{}-line", id)),
                name: None,
                quantity: qty.to_string(),
                catalog_object_id: Some("VAR_X".to_string()),
            }],
        }
    }

    fn seeded_store(order_id: &str) -> MemoryStore {
        let store = MemoryStore::default();
        let seed = flatten(&[order(order_id, "2")], &SkuMap::new());
        store
            .rows
            .lock()
            .unwrap()
            .insert((seed[0].order_id.clone(), seed[0].line_key.clone()), seed[0].clone());
        store
    }

    #[tokio::test]
    async fn recovers_only_orders_missing_from_store() {
        let source = FixedSource(vec![order("A1", "2"), order("A2", "3")]);
        let resolver = CountingResolver::default();
        let store = seeded_store("A1");
        let sink = RecordingSink::default();

        let report = SyncPipeline::new(&source, &resolver, &store, &sink)
            .run(window(), "hourly")
            .await
            .unwrap();

        assert_eq!(report.recovered.len(), 1);
        let r = &report.recovered[0];
        assert_eq!(r.order_id, "A2");
        assert_eq!(r.sku.as_deref(), Some("SKU-VAR_X"));
        assert_eq!(r.quantity, 3);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.outcome(), RunOutcome::Recovered(1));
        assert_eq!(store.rows.lock().unwrap().len(), 2);
        assert_eq!(*sink.writes.lock().unwrap(), vec![("hourly".to_string(), 1)]);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let source = FixedSource(vec![order("A1", "1"), order("A2", "4")]);
        let resolver = CountingResolver::default();
        let store = MemoryStore::default();
        let sink = RecordingSink::default();
        let pipeline = SyncPipeline::new(&source, &resolver, &store, &sink);

        let first = pipeline.run(window(), "hourly").await.unwrap();
        assert_eq!(first.recovered.len(), 2);

        let second = pipeline.run(window(), "hourly").await.unwrap();
        assert!(second.recovered.is_empty());
        assert_eq!(second.outcome(), RunOutcome::NothingNew);
        assert_eq!(second.export, ExportStatus::NothingToWrite);
        assert_eq!(store.rows.lock().unwrap().len(), 2);
        assert_eq!(sink.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolver_failure_keeps_every_record() {
        let orders = vec![order("A1", "1"), order("A2", "2"), order("A3", "3")];
        let store_ok = MemoryStore::default();
        let store_degraded = MemoryStore::default();
        let sink = RecordingSink::default();

        let ok_resolver = CountingResolver::default();
        let down_resolver = CountingResolver {
            fail: true,
            ..Default::default()
        };
        let source = FixedSource(orders);

        let ok = SyncPipeline::new(&source, &ok_resolver, &store_ok, &sink)
            .run(window(), "hourly")
            .await
            .unwrap();
        let degraded = SyncPipeline::new(&source, &down_resolver, &store_degraded, &sink)
            .run(window(), "hourly")
            .await
            .unwrap();

        assert_eq!(ok.recovered.len(), degraded.recovered.len());
        assert!(degraded.resolver_degraded());
        assert!(!ok.resolver_degraded());
        assert!(degraded.recovered.iter().all(|r| r.sku.is_none()));
        assert!(ok.recovered.iter().all(|r| r.sku.is_some()));
    }

    #[tokio::test]
    async fn source_failure_writes_nothing() {
        let resolver = CountingResolver::default();
        let store = MemoryStore::default();
        let sink = RecordingSink::default();

        let err = SyncPipeline::new(&DownSource, &resolver, &store, &sink)
            .run(window(), "hourly")
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::SourceUnavailable(_)));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert!(store.rows.lock().unwrap().is_empty());
        assert!(sink.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_skips_export() {
        let source = FixedSource(vec![order("A1", "1")]);
        let resolver = CountingResolver::default();
        let store = MemoryStore {
            fail: true,
            ..Default::default()
        };
        let sink = RecordingSink::default();

        let err = SyncPipeline::new(&source, &resolver, &store, &sink)
            .run(window(), "hourly")
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::StorageFailure(_)));
        assert!(sink.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_window_reports_no_orders() {
        let source = FixedSource(vec![order("R1", "-1")]);
        let resolver = CountingResolver::default();
        let store = MemoryStore::default();
        let sink = RecordingSink::default();

        let report = SyncPipeline::new(&source, &resolver, &store, &sink)
            .run(window(), "hourly")
            .await
            .unwrap();

        assert_eq!(report.orders_fetched, 1);
        assert_eq!(report.outcome(), RunOutcome::NoOrders);
        assert_eq!(report.resolver, ResolverStatus::NotNeeded);
        assert_eq!(report.export, ExportStatus::NothingToWrite);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn summary_ends_with_outcome() {
        let report = RunReport {
            window: window(),
            label: "hourly".into(),
            orders_fetched: 0,
            candidates: 0,
            recovered: Vec::new(),
            resolver: ResolverStatus::NotNeeded,
            export: ExportStatus::NothingToWrite,
        };
        let lines = report.summary_lines();
        assert_eq!(lines[0], "sync hourly");
        assert_eq!(lines.last().unwrap(), "no orders found in window");
    }
}
