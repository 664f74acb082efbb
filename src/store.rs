//! SQLite-backed [`IngestionStore`].
//!
//! Each call to [`ingest`](IngestionStore::ingest) runs in a single
//! transaction. The existence check and the insert are one statement
//! (`INSERT .. ON CONFLICT DO NOTHING`), so a line counts as recovered only
//! if this transaction actually wrote it. The `UNIQUE(order_id, line_key)`
//! constraint makes that hold even against a concurrent run.
//!
//! Under [`DedupeKey::Order`] the insert is additionally guarded by "no row
//! with this `order_id` exists", so an order already stored line by line is
//! never stored again after switching modes.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::config::DedupeKey;
use crate::error::{SyncError, SyncResult};
use crate::models::SaleRecord;
use crate::traits::IngestionStore;

const INSERT_LINE: &str = r#"
    INSERT INTO sold_items (order_id, line_key, catalog_object_id, sku, quantity, created_at, ingested_at, run_id)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(order_id, line_key) DO NOTHING
"#;

/// Skips the record when any row of its order is already stored, whichever
/// mode wrote that row.
const INSERT_ORDER: &str = r#"
    INSERT INTO sold_items (order_id, line_key, catalog_object_id, sku, quantity, created_at, ingested_at, run_id)
    SELECT ?, ?, ?, ?, ?, ?, ?, ?
    WHERE NOT EXISTS (SELECT 1 FROM sold_items WHERE order_id = ?)
    ON CONFLICT(order_id, line_key) DO NOTHING
"#;

pub struct SqliteSalesStore {
    pool: SqlitePool,
    dedupe: DedupeKey,
    timeout: Duration,
}

impl SqliteSalesStore {
    pub fn new(pool: SqlitePool, dedupe: DedupeKey, timeout: Duration) -> Self {
        Self {
            pool,
            dedupe,
            timeout,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ingest_in_tx(&self, records: &[SaleRecord]) -> SyncResult<Vec<SaleRecord>> {
        let run_id = Uuid::new_v4().to_string();
        let ingested_at = Utc::now().timestamp();
        let mut recovered = Vec::new();

        // Dropping `tx` on an early return rolls the whole batch back.
        let mut tx = self.pool.begin().await?;

        for record in records {
            let query = match self.dedupe {
                DedupeKey::Line => sqlx::query(INSERT_LINE),
                DedupeKey::Order => sqlx::query(INSERT_ORDER),
            };
            let query = query
                .bind(&record.order_id)
                .bind(&record.line_key)
                .bind(&record.catalog_object_id)
                .bind(&record.sku)
                .bind(record.quantity)
                .bind(record.created_at_text())
                .bind(ingested_at)
                .bind(&run_id);
            let query = match self.dedupe {
                DedupeKey::Line => query,
                DedupeKey::Order => query.bind(&record.order_id),
            };
            let result = query.execute(&mut *tx).await?;

            if result.rows_affected() == 1 {
                recovered.push(record.clone());
            } else {
                debug!(
                    order_id = %record.order_id,
                    line_key = %record.line_key,
                    "already ingested, skipping"
                );
            }
        }

        tx.commit().await?;
        Ok(recovered)
    }
}

#[async_trait]
impl IngestionStore for SqliteSalesStore {
    async fn ingest(&self, records: &[SaleRecord]) -> SyncResult<Vec<SaleRecord>> {
        match tokio::time::timeout(self.timeout, self.ingest_in_tx(records)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::StorageFailure(format!(
                "store did not commit within {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}
