use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the `sold_items` table and its indexes. Safe to run repeatedly.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // The UNIQUE constraint is the backstop for the per-run dedupe check:
    // two runs racing on the same window cannot both insert a line.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sold_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id TEXT NOT NULL,
            line_key TEXT NOT NULL DEFAULT '',
            catalog_object_id TEXT NOT NULL,
            sku TEXT,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            created_at TEXT NOT NULL,
            ingested_at INTEGER NOT NULL,
            run_id TEXT NOT NULL,
            UNIQUE(order_id, line_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sold_items_order_id ON sold_items(order_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sold_items_sku ON sold_items(sku)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sold_items_created_at ON sold_items(created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
