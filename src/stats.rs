//! Ingested sales overview.
//!
//! Summarizes what the store holds: row and order counts, total units,
//! the covered time span, and units per SKU. Used by `salesync stats` to
//! check that hourly syncs are landing.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkuTotal {
    pub sku: Option<String>,
    pub lines: i64,
    pub units: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub lines: i64,
    pub orders: i64,
    pub units: i64,
    pub first_sale: Option<String>,
    pub last_sale: Option<String>,
    pub per_sku: Vec<SkuTotal>,
}

pub async fn collect_stats(pool: &SqlitePool) -> Result<StoreStats> {
    let totals = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS lines,
            COUNT(DISTINCT order_id) AS orders,
            COALESCE(SUM(quantity), 0) AS units,
            MIN(created_at) AS first_sale,
            MAX(created_at) AS last_sale
        FROM sold_items
        "#,
    )
    .fetch_one(pool)
    .await?;

    let sku_rows = sqlx::query(
        r#"
        SELECT sku, COUNT(*) AS lines, SUM(quantity) AS units
        FROM sold_items
        GROUP BY sku
        ORDER BY units DESC, sku
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(StoreStats {
        lines: totals.get("lines"),
        orders: totals.get("orders"),
        units: totals.get("units"),
        first_sale: totals.get("first_sale"),
        last_sale: totals.get("last_sale"),
        per_sku: sku_rows
            .iter()
            .map(|row| SkuTotal {
                sku: row.get("sku"),
                lines: row.get("lines"),
                units: row.get("units"),
            })
            .collect(),
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let stats = collect_stats(&pool).await?;
    pool.close().await;

    println!("Sales store");
    println!("===========");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Lines:       {}", stats.lines);
    println!("  Orders:      {}", stats.orders);
    println!("  Units:       {}", stats.units);
    if let (Some(first), Some(last)) = (&stats.first_sale, &stats.last_sale) {
        println!("  Span:        {} .. {}", first, last);
    }

    if !stats.per_sku.is_empty() {
        println!();
        println!("  {:<24} {:>8} {:>8}", "SKU", "LINES", "UNITS");
        for t in &stats.per_sku {
            println!(
                "  {:<24} {:>8} {:>8}",
                t.sku.as_deref().unwrap_or("(unresolved)"),
                t.lines,
                t.units
            );
        }
    }

    Ok(())
}
