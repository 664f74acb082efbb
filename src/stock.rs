//! `salesync stock` — consumable stock report from Booqable.
//!
//! For every non-archived consumable product, prints its SKU and in-stock
//! count. Variation products carry their SKU in the second variation value;
//! when that is missing the SKU comes from the product group (looked up once
//! per group).

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::booqable::{BooqableClient, InventoryQuery, Product, ProductQuery};
use crate::config::Config;

/// Where a product's SKU comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkuSource {
    /// Known from the product itself (possibly absent).
    Direct(Option<String>),
    /// Must be read from the product group.
    Group(String),
}

pub fn sku_source(product: &Product) -> SkuSource {
    let attrs = &product.attributes;
    if !attrs.variation {
        return SkuSource::Direct(attrs.sku.clone());
    }
    if let Some(value) = attrs.variation_values.get(1) {
        return SkuSource::Direct(Some(value.clone()));
    }
    match attrs.product_group_id {
        Some(ref group_id) => SkuSource::Group(group_id.clone()),
        None => SkuSource::Direct(None),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StockRow {
    pub product_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub stock_count: i64,
}

pub async fn run_stock(config: &Config, csv_out: Option<&Path>) -> Result<()> {
    let client = BooqableClient::new(config.booqable()?)?;
    let rows = collect_stock(&client).await?;

    match csv_out {
        Some(path) => {
            write_csv(&rows, path)?;
            println!("wrote {} products to {}", rows.len(), path.display());
        }
        None => print_table(&rows),
    }
    Ok(())
}

async fn collect_stock(client: &BooqableClient) -> Result<Vec<StockRow>> {
    let products = client.products(&ProductQuery::consumables()).await?;
    info!(products = products.len(), "fetched consumable products");

    let mut group_skus: HashMap<String, Option<String>> = HashMap::new();
    let mut rows = Vec::with_capacity(products.len());

    for product in &products {
        let sku = match sku_source(product) {
            SkuSource::Direct(sku) => sku,
            SkuSource::Group(group_id) => match group_skus.get(&group_id) {
                Some(sku) => sku.clone(),
                None => {
                    let sku = client.product_group_sku(&group_id).await?;
                    group_skus.insert(group_id, sku.clone());
                    sku
                }
            },
        };
        let stock_count = client
            .stock_count(&InventoryQuery::in_stock(&product.id))
            .await?;

        rows.push(StockRow {
            product_id: product.id.clone(),
            name: product
                .attributes
                .name
                .clone()
                .unwrap_or_else(|| "Unnamed".to_string()),
            sku,
            stock_count,
        });
    }

    Ok(rows)
}

fn print_table(rows: &[StockRow]) {
    println!("{:<24} {:<40} {:>8}", "SKU", "PRODUCT", "IN STOCK");
    for row in rows {
        println!(
            "{:<24} {:<40} {:>8}",
            row.sku.as_deref().unwrap_or("-"),
            row.name,
            row.stock_count
        );
    }
    println!("{} products", rows.len());
}

fn write_csv(rows: &[StockRow], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
