//! Order → sale record flattening.

use std::collections::BTreeSet;

use crate::models::{RawLineItem, RawOrder, SaleRecord};
use crate::traits::SkuMap;

/// Flatten orders into one [`SaleRecord`] per sold line item.
///
/// Lines with a non-positive quantity (returns, voids) or without a catalog
/// reference (custom amounts) are skipped. Output follows input order:
/// orders first, then line items within an order.
pub fn flatten(orders: &[RawOrder], skus: &SkuMap) -> Vec<SaleRecord> {
    let mut records = Vec::new();

    for order in orders {
        for (index, item) in order.line_items.iter().enumerate() {
            let Some(catalog_object_id) = catalog_ref(item) else {
                continue;
            };
            let quantity = parse_quantity(&item.quantity);
            if quantity <= 0 {
                continue;
            }

            records.push(SaleRecord {
                order_id: order.id.clone(),
                line_key: line_key(item, index),
                catalog_object_id: catalog_object_id.to_string(),
                sku: skus.get(catalog_object_id).cloned().flatten(),
                quantity,
                created_at: order.created_at,
            });
        }
    }

    records
}

/// Union of catalog ids referenced by the lines [`flatten`] would emit.
pub fn catalog_ids(orders: &[RawOrder]) -> BTreeSet<String> {
    orders
        .iter()
        .flat_map(|order| order.line_items.iter())
        .filter(|item| parse_quantity(&item.quantity) > 0)
        .filter_map(catalog_ref)
        .map(str::to_string)
        .collect()
}

/// Parse Square's decimal quantity string.
///
/// Fractional quantities truncate toward zero; anything unparseable is 0.
pub fn parse_quantity(raw: &str) -> i64 {
    let raw = raw.trim();
    if let Ok(q) = raw.parse::<i64>() {
        return q;
    }
    match raw.parse::<f64>() {
        Ok(q) if q.is_finite() => q.trunc() as i64,
        _ => 0,
    }
}

fn catalog_ref(item: &RawLineItem) -> Option<&str> {
    item.catalog_object_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

fn line_key(item: &RawLineItem, index: usize) -> String {
    match item.uid.as_deref().map(str::trim) {
        Some(uid) if !uid.is_empty() => uid.to_string(),
        _ => format!("#{}", index),
    }
}
