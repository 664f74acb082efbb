//! Core data models used throughout the sync pipeline.
//!
//! [`RawOrder`] and [`RawLineItem`] mirror the subset of Square's `Order`
//! object that ingestion reads. [`SaleRecord`] is the flattened, storable
//! unit: one per sold line item.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// An order as returned by the order source.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RawOrder {
    pub id: String,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub line_items: Vec<RawLineItem>,
}

/// A line item inside a [`RawOrder`].
///
/// Square encodes quantities as decimal strings (`"2"`, `"1.5"`).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RawLineItem {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub catalog_object_id: Option<String>,
}

/// One sold line item, ready for ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRecord {
    pub order_id: String,
    /// Line identity within the order: the line item `uid`, or `#<index>`.
    pub line_key: String,
    pub catalog_object_id: String,
    /// `None` when catalog resolution failed or the object has no SKU.
    pub sku: Option<String>,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

impl SaleRecord {
    /// Canonical text form of `created_at` used in the store and exports.
    pub fn created_at_text(&self) -> String {
        format_ts(&self.created_at)
    }
}

pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
