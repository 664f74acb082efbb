//! Square API client.
//!
//! Implements [`OrderSource`] over `POST /v2/orders/search` and
//! [`CatalogResolver`] over `POST /v2/catalog/batch-retrieve`.
//!
//! # Configuration
//!
//! ```toml
//! [square]
//! base_url = "https://connect.squareup.com"   # or https://connect.squareupsandbox.com
//! api_version = "2024-10-17"
//! token_env = "SQUARE_ACCESS_TOKEN"
//! location_ids = ["L8A2Q9XKZ1"]
//! states = ["COMPLETED"]
//! page_limit = 500
//! timeout_secs = 30
//! ```
//!
//! # Pagination
//!
//! `SearchOrders` returns at most `page_limit` orders per call plus a
//! `cursor`. The client follows cursors until none is returned, so callers
//! always receive the complete result for the window.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{token_from_env, SquareConfig};
use crate::error::{SyncError, SyncResult};
use crate::filter::OrderFilter;
use crate::models::RawOrder;
use crate::traits::{CatalogResolver, OrderSource, SkuMap};

const ITEM_VARIATION: &str = "ITEM_VARIATION";

pub struct SquareClient {
    http: reqwest::Client,
    base_url: String,
    api_version: String,
    token: String,
    page_limit: u32,
}

impl SquareClient {
    /// Build a client from config. Reads the access token from the
    /// environment; performs no network I/O.
    pub fn new(config: &SquareConfig) -> SyncResult<Self> {
        let token =
            token_from_env(&config.token_env).map_err(|e| SyncError::Config(e.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            token,
            page_limit: config.page_limit,
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header("Square-Version", &self.api_version)
    }

    async fn search_page(
        &self,
        filter: &OrderFilter,
        cursor: Option<&str>,
    ) -> SyncResult<SearchOrdersResponse> {
        let resp = self
            .post("/v2/orders/search")
            .json(&filter.to_search_body(self.page_limit, cursor))
            .send()
            .await
            .map_err(|e| {
                SyncError::SourceUnavailable(format!("SearchOrders request failed: {}", e))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::SourceUnavailable(format!(
                "SearchOrders failed (HTTP {}): {}",
                status,
                truncate(&body)
            )));
        }

        let page: SearchOrdersResponse = resp.json().await.map_err(|e| {
            SyncError::SourceUnavailable(format!("SearchOrders returned an unreadable body: {}", e))
        })?;

        if !page.errors.is_empty() {
            return Err(SyncError::SourceUnavailable(format!(
                "SearchOrders reported errors: {}",
                describe_errors(&page.errors)
            )));
        }

        Ok(page)
    }
}

#[async_trait]
impl OrderSource for SquareClient {
    async fn search_orders(&self, filter: &OrderFilter) -> SyncResult<Vec<RawOrder>> {
        let mut orders = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self.search_page(filter, cursor.as_deref()).await?;
            pages += 1;
            orders.extend(page.orders);

            match page.cursor {
                Some(next) if !next.is_empty() => {
                    if cursor.as_deref() == Some(next.as_str()) {
                        return Err(SyncError::SourceUnavailable(format!(
                            "SearchOrders returned the same cursor twice: {}",
                            next
                        )));
                    }
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        let fetched = orders.len();
        orders.retain(|order| filter.window.contains(&order.created_at));
        if orders.len() != fetched {
            debug!(
                dropped = fetched - orders.len(),
                "dropped orders outside the half-open window"
            );
        }

        info!(orders = orders.len(), pages, "fetched orders from Square");
        Ok(orders)
    }
}

#[async_trait]
impl CatalogResolver for SquareClient {
    async fn resolve_skus(&self, ids: &BTreeSet<String>) -> Result<SkuMap> {
        let mut skus: SkuMap = ids.iter().map(|id| (id.clone(), None)).collect();
        if ids.is_empty() {
            return Ok(skus);
        }

        let body = serde_json::json!({
            "object_ids": ids,
            "include_related_objects": false,
        });

        let resp = self
            .post("/v2/catalog/batch-retrieve")
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("BatchRetrieveCatalogObjects request failed: {}", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "BatchRetrieveCatalogObjects failed (HTTP {}): {}",
                status,
                truncate(&body)
            );
        }

        let batch: BatchRetrieveResponse = resp.json().await?;
        if !batch.errors.is_empty() && batch.objects.is_empty() {
            bail!(
                "BatchRetrieveCatalogObjects reported errors: {}",
                describe_errors(&batch.errors)
            );
        }

        for object in batch.objects {
            if let Some(slot) = skus.get_mut(&object.id) {
                *slot = object.sku();
            }
        }

        Ok(skus)
    }
}

// ============ Wire types ============

#[derive(Debug, Deserialize)]
struct SearchOrdersResponse {
    #[serde(default)]
    orders: Vec<RawOrder>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct BatchRetrieveResponse {
    #[serde(default)]
    objects: Vec<CatalogObject>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct CatalogObject {
    #[serde(rename = "type")]
    object_type: String,
    id: String,
    #[serde(default)]
    item_variation_data: Option<ItemVariationData>,
}

impl CatalogObject {
    fn sku(&self) -> Option<String> {
        if self.object_type != ITEM_VARIATION {
            return None;
        }
        self.item_variation_data
            .as_ref()
            .and_then(|data| data.sku.clone())
            .filter(|sku| !sku.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ItemVariationData {
    #[serde(default)]
    sku: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    category: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    detail: Option<String>,
}

fn describe_errors(errors: &[ApiError]) -> String {
    errors
        .iter()
        .map(|e| match e.detail {
            Some(ref detail) => format!("{}/{}: {}", e.category, e.code, detail),
            None => format!("{}/{}", e.category, e.code),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn truncate(body: &str) -> String {
    body.chars().take(500).collect()
}
