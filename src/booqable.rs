//! Booqable (boomerang API) client used by the stock and rental reports.
//!
//! Responses follow the JSON:API layout (`data`, `included`, `attributes`).
//! Query filters are built from typed values ([`ProductQuery`],
//! [`InventoryQuery`], [`OrderQuery`]) and only flattened into Booqable's
//! bracketed query-string keys when a request is sent.
//!
//! # Configuration
//!
//! ```toml
//! [booqable]
//! base_url = "https://acme.booqable.com/api/boomerang"
//! token_env = "BOOQABLE_API_KEY"
//! page_size = 100
//! ```

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::{token_from_env, BooqableConfig};

type Query = Vec<(String, String)>;

/// Upper bound on pages fetched from one listing.
const MAX_PAGES: u32 = 1_000;

// ============ Typed queries ============

/// Filter for the `products` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    pub archived: bool,
    pub product_type: Option<String>,
}

impl ProductQuery {
    /// Non-archived consumables.
    pub fn consumables() -> Self {
        Self {
            archived: false,
            product_type: Some("consumable".to_string()),
        }
    }

    pub fn to_pairs(&self) -> Query {
        let mut pairs = vec![("filter[archived]".to_string(), self.archived.to_string())];
        if let Some(ref product_type) = self.product_type {
            pairs.push(("filter[product_type]".to_string(), product_type.clone()));
        }
        pairs
    }
}

/// Filter for `inventory_breakdowns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryQuery {
    pub product_id: String,
    pub status: String,
}

impl InventoryQuery {
    pub fn in_stock(product_id: &str) -> Self {
        Self {
            product_id: product_id.to_string(),
            status: "in_stock".to_string(),
        }
    }

    pub fn to_pairs(&self) -> Query {
        vec![
            ("filter[product_id]".to_string(), self.product_id.clone()),
            ("filter[status]".to_string(), self.status.clone()),
        ]
    }
}

/// Orders overlapping a date range: those starting or stopping inside
/// `[from, till]`, minus the excluded statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
    pub from: NaiveDate,
    pub till: NaiveDate,
    pub excluded_statuses: Vec<String>,
    pub sort: String,
}

impl OrderQuery {
    pub fn active_between(from: NaiveDate, till: NaiveDate) -> Self {
        Self {
            from,
            till,
            excluded_statuses: vec!["canceled".into(), "archived".into(), "new".into()],
            sort: "-number".to_string(),
        }
    }

    pub fn to_pairs(&self) -> Query {
        let from = self.from.format("%Y-%m-%d").to_string();
        let till = self.till.format("%Y-%m-%d").to_string();
        let cond = "filter[conditions]";
        let attrs = "filter[conditions][attributes][]";

        let mut pairs = vec![
            ("sort".to_string(), self.sort.clone()),
            (format!("{}[operator]", cond), "or".to_string()),
        ];
        for field in ["starts_at", "stops_at"] {
            pairs.push((format!("{}[operator]", attrs), "and".to_string()));
            pairs.push((format!("{}[attributes][][{}][gte]", attrs, field), from.clone()));
            pairs.push((format!("{}[attributes][][{}][lte]", attrs, field), till.clone()));
        }
        for status in &self.excluded_statuses {
            pairs.push(("filter[statuses][not_eq][]".to_string(), status.clone()));
        }
        pairs
    }
}

// ============ Wire types ============

#[derive(Debug, Deserialize)]
struct Document<T> {
    data: T,
    #[serde(default)]
    included: Vec<Resource<serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Resource<A> {
    pub id: String,
    #[serde(rename = "type", default)]
    pub resource_type: String,
    pub attributes: A,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProductAttributes {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub variation: bool,
    #[serde(default)]
    pub variation_values: Vec<String>,
    #[serde(default)]
    pub product_group_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProductGroupAttributes {
    #[serde(default)]
    sku: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct InventoryBreakdownAttributes {
    #[serde(default)]
    stock_count: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OrderAttributes {
    #[serde(default)]
    pub number: Option<i64>,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

impl OrderAttributes {
    /// A custom order property as text. Missing or null reads as empty;
    /// non-string values use their JSON form.
    pub fn property(&self, key: &str) -> String {
        match self.properties.get(key) {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// A line of an order, from `orders/{id}?include=lines`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LineAttributes {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub quantity: i64,
}

pub type Product = Resource<ProductAttributes>;
pub type Order = Resource<OrderAttributes>;

// ============ Client ============

pub struct BooqableClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    page_size: u32,
}

impl BooqableClient {
    pub fn new(config: &BooqableConfig) -> Result<Self> {
        let token = token_from_env(&config.token_env)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            page_size: config.page_size,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &Query) -> Result<Document<T>> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, params = query.len(), "booqable GET");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Booqable request to {} failed", path))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "Booqable {} failed (HTTP {}): {}",
                path,
                status,
                body.chars().take(500).collect::<String>()
            );
        }

        resp.json::<Document<T>>()
            .await
            .with_context(|| format!("Booqable {} returned an unreadable body", path))
    }

    /// Fetch every page of a listing endpoint.
    async fn get_all<A: DeserializeOwned>(
        &self,
        path: &str,
        query: &Query,
    ) -> Result<Vec<Resource<A>>> {
        let mut all = Vec::new();
        let mut previous_first: Option<String> = None;

        for page in 1..=MAX_PAGES {
            let mut paged = query.clone();
            paged.push(("page[number]".to_string(), page.to_string()));
            paged.push(("page[size]".to_string(), self.page_size.to_string()));

            let doc: Document<Vec<Resource<A>>> = self.get(path, &paged).await?;
            let count = doc.data.len();
            let first = doc.data.first().map(|r| r.id.clone());
            if first.is_some() && first == previous_first {
                bail!(
                    "Booqable {} returned the same page twice (page {}); paging is ignored",
                    path,
                    page
                );
            }
            all.extend(doc.data);

            if count < self.page_size as usize {
                return Ok(all);
            }
            previous_first = first;
        }

        bail!("Booqable {} did not finish within {} pages", path, MAX_PAGES)
    }

    pub async fn products(&self, query: &ProductQuery) -> Result<Vec<Product>> {
        self.get_all("products", &query.to_pairs()).await
    }

    pub async fn product_group_sku(&self, product_group_id: &str) -> Result<Option<String>> {
        let doc: Document<Resource<ProductGroupAttributes>> = self
            .get(&format!("product_groups/{}", product_group_id), &Vec::new())
            .await?;
        Ok(doc.data.attributes.sku)
    }

    /// Stock count of the first matching inventory breakdown, 0 if none.
    pub async fn stock_count(&self, query: &InventoryQuery) -> Result<i64> {
        let doc: Document<Vec<Resource<InventoryBreakdownAttributes>>> =
            self.get("inventory_breakdowns", &query.to_pairs()).await?;
        Ok(doc
            .data
            .first()
            .and_then(|b| b.attributes.stock_count)
            .unwrap_or(0))
    }

    pub async fn orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        self.get_all("orders", &query.to_pairs()).await
    }

    /// Lines of one order.
    pub async fn order_lines(&self, order_id: &str) -> Result<Vec<LineAttributes>> {
        let query = vec![("include".to_string(), "lines".to_string())];
        let doc: Document<serde_json::Value> =
            self.get(&format!("orders/{}", order_id), &query).await?;
        lines_from_included(doc.included)
    }
}

fn lines_from_included(included: Vec<Resource<serde_json::Value>>) -> Result<Vec<LineAttributes>> {
    included
        .into_iter()
        .filter(|r| r.resource_type == "lines")
        .map(|r| {
            serde_json::from_value(r.attributes)
                .with_context(|| format!("Malformed line attributes on {}", r.id))
        })
        .collect()
}
