//! TOML configuration.
//!
//! Every collaborator (Square client, Booqable client, store, export sink)
//! is constructed from a section of [`Config`]. Credentials never live in
//! the file itself: each API section names the environment variable that
//! holds its bearer token.
//!
//! ```toml
//! [db]
//! path = "./data/sales.sqlite"
//!
//! [square]
//! location_ids = ["L8A2Q9XKZ1"]
//! states = ["COMPLETED"]
//!
//! [sync]
//! dedupe = "line"
//!
//! [export]
//! dir = "./exports"
//!
//! [booqable]
//! base_url = "https://example.booqable.com/api/boomerang"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub square: SquareConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub booqable: Option<BooqableConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_busy_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct SquareConfig {
    #[serde(default = "default_square_base_url")]
    pub base_url: String,
    #[serde(default = "default_square_api_version")]
    pub api_version: String,
    #[serde(default = "default_square_token_env")]
    pub token_env: String,
    #[serde(default)]
    pub location_ids: Vec<String>,
    #[serde(default = "default_states")]
    pub states: Vec<String>,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_square_base_url() -> String {
    "https://connect.squareup.com".to_string()
}
fn default_square_api_version() -> String {
    "2024-10-17".to_string()
}
fn default_square_token_env() -> String {
    "SQUARE_ACCESS_TOKEN".to_string()
}
fn default_states() -> Vec<String> {
    vec!["COMPLETED".to_string()]
}
fn default_page_limit() -> u32 {
    500
}
fn default_timeout_secs() -> u64 {
    30
}

/// How the store decides that a sale line has already been ingested.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DedupeKey {
    /// One row per `(order_id, line item)`.
    #[default]
    Line,
    /// One row per `order_id`; later lines of an order are skipped.
    Order,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default)]
    pub dedupe: DedupeKey,
    #[serde(default = "default_timeout_secs")]
    pub store_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            dedupe: DedupeKey::default(),
            store_timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_export_dir")]
    pub dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: default_export_dir(),
        }
    }
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("./exports")
}

#[derive(Debug, Deserialize, Clone)]
pub struct BooqableConfig {
    pub base_url: String,
    #[serde(default = "default_booqable_token_env")]
    pub token_env: String,
    #[serde(default = "default_booqable_page_size")]
    pub page_size: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_booqable_token_env() -> String {
    "BOOQABLE_API_KEY".to_string()
}
fn default_booqable_page_size() -> u32 {
    100
}

impl Config {
    /// The `[booqable]` section, or an error naming the missing section.
    pub fn booqable(&self) -> Result<&BooqableConfig> {
        self.booqable
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("[booqable] section missing from config"))
    }
}

/// Read the bearer token named by `var`.
pub fn token_from_env(var: &str) -> Result<String> {
    let token = std::env::var(var)
        .with_context(|| format!("{} environment variable not set", var))?;
    if token.trim().is_empty() {
        anyhow::bail!("{} environment variable is empty", var);
    }
    Ok(token)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Square
    if config.square.base_url.trim().is_empty() {
        anyhow::bail!("square.base_url must not be empty");
    }
    if config.square.states.is_empty() {
        anyhow::bail!("square.states must list at least one order state");
    }
    if !(1..=10).contains(&config.square.location_ids.len()) {
        anyhow::bail!("square.location_ids must list between 1 and 10 locations");
    }
    if !(1..=1000).contains(&config.square.page_limit) {
        anyhow::bail!("square.page_limit must be in [1, 1000]");
    }
    if config.square.timeout_secs == 0 {
        anyhow::bail!("square.timeout_secs must be > 0");
    }

    // Sync
    if config.sync.store_timeout_secs == 0 {
        anyhow::bail!("sync.store_timeout_secs must be > 0");
    }

    // Booqable
    if let Some(ref bq) = config.booqable {
        if bq.base_url.trim().is_empty() {
            anyhow::bail!("booqable.base_url must not be empty");
        }
        if bq.page_size == 0 {
            anyhow::bail!("booqable.page_size must be > 0");
        }
    }

    Ok(())
}
