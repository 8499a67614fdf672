//! Tibia market API integration.
//!
//! Item identities and vendor prices come from the item metadata feed,
//! which is large and changes rarely, so it is cached with a TTL. Prices
//! are world-scoped and fetched per run.
//!
//! Base URL: https://api.tibiamarket.top
//! Endpoints:
//! - `GET /item_metadata`: every item with its vendor buy/sell lists
//! - `GET /market_values?server=<world>&item_ids=<id,id,...>`: top of book
//! - `GET /market_board?server=<world>&item_id=<id>`: full depth
//! Rate limit: strict; calls are spaced by the configured `Throttle`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{MarketData, MarketSnapshot, Throttle};
use crate::config::MarketConfig;
use crate::types::{BookLevel, Gold, ItemId, MarketQuote, NpcOffer};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://api.tibiamarket.top";
const BACKEND_NAME: &str = "tibiamarket";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// One row of `/item_metadata`. Only the fields we use.
#[derive(Debug, Deserialize)]
struct ItemMetadataRow {
    id: Option<ItemId>,
    #[serde(default)]
    name: Option<String>,
    /// Vendors that buy this item from players.
    #[serde(default)]
    npc_buy: Vec<NpcTradeRow>,
}

#[derive(Debug, Deserialize)]
struct NpcTradeRow {
    #[serde(default)]
    name: String,
    #[serde(default)]
    price: Option<f64>,
}

/// One row of `/market_values`.
#[derive(Debug, Deserialize)]
struct MarketValueRow {
    id: Option<ItemId>,
    /// Unix seconds of the observation.
    #[serde(default)]
    time: Option<f64>,
    #[serde(default)]
    buy_offer: Option<f64>,
    #[serde(default)]
    sell_offer: Option<f64>,
    #[serde(default)]
    month_average_buy: Option<f64>,
    #[serde(default)]
    month_average_sell: Option<f64>,
}

/// `/market_board` response.
#[derive(Debug, Deserialize)]
struct MarketBoard {
    #[serde(default)]
    buyers: Vec<BoardOffer>,
}

#[derive(Debug, Deserialize)]
struct BoardOffer {
    #[serde(default)]
    amount: u64,
    #[serde(default)]
    price: f64,
    #[serde(default)]
    time: f64,
}

// ---------------------------------------------------------------------------
// Metadata cache
// ---------------------------------------------------------------------------

struct MetadataCache {
    name_to_id: HashMap<String, ItemId>,
    npc_buyers: HashMap<ItemId, Vec<NpcOffer>>,
    loaded_at: DateTime<Utc>,
}

impl MetadataCache {
    fn from_rows(rows: Vec<ItemMetadataRow>) -> Self {
        let mut name_to_id = HashMap::new();
        let mut npc_buyers = HashMap::new();

        for row in rows {
            let (Some(id), Some(name)) = (row.id, row.name) else {
                continue;
            };
            let norm = name.trim().to_lowercase();
            if norm.is_empty() {
                continue;
            }
            name_to_id.insert(norm, id);

            let offers: Vec<NpcOffer> = row
                .npc_buy
                .into_iter()
                .filter_map(|n| {
                    let price = to_gold(n.price)?;
                    Some(NpcOffer { vendor: n.name, price })
                })
                .collect();
            npc_buyers.insert(id, offers);
        }

        Self {
            name_to_id,
            npc_buyers,
            loaded_at: Utc::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        Utc::now() - self.loaded_at < ttl
    }
}

/// Non-negative finite API numbers become whole gold.
fn to_gold(v: Option<f64>) -> Option<Gold> {
    v.filter(|x| x.is_finite() && *x >= 0.0).map(|x| x.trunc() as Gold)
}

fn secs_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs.trunc() as i64, 0).single()
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Market data client for one game world.
pub struct TibiaMarketClient {
    http: Client,
    base_url: String,
    world: String,
    api_token: Option<String>,
    throttle: Throttle,
    metadata_ttl: Duration,
    metadata: RwLock<Option<MetadataCache>>,
}

impl TibiaMarketClient {
    /// Create a client from the `[market]` config section.
    pub fn new(cfg: &MarketConfig, api_token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.request_timeout_secs))
            .user_agent("LOOTSPLIT/0.1.0 (hunt-settlement)")
            .build()
            .context("Failed to build HTTP client for the market API")?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            world: cfg.world.clone(),
            api_token,
            throttle: Throttle::new(std::time::Duration::from_millis(cfg.min_call_interval_ms)),
            metadata_ttl: Duration::seconds(cfg.metadata_ttl_secs as i64),
            metadata: RwLock::new(None),
        })
    }

    pub fn world(&self) -> &str {
        &self.world
    }

    // -- Internal helpers ------------------------------------------------

    /// Throttled GET returning parsed JSON.
    async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T> {
        self.throttle.acquire().await;

        let url = format!("{}{}", self.base_url, path_and_query);
        debug!(url = %url, "Fetching market data");

        let mut req = self.http.get(&url).header("accept", "application/json");
        if let Some(token) = &self.api_token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.context("Market API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Market API error {status} for {url}: {body}");
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse market API response from {url}"))
    }

    /// Make sure the metadata cache is loaded and fresh.
    async fn ensure_metadata(&self) -> Result<()> {
        if let Some(cache) = self.metadata.read().await.as_ref() {
            if cache.is_fresh(self.metadata_ttl) {
                return Ok(());
            }
        }

        let mut guard = self.metadata.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(cache) = guard.as_ref() {
            if cache.is_fresh(self.metadata_ttl) {
                return Ok(());
            }
        }

        let rows: Vec<ItemMetadataRow> = self.get_json("/item_metadata").await?;
        let cache = MetadataCache::from_rows(rows);
        if cache.name_to_id.is_empty() {
            anyhow::bail!("Item metadata feed returned no usable items");
        }

        info!(items = cache.name_to_id.len(), "Item metadata loaded");
        *guard = Some(cache);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MarketData trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl MarketData for TibiaMarketClient {
    async fn resolve_identity(&self, name: &str) -> Result<Option<ItemId>> {
        self.ensure_metadata().await?;
        let guard = self.metadata.read().await;
        let key = name.trim().to_lowercase();
        Ok(guard.as_ref().and_then(|c| c.name_to_id.get(&key).copied()))
    }

    async fn npc_buy_offers(&self, id: ItemId) -> Result<Vec<NpcOffer>> {
        self.ensure_metadata().await?;
        let guard = self.metadata.read().await;
        Ok(guard
            .as_ref()
            .and_then(|c| c.npc_buyers.get(&id).cloned())
            .unwrap_or_default())
    }

    /// One request for the whole batch.
    async fn market_snapshot(&self, ids: &[ItemId]) -> Result<MarketSnapshot> {
        if ids.is_empty() {
            return Ok(MarketSnapshot::default());
        }

        let id_list = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let path = format!(
            "/market_values?server={}&item_ids={}",
            urlencoding::encode(&self.world),
            urlencoding::encode(&id_list),
        );

        let rows: Vec<MarketValueRow> = self.get_json(&path).await?;

        let mut snapshot = MarketSnapshot::default();
        let mut newest: Option<f64> = None;

        for row in rows {
            let Some(id) = row.id else { continue };
            snapshot.quotes.insert(
                id,
                MarketQuote {
                    buy_offer: to_gold(row.buy_offer),
                    sell_offer: to_gold(row.sell_offer),
                    month_average_buy: to_gold(row.month_average_buy),
                    month_average_sell: to_gold(row.month_average_sell),
                },
            );
            if let Some(t) = row.time.filter(|t| t.is_finite()) {
                newest = Some(newest.map_or(t, |n| n.max(t)));
            }
        }

        snapshot.as_of = newest.and_then(secs_to_datetime);

        debug!(
            requested = ids.len(),
            returned = snapshot.quotes.len(),
            world = %self.world,
            "Market snapshot fetched"
        );

        Ok(snapshot)
    }

    async fn order_book_depth(&self, id: ItemId) -> Result<Vec<BookLevel>> {
        let path = format!(
            "/market_board?server={}&item_id={id}",
            urlencoding::encode(&self.world),
        );
        let board: MarketBoard = self.get_json(&path).await?;

        Ok(board
            .buyers
            .into_iter()
            .filter(|b| b.amount > 0 && b.price.is_finite() && b.price > 0.0)
            .map(|b| BookLevel {
                price: b.price.trunc() as Gold,
                quantity: b.amount,
                timestamp: b.time.trunc() as i64,
            })
            .collect())
    }

    fn name(&self) -> &str {
        BACKEND_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
