//! In-memory market for integration testing.
//!
//! Provides a deterministic `MarketData` implementation with a fixed
//! catalogue, vendor prices, top-of-book quotes and depth. Individual
//! endpoints can be forced to fail, and every call is counted.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lootsplit::market::{MarketData, MarketSnapshot};
use lootsplit::types::*;

/// Which endpoint to break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Identity,
    Npc,
    Snapshot,
    Depth,
}

#[derive(Default)]
pub struct StaticMarket {
    ids: HashMap<String, ItemId>,
    npc: HashMap<ItemId, Vec<NpcOffer>>,
    quotes: HashMap<ItemId, MarketQuote>,
    depth: HashMap<ItemId, Vec<BookLevel>>,
    failing: Arc<Mutex<Vec<Endpoint>>>,
    calls: Arc<Mutex<HashMap<Endpoint, usize>>>,
}

impl StaticMarket {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small catalogue covering the integration scenarios.
    pub fn catalogue() -> Self {
        Self::new()
            .with_item("item x", 1, 2000, Some(2200), vec![(2200, 1, 50), (2100, 2, 40)])
            .with_item("dragon ham", 3583, 30, Some(12), vec![(12, 100, 10)])
            .with_item("giant shimmering pearl", 281, 3000, Some(9000), vec![(9000, 1, 20), (8500, 4, 10)])
            .with_item("small ruby", 3030, 250, Some(300), vec![])
            .with_item("rope", 3003, 15, Some(15), vec![(15, 50, 1)])
    }

    pub fn with_item(
        mut self,
        name: &str,
        id: ItemId,
        npc_price: Gold,
        buy_offer: Option<Gold>,
        depth: Vec<(Gold, u64, i64)>,
    ) -> Self {
        self.ids.insert(name.to_string(), id);
        if npc_price > 0 {
            self.npc.insert(
                id,
                vec![
                    NpcOffer { vendor: "Rashid".into(), price: npc_price },
                    NpcOffer { vendor: "Cheapskate".into(), price: npc_price / 2 },
                ],
            );
        }
        self.quotes.insert(
            id,
            MarketQuote {
                buy_offer,
                sell_offer: buy_offer.map(|b| b + b / 10),
                ..MarketQuote::default()
            },
        );
        self.depth.insert(
            id,
            depth
                .into_iter()
                .map(|(price, quantity, timestamp)| BookLevel { price, quantity, timestamp })
                .collect(),
        );
        self
    }

    /// Force subsequent calls to `endpoint` to fail.
    pub fn fail(&self, endpoint: Endpoint) {
        self.failing.lock().unwrap().push(endpoint);
    }

    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.calls.lock().unwrap().get(&endpoint).copied().unwrap_or(0)
    }

    fn enter(&self, endpoint: Endpoint) -> Result<()> {
        *self.calls.lock().unwrap().entry(endpoint).or_default() += 1;
        if self.failing.lock().unwrap().contains(&endpoint) {
            return Err(anyhow!("{endpoint:?} forced failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl MarketData for StaticMarket {
    async fn resolve_identity(&self, name: &str) -> Result<Option<ItemId>> {
        self.enter(Endpoint::Identity)?;
        Ok(self.ids.get(name).copied())
    }

    async fn npc_buy_offers(&self, id: ItemId) -> Result<Vec<NpcOffer>> {
        self.enter(Endpoint::Npc)?;
        Ok(self.npc.get(&id).cloned().unwrap_or_default())
    }

    async fn market_snapshot(&self, ids: &[ItemId]) -> Result<MarketSnapshot> {
        self.enter(Endpoint::Snapshot)?;
        let quotes = ids
            .iter()
            .filter_map(|id| self.quotes.get(id).map(|q| (*id, q.clone())))
            .collect();
        Ok(MarketSnapshot {
            quotes,
            as_of: Utc.timestamp_opt(1_700_000_000, 0).single(),
        })
    }

    async fn order_book_depth(&self, id: ItemId) -> Result<Vec<BookLevel>> {
        self.enter(Endpoint::Depth)?;
        Ok(self.depth.get(&id).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "static"
    }
}
