//! Item valuation resolver.
//!
//! Resolves every distinct looted item once per run and prices loot
//! lines under the dual-price policy: sell instantly into market buy
//! offers, or sell to the best-paying vendor, whichever yields strictly
//! more (ties go to the vendor). Coins have fixed values and skip the
//! market entirely.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::config::ValuationConfig;
use crate::error::SettlementError;
use crate::gold::checked_total;
use crate::market::{best_npc_offer, MarketData, MarketSnapshot};
use crate::types::{
    BookLevel, Degradation, DegradedItem, FilledLevel, Gold, ItemId, ItemValuation, LootLine,
    MarketQuote, Route,
};

// ---------------------------------------------------------------------------
// Currency table
// ---------------------------------------------------------------------------

const CURRENCY: [(&str, Gold); 3] = [
    ("gold coin", 1),
    ("platinum coin", 100),
    ("crystal coin", 10_000),
];

/// Fixed value of a coin, singular or plural.
pub fn currency_value(name: &str) -> Option<Gold> {
    let singular = name.strip_suffix('s').unwrap_or(name);
    CURRENCY
        .iter()
        .find(|(coin, _)| *coin == name || *coin == singular)
        .map(|(_, value)| *value)
}

/// The name itself followed by singular guesses, most specific first.
pub fn name_variants(name: &str) -> Vec<String> {
    let mut out = vec![name.to_string()];
    if let Some(stem) = name.strip_suffix("coins") {
        out.push(format!("{stem}coin"));
    }
    if let Some(stem) = name.strip_suffix("ies") {
        out.push(format!("{stem}y"));
    }
    if let Some(stem) = name.strip_suffix("es") {
        out.push(stem.to_string());
    }
    if let Some(stem) = name.strip_suffix('s') {
        out.push(stem.to_string());
    }

    let mut seen = HashSet::new();
    out.retain(|v| !v.is_empty() && seen.insert(v.clone()));
    out
}

// ---------------------------------------------------------------------------
// Depth fill
// ---------------------------------------------------------------------------

/// Outcome of selling a quantity into buy-side depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthFill {
    pub value: Gold,
    pub used_levels: Vec<FilledLevel>,
    /// Quantity the book could not absorb; it earns nothing on the market.
    pub unfilled: u64,
}

/// Greedily fill `quantity` against buy offers, best price first and,
/// at equal prices, newest offer first. `None` if the proceeds do not fit
/// in a gold amount.
pub fn fill_from_depth(levels: &[BookLevel], quantity: u64) -> Option<DepthFill> {
    let mut book: Vec<&BookLevel> = levels.iter().filter(|l| l.quantity > 0).collect();
    book.sort_by(|a, b| b.price.cmp(&a.price).then(b.timestamp.cmp(&a.timestamp)));

    let mut remaining = quantity;
    let mut value: Gold = 0;
    let mut used_levels = Vec::new();

    for level in book {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(level.quantity);
        value = value.checked_add(checked_total(level.price, take)?)?;
        remaining -= take;
        match used_levels.last_mut() {
            Some(FilledLevel { price, quantity }) if *price == level.price => *quantity += take,
            _ => used_levels.push(FilledLevel { price: level.price, quantity: take }),
        }
    }

    Some(DepthFill {
        value,
        used_levels,
        unfilled: remaining,
    })
}

// ---------------------------------------------------------------------------
// Resolved items
// ---------------------------------------------------------------------------

/// Market-side pricing source for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketSide {
    Depth(Vec<BookLevel>),
    TopOfBook(Gold),
    Unavailable,
}

/// Everything known about one resolved, tradeable item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedItem {
    pub id: ItemId,
    pub npc_unit_price: Gold,
    pub best_vendor: Option<String>,
    pub market: MarketSide,
    pub quote: Option<MarketQuote>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedItem {
    Currency(Gold),
    Unmatched,
    Priced(PricedItem),
}

/// The per-run valuation map: one entry per distinct item name.
///
/// Fully populated before any loot line is valued.
#[derive(Debug, Clone)]
pub struct ValuationBook {
    items: HashMap<String, ResolvedItem>,
    /// Snapshot time; `None` when no market data was consulted.
    pub as_of: Option<DateTime<Utc>>,
    /// Unresolved names, in first-seen order.
    pub unmatched: Vec<String>,
    pub degraded: Vec<DegradedItem>,
}

impl ValuationBook {
    pub fn get(&self, name: &str) -> Option<&ResolvedItem> {
        self.items.get(name)
    }

    /// Value one aggregated loot line.
    pub fn value_line(&self, line: &LootLine) -> Result<ItemValuation, SettlementError> {
        let overflow = || SettlementError::AmountOverflow(line.item_name.clone());
        let total = |unit: Gold| checked_total(unit, line.quantity).ok_or_else(overflow);
        let mut v = ItemValuation {
            item_name: line.item_name.clone(),
            quantity: line.quantity,
            item_id: None,
            route: Route::Unmatched,
            npc_unit_price: 0,
            npc_total: 0,
            market_total: 0,
            chosen_total: 0,
            used_levels: Vec::new(),
            best_vendor: None,
            quote: None,
        };

        match self.items.get(&line.item_name) {
            None | Some(ResolvedItem::Unmatched) => {}
            Some(ResolvedItem::Currency(unit)) => {
                v.route = Route::Currency;
                v.chosen_total = total(*unit)?;
            }
            Some(ResolvedItem::Priced(item)) => {
                let (market_total, used_levels) = match &item.market {
                    MarketSide::Depth(levels) => {
                        let fill = fill_from_depth(levels, line.quantity).ok_or_else(overflow)?;
                        (fill.value, fill.used_levels)
                    }
                    MarketSide::TopOfBook(price) => (total((*price).max(0))?, Vec::new()),
                    MarketSide::Unavailable => (0, Vec::new()),
                };
                let npc_total = total(item.npc_unit_price)?;

                v.item_id = Some(item.id);
                v.npc_unit_price = item.npc_unit_price;
                v.npc_total = npc_total;
                v.market_total = market_total;
                v.used_levels = used_levels;
                v.best_vendor = item.best_vendor.clone();
                v.quote = item.quote.clone();
                if market_total > npc_total {
                    v.route = Route::Market;
                    v.chosen_total = market_total;
                } else {
                    v.route = Route::Npc;
                    v.chosen_total = npc_total;
                }
            }
        }

        Ok(v)
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolves distinct item names against the market collaborator.
pub struct ValuationResolver<'a> {
    market: &'a dyn MarketData,
    cfg: &'a ValuationConfig,
}

impl<'a> ValuationResolver<'a> {
    pub fn new(market: &'a dyn MarketData, cfg: &'a ValuationConfig) -> Self {
        Self { market, cfg }
    }

    /// Try the name and its singular variants; first hit wins.
    pub async fn resolve_identity(&self, name: &str) -> Result<Option<ItemId>, SettlementError> {
        for candidate in name_variants(name) {
            let found = self
                .market
                .resolve_identity(&candidate)
                .await
                .map_err(|e| SettlementError::MarketUnavailable(format!("{e:#}")))?;
            if let Some(id) = found {
                debug!(item = %name, candidate = %candidate, id, "Item identity resolved");
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Build the valuation map for `names` (distinct, in first-seen order).
    pub async fn resolve(&self, names: &[String]) -> Result<ValuationBook, SettlementError> {
        let mut items = HashMap::with_capacity(names.len());
        let mut unmatched = Vec::new();
        let mut tradeable: Vec<(String, ItemId)> = Vec::new();

        // 1. Coins and identities
        for name in names {
            if items.contains_key(name) {
                continue;
            }
            if let Some(unit) = currency_value(name) {
                items.insert(name.clone(), ResolvedItem::Currency(unit));
                continue;
            }
            match self.resolve_identity(name).await? {
                Some(id) => tradeable.push((name.clone(), id)),
                None => {
                    warn!(item = %name, "Item not found on market, left for manual pricing");
                    items.insert(name.clone(), ResolvedItem::Unmatched);
                    unmatched.push(name.clone());
                }
            }
        }

        // 2. One batched top-of-book snapshot for the whole run
        let mut ids: Vec<ItemId> = tradeable.iter().map(|(_, id)| *id).collect();
        ids.sort_unstable();
        ids.dedup();

        let snapshot = if ids.is_empty() {
            Some(MarketSnapshot::default())
        } else {
            match self.market.market_snapshot(&ids).await {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!(error = %e, items = ids.len(), "Market snapshot failed, market side degraded");
                    None
                }
            }
        };

        // 3. Per-item vendor prices and depth, fanned out but order-preserving
        let snapshot_ref = snapshot.as_ref();
        let priced: Vec<(String, PricedItem, Vec<Degradation>)> = stream::iter(tradeable)
            .map(|(name, id)| async move {
                let (item, degradations) = self.price_item(&name, id, snapshot_ref).await;
                (name, item, degradations)
            })
            .buffered(self.cfg.max_in_flight.max(1))
            .collect()
            .await;

        let mut degraded = Vec::new();
        for (name, item, degradations) in priced {
            for reason in degradations {
                degraded.push(DegradedItem { item_name: name.clone(), reason });
            }
            items.insert(name, ResolvedItem::Priced(item));
        }

        let as_of = snapshot.as_ref().and_then(|s| s.as_of);

        info!(
            distinct = names.len(),
            unmatched = unmatched.len(),
            degraded = degraded.len(),
            backend = self.market.name(),
            "Item valuations resolved"
        );

        Ok(ValuationBook {
            items,
            as_of,
            unmatched,
            degraded,
        })
    }

    /// Collect vendor and market prices for one resolved item.
    async fn price_item(
        &self,
        name: &str,
        id: ItemId,
        snapshot: Option<&MarketSnapshot>,
    ) -> (PricedItem, Vec<Degradation>) {
        let mut degradations = Vec::new();

        let (npc_unit_price, best_vendor) = match self.market.npc_buy_offers(id).await {
            Ok(offers) => match best_npc_offer(&offers) {
                Some(best) => (best.price, Some(best.vendor.clone())),
                None => (0, None),
            },
            Err(e) => {
                warn!(item = %name, error = %e, "Vendor price lookup failed");
                degradations.push(Degradation::NpcUnavailable);
                (0, None)
            }
        };

        let top_of_book = |snap: &MarketSnapshot| MarketSide::TopOfBook(snap.top_of_book_buy(id).unwrap_or(0));

        let market = if self.cfg.use_depth {
            match self.market.order_book_depth(id).await {
                Ok(levels) => MarketSide::Depth(levels),
                Err(e) => match snapshot {
                    Some(snap) => {
                        warn!(item = %name, error = %e, "Depth lookup failed, using top-of-book");
                        degradations.push(Degradation::DepthUnavailable);
                        top_of_book(snap)
                    }
                    None => {
                        warn!(item = %name, error = %e, "No market data, valuing at vendor price");
                        degradations.push(Degradation::MarketUnavailable);
                        MarketSide::Unavailable
                    }
                },
            }
        } else {
            match snapshot {
                Some(snap) => top_of_book(snap),
                None => {
                    degradations.push(Degradation::MarketUnavailable);
                    MarketSide::Unavailable
                }
            }
        };

        let item = PricedItem {
            id,
            npc_unit_price,
            best_vendor,
            market,
            quote: snapshot.and_then(|s| s.quote(id).cloned()),
        };
        (item, degradations)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
