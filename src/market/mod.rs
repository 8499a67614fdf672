//! Market data integration.
//!
//! Defines the `MarketData` collaborator trait consumed by the valuation
//! engine and provides:
//! - `TibiaMarketClient`: HTTP client for the public market API
//! - `Throttle`: spacing of outbound calls under a strict rate limit
//!
//! The engine only ever talks to the trait, so tests and alternative
//! back-ends inject their own implementation.

pub mod throttle;
pub mod tibiamarket;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::types::{BookLevel, ItemId, MarketQuote, NpcOffer};

pub use throttle::Throttle;
pub use tibiamarket::TibiaMarketClient;

/// Top-of-book rows for a batch of items, taken at one point in time.
#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    pub quotes: HashMap<ItemId, MarketQuote>,
    /// Newest row timestamp in the batch, if the service reported one.
    pub as_of: Option<DateTime<Utc>>,
}

impl MarketSnapshot {
    pub fn quote(&self, id: ItemId) -> Option<&MarketQuote> {
        self.quotes.get(&id)
    }

    /// Best buy offer for an item, if any buyer is listed.
    pub fn top_of_book_buy(&self, id: ItemId) -> Option<i64> {
        self.quotes.get(&id).and_then(|q| q.buy_offer)
    }
}

/// Abstraction over the market-data service.
///
/// All methods may hit a rate-limited remote; implementors are expected
/// to space their calls. `Ok(None)` from `resolve_identity` means "not
/// found"; `Err` means the service itself failed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Resolve a normalized item name to its market identity.
    async fn resolve_identity(&self, name: &str) -> Result<Option<ItemId>>;

    /// Vendors willing to buy the item from players. Empty if none.
    async fn npc_buy_offers(&self, id: ItemId) -> Result<Vec<NpcOffer>>;

    /// Batched top-of-book snapshot for the given identities.
    async fn market_snapshot(&self, ids: &[ItemId]) -> Result<MarketSnapshot>;

    /// Buy-side depth of book. `Err` triggers the top-of-book fallback.
    async fn order_book_depth(&self, id: ItemId) -> Result<Vec<BookLevel>>;

    /// Back-end name for logging.
    fn name(&self) -> &str;
}

/// Highest vendor buy-back offer, or `None` if no vendor buys the item.
pub fn best_npc_offer(offers: &[NpcOffer]) -> Option<&NpcOffer> {
    offers
        .iter()
        .filter(|o| o.price > 0)
        .fold(None, |best: Option<&NpcOffer>, o| match best {
            Some(b) if b.price >= o.price => Some(b),
            _ => Some(o),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(vendor: &str, price: i64) -> NpcOffer {
        NpcOffer { vendor: vendor.into(), price }
    }

    #[test]
    fn test_best_npc_offer_picks_max_first_on_tie() {
        let offers = vec![offer("Rashid", 500), offer("Tamoril", 800), offer("Gnomally", 800)];
        assert_eq!(best_npc_offer(&offers).unwrap().vendor, "Tamoril");
    }

    #[test]
    fn test_best_npc_offer_ignores_zero() {
        assert!(best_npc_offer(&[offer("Nobody", 0)]).is_none());
        assert!(best_npc_offer(&[]).is_none());
    }

    #[test]
    fn test_snapshot_top_of_book() {
        let mut snap = MarketSnapshot::default();
        snap.quotes.insert(7, MarketQuote { buy_offer: Some(120), ..MarketQuote::default() });
        assert_eq!(snap.top_of_book_buy(7), Some(120));
        assert_eq!(snap.top_of_book_buy(8), None);
    }
}
