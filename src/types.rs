//! Shared types for the LOOTSPLIT engine.
//!
//! These types form the data model used across the parser, the market
//! collaborator and the settlement engine. Every value here is created
//! fresh for one settlement run and never mutated after the run returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Gold amounts are whole coins; negative values appear in supplies and deltas.
pub type Gold = i64;

/// Market identity of an item (the market service's numeric item id).
pub type ItemId = u32;

// ---------------------------------------------------------------------------
// Parsed input
// ---------------------------------------------------------------------------

/// A roster entry as read from the party log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub supplies_cost: Gold,
}

/// One (quantity, item) entry from a participant's loot log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootLine {
    /// Lower-cased, article-stripped, whitespace-collapsed item name.
    pub item_name: String,
    pub quantity: u64,
}

impl LootLine {
    pub fn new(item_name: impl Into<String>, quantity: u64) -> Self {
        Self {
            item_name: item_name.into(),
            quantity,
        }
    }
}

impl fmt::Display for LootLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x {}", self.quantity, self.item_name)
    }
}

/// A participant's loot submission. An empty `lines` list is a valid
/// submission ("Looted Items: None").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootSubmission {
    pub participant: String,
    pub lines: Vec<LootLine>,
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// A non-player vendor willing to buy an item from players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcOffer {
    pub vendor: String,
    pub price: Gold,
}

/// One buy-side order-book level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Gold,
    pub quantity: u64,
    /// Unix seconds the offer was placed; used to order equal prices.
    pub timestamp: i64,
}

/// A level consumed while filling an instant sell against the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilledLevel {
    pub price: Gold,
    pub quantity: u64,
}

/// Top-of-book row from the batched market snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub buy_offer: Option<Gold>,
    pub sell_offer: Option<Gold>,
    pub month_average_buy: Option<Gold>,
    pub month_average_sell: Option<Gold>,
}

// ---------------------------------------------------------------------------
// Valuation
// ---------------------------------------------------------------------------

/// How a loot line is valued (and, for MARKET/NPC, where it should be sold).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Route {
    /// Fixed-value coin; never sold.
    Currency,
    /// Instant sell into market buy offers.
    Market,
    /// Sell to the best-paying vendor.
    Npc,
    /// Identity could not be resolved; valued at zero and reported.
    Unmatched,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Currency => write!(f, "CURRENCY"),
            Route::Market => write!(f, "MARKET"),
            Route::Npc => write!(f, "NPC"),
            Route::Unmatched => write!(f, "UNMATCHED"),
        }
    }
}

/// Valuation of one aggregated loot line for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemValuation {
    pub item_name: String,
    pub quantity: u64,
    pub item_id: Option<ItemId>,
    pub route: Route,
    pub npc_unit_price: Gold,
    pub npc_total: Gold,
    /// Instant-liquidation proceeds for `quantity` (depth fill or top-of-book).
    pub market_total: Gold,
    pub chosen_total: Gold,
    /// Depth levels consumed by the market fill; empty on top-of-book fallback.
    pub used_levels: Vec<FilledLevel>,
    pub best_vendor: Option<String>,
    pub quote: Option<MarketQuote>,
}

impl ItemValuation {
    /// Chosen value per unit, rounded down.
    pub fn chosen_unit_value(&self) -> Gold {
        match Gold::try_from(self.quantity) {
            Ok(q) if q > 0 => self.chosen_total.div_euclid(q),
            _ => 0,
        }
    }
}

/// Why an item was valued with less market information than usual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degradation {
    /// Depth lookup failed; top-of-book buy offer × quantity was used.
    DepthUnavailable,
    /// Neither depth nor top-of-book was available; NPC price only.
    MarketUnavailable,
    /// Vendor price lookup failed; NPC route valued at zero.
    NpcUnavailable,
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::DepthUnavailable => write!(f, "depth unavailable, used top-of-book"),
            Degradation::MarketUnavailable => write!(f, "market unavailable, NPC only"),
            Degradation::NpcUnavailable => write!(f, "vendor prices unavailable"),
        }
    }
}

/// An item whose valuation ran on partial market data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedItem {
    pub item_name: String,
    pub reason: Degradation,
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// A settled participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub supplies_cost: Gold,
    pub held_loot_value: Gold,
    pub fair_payout: Gold,
    /// Positive: owes the group. Negative: is owed.
    pub delta: Gold,
}

/// A directed payment clearing part of the deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: String,
    pub to: String,
    pub amount: Gold,
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.from, self.to, self.amount)
    }
}

/// One sell-instruction row of a liquidation plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellInstruction {
    pub item_name: String,
    pub quantity: u64,
    pub item_id: Option<ItemId>,
    pub npc_unit_price: Gold,
    pub npc_total: Gold,
    pub market_total: Gold,
    pub chosen_total: Gold,
    pub used_levels: Vec<FilledLevel>,
    pub best_vendor: Option<String>,
    pub quote: Option<MarketQuote>,
}

/// An item left for manual pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedLine {
    pub item_name: String,
    pub quantity: u64,
}

/// What one participant should do with the loot they hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantPlan {
    pub name: String,
    pub market: Vec<SellInstruction>,
    pub npc: Vec<SellInstruction>,
    pub unmatched: Vec<UnmatchedLine>,
}

/// The complete, immutable outcome of one settlement run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementResult {
    /// Time of the market snapshot the prices came from; `None` when no
    /// market data was consulted (coin-only or unmatched-only loot).
    pub as_of: Option<DateTime<Utc>>,
    pub total_held_loot: Gold,
    pub total_supplies: Gold,
    pub corrected_net: Gold,
    pub equal_share: Gold,
    pub participants: Vec<Participant>,
    pub transfers: Vec<Transfer>,
    /// One plan per participant, in roster order.
    pub sell_instructions: Vec<ParticipantPlan>,
    pub unmatched_item_names: Vec<String>,
    pub degraded: Vec<DegradedItem>,
}

impl SettlementResult {
    /// Liquidation plan for a participant (case-insensitive name match).
    pub fn plan_for(&self, name: &str) -> Option<&ParticipantPlan> {
        let key = name.to_lowercase();
        self.sell_instructions
            .iter()
            .find(|p| p.name.to_lowercase() == key)
    }

    /// Settled row for a participant (case-insensitive name match).
    pub fn participant(&self, name: &str) -> Option<&Participant> {
        let key = name.to_lowercase();
        self.participants
            .iter()
            .find(|p| p.name.to_lowercase() == key)
    }

    /// Rounding loss left undistributed: `corrected_net − equal_share·n`.
    pub fn remainder(&self) -> Gold {
        let n = self.participants.len() as Gold;
        self.corrected_net
            .saturating_sub(self.equal_share.saturating_mul(n))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
