//! Core engine: parse, value, split and plan one settlement run.
//!
//! A run is self-contained: it takes the roster, the loot submissions
//! and a market collaborator, and returns an immutable
//! `SettlementResult`. Nothing is shared between runs, so concurrent
//! runs against the same collaborator are safe. Dropping the future
//! mid-run discards all partial valuations.

pub mod planner;
pub mod settlement;
pub mod valuation;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ValuationConfig;
use crate::error::SettlementError;
use crate::gold::checked_sum;
use crate::market::{best_npc_offer, MarketData};
use crate::parser::{normalize_item_name, parse_loot_log, parse_roster};
use crate::types::{
    Gold, ItemId, LootLine, LootSubmission, MarketQuote, NpcOffer, RosterEntry, SettlementResult,
};

use planner::plan_participant;
use settlement::{compute_split, Holding};
use valuation::{currency_value, ValuationResolver};

/// Market summary for a single item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceReport {
    pub item_name: String,
    pub item_id: Option<ItemId>,
    /// Set for coins, which have a fixed value and no market.
    pub fixed_value: Option<Gold>,
    pub quote: Option<MarketQuote>,
    pub best_npc: Option<NpcOffer>,
    pub as_of: DateTime<Utc>,
}

/// Runs settlements against one market collaborator.
#[derive(Clone)]
pub struct Settler {
    market: Arc<dyn MarketData>,
    cfg: ValuationConfig,
}

impl Settler {
    pub fn new(market: Arc<dyn MarketData>, cfg: ValuationConfig) -> Self {
        Self { market, cfg }
    }

    /// Parse raw pastes and settle. `loot_logs` pairs a participant name
    /// with that participant's loot log text.
    pub async fn settle_text(
        &self,
        roster_text: &str,
        loot_logs: &[(String, String)],
    ) -> Result<SettlementResult, SettlementError> {
        self.settle_text_with_overrides(roster_text, loot_logs, &[]).await
    }

    /// Like [`Settler::settle_text`], replacing the logged Supplies value
    /// of the named participants before settling.
    pub async fn settle_text_with_overrides(
        &self,
        roster_text: &str,
        loot_logs: &[(String, String)],
        supplies: &[(String, Gold)],
    ) -> Result<SettlementResult, SettlementError> {
        let mut roster = parse_roster(roster_text);
        apply_supply_overrides(&mut roster, supplies);
        let submissions: Vec<LootSubmission> = loot_logs
            .iter()
            .map(|(participant, text)| LootSubmission {
                participant: participant.clone(),
                lines: parse_loot_log(text),
            })
            .collect();
        self.settle(&roster, &submissions).await
    }

    /// Settle a parsed roster against parsed loot submissions.
    ///
    /// Every roster participant needs a submission, even an empty one.
    /// A later submission for the same participant replaces an earlier one.
    pub async fn settle(
        &self,
        roster: &[RosterEntry],
        submissions: &[LootSubmission],
    ) -> Result<SettlementResult, SettlementError> {
        if roster.is_empty() {
            return Err(SettlementError::EmptyRoster);
        }

        let mut by_name: HashMap<String, &LootSubmission> = HashMap::new();
        for sub in submissions {
            let key = sub.participant.trim().to_lowercase();
            if by_name.insert(key, sub).is_some() {
                warn!(participant = %sub.participant, "Loot submission replaced by a later paste");
            }
        }

        let missing: Vec<String> = roster
            .iter()
            .filter(|p| !by_name.contains_key(&p.name.to_lowercase()))
            .map(|p| p.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(SettlementError::MissingLootSubmission { missing });
        }

        let roster_keys: HashSet<String> = roster.iter().map(|p| p.name.to_lowercase()).collect();
        for sub in submissions {
            if !roster_keys.contains(&sub.participant.trim().to_lowercase()) {
                warn!(participant = %sub.participant, "Loot submission for someone not on the roster, ignored");
            }
        }

        info!(participants = roster.len(), "Starting settlement run");

        // Sum duplicate items per participant, keeping first-seen order.
        let loot: Vec<Vec<LootLine>> = roster
            .iter()
            .map(|p| aggregate_lines(&by_name[&p.name.to_lowercase()].lines))
            .collect();

        let mut seen = HashSet::new();
        let distinct: Vec<String> = loot
            .iter()
            .flatten()
            .filter(|l| seen.insert(l.item_name.clone()))
            .map(|l| l.item_name.clone())
            .collect();

        let resolver = ValuationResolver::new(self.market.as_ref(), &self.cfg);
        let book = resolver.resolve(&distinct).await?;

        let mut holdings = Vec::with_capacity(roster.len());
        let mut plans = Vec::with_capacity(roster.len());
        for (entry, lines) in roster.iter().zip(&loot) {
            let valuations = lines
                .iter()
                .map(|l| book.value_line(l))
                .collect::<Result<Vec<_>, _>>()?;
            let held_loot_value = checked_sum(valuations.iter().map(|v| v.chosen_total))
                .ok_or_else(|| SettlementError::AmountOverflow(format!("loot held by {}", entry.name)))?;
            holdings.push(Holding {
                name: entry.name.clone(),
                supplies_cost: entry.supplies_cost,
                held_loot_value,
            });
            plans.push(plan_participant(&entry.name, &valuations));
        }

        let split = compute_split(&holdings)?;

        info!(
            total_held_loot = split.total_held_loot,
            total_supplies = split.total_supplies,
            corrected_net = split.corrected_net,
            equal_share = split.equal_share,
            transfers = split.transfers.len(),
            unmatched = book.unmatched.len(),
            "Settlement complete"
        );

        Ok(SettlementResult {
            as_of: book.as_of,
            total_held_loot: split.total_held_loot,
            total_supplies: split.total_supplies,
            corrected_net: split.corrected_net,
            equal_share: split.equal_share,
            participants: split.participants,
            transfers: split.transfers,
            sell_instructions: plans,
            unmatched_item_names: book.unmatched,
            degraded: book.degraded,
        })
    }

    /// Look up current market and vendor prices for one item name.
    pub async fn price_lookup(&self, raw_name: &str) -> Result<PriceReport, SettlementError> {
        let item_name = normalize_item_name(raw_name);

        if let Some(value) = currency_value(&item_name) {
            return Ok(PriceReport {
                item_name,
                item_id: None,
                fixed_value: Some(value),
                quote: None,
                best_npc: None,
                as_of: Utc::now(),
            });
        }

        let resolver = ValuationResolver::new(self.market.as_ref(), &self.cfg);
        let id = resolver
            .resolve_identity(&item_name)
            .await?
            .ok_or_else(|| SettlementError::UnknownItem(item_name.clone()))?;

        let unavailable = |e: anyhow::Error| SettlementError::MarketUnavailable(format!("{e:#}"));
        let snapshot = self.market.market_snapshot(&[id]).await.map_err(unavailable)?;
        let offers = self.market.npc_buy_offers(id).await.map_err(unavailable)?;

        Ok(PriceReport {
            item_name,
            item_id: Some(id),
            fixed_value: None,
            quote: snapshot.quote(id).cloned(),
            best_npc: best_npc_offer(&offers).cloned(),
            as_of: snapshot.as_of.unwrap_or_else(Utc::now),
        })
    }
}

/// Replace roster Supplies values by case-insensitive name. Overrides for
/// names not on the roster are ignored.
pub fn apply_supply_overrides(roster: &mut [RosterEntry], supplies: &[(String, Gold)]) {
    for (name, amount) in supplies {
        let key = name.trim().to_lowercase();
        match roster.iter_mut().find(|p| p.name.to_lowercase() == key) {
            Some(entry) => {
                info!(participant = %entry.name, logged = entry.supplies_cost, amount, "Supplies overridden");
                entry.supplies_cost = *amount;
            }
            None => warn!(participant = %name, "Supplies override for someone not on the roster, ignored"),
        }
    }
}

/// Merge lines naming the same item. Quantities saturate, so an absurd
/// total still fails valuation instead of wrapping.
pub fn aggregate_lines(lines: &[LootLine]) -> Vec<LootLine> {
    let mut out: Vec<LootLine> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for line in lines {
        match index.get(line.item_name.as_str()) {
            Some(&i) => out[i].quantity = out[i].quantity.saturating_add(line.quantity),
            None => {
                index.insert(line.item_name.as_str(), out.len());
                out.push(line.clone());
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
