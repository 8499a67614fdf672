//! Settlement calculator — equal profit split with supply reimbursement.
//!
//! Every participant is reimbursed their supplies and receives an equal
//! share of the net profit (rounded down). Whoever holds more loot than
//! that owes the difference; whoever holds less is owed it. Debts are
//! cleared by a greedy two-pointer match over payers and receivers in
//! roster order, which keeps the output deterministic and needs at most
//! `payers + receivers − 1` transfers.

use tracing::debug;

use crate::error::SettlementError;
use crate::gold::checked_sum;
use crate::types::{Gold, Participant, Transfer};

/// A participant's inputs to the split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holding {
    pub name: String,
    pub supplies_cost: Gold,
    pub held_loot_value: Gold,
}

/// Totals, per-participant rows and transfers for one split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub total_held_loot: Gold,
    pub total_supplies: Gold,
    pub corrected_net: Gold,
    pub equal_share: Gold,
    pub participants: Vec<Participant>,
    pub transfers: Vec<Transfer>,
}

/// Compute the equal split for `holdings` (roster order).
pub fn compute_split(holdings: &[Holding]) -> Result<Split, SettlementError> {
    if holdings.is_empty() {
        return Err(SettlementError::EmptyRoster);
    }
    let n = holdings.len() as Gold;
    let overflow = |what: &str| SettlementError::AmountOverflow(what.to_string());

    let total_held_loot =
        checked_sum(holdings.iter().map(|h| h.held_loot_value)).ok_or_else(|| overflow("total loot"))?;
    let total_supplies =
        checked_sum(holdings.iter().map(|h| h.supplies_cost)).ok_or_else(|| overflow("total supplies"))?;
    let corrected_net = total_held_loot
        .checked_sub(total_supplies)
        .ok_or_else(|| overflow("net profit"))?;
    // floor, not truncation: a loss of 1490 over 2 is −745 each
    let equal_share = corrected_net.div_euclid(n);

    let participants = holdings
        .iter()
        .map(|h| {
            let fair_payout = h
                .supplies_cost
                .checked_add(equal_share)
                .ok_or_else(|| overflow(&h.name))?;
            let delta = h
                .held_loot_value
                .checked_sub(fair_payout)
                .ok_or_else(|| overflow(&h.name))?;
            Ok::<_, SettlementError>(Participant {
                name: h.name.clone(),
                supplies_cost: h.supplies_cost,
                held_loot_value: h.held_loot_value,
                fair_payout,
                delta,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let transfers = clearing_transfers(&participants);

    debug!(
        participants = participants.len(),
        corrected_net,
        equal_share,
        transfers = transfers.len(),
        "Split computed"
    );

    Ok(Split {
        total_held_loot,
        total_supplies,
        corrected_net,
        equal_share,
        participants,
        transfers,
    })
}

/// Match payers (delta > 0) to receivers (delta < 0), both in roster order.
pub fn clearing_transfers(participants: &[Participant]) -> Vec<Transfer> {
    let mut payers: Vec<(&str, u64)> = participants
        .iter()
        .filter(|p| p.delta > 0)
        .map(|p| (p.name.as_str(), p.delta.unsigned_abs()))
        .collect();
    let mut receivers: Vec<(&str, u64)> = participants
        .iter()
        .filter(|p| p.delta < 0)
        .map(|p| (p.name.as_str(), p.delta.unsigned_abs()))
        .collect();

    let mut transfers = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < payers.len() && j < receivers.len() {
        // never above a payer's delta, so it fits back into Gold
        let amount = payers[i].1.min(receivers[j].1);
        transfers.push(Transfer {
            from: payers[i].0.to_string(),
            to: receivers[j].0.to_string(),
            amount: amount as Gold,
        });
        payers[i].1 -= amount;
        receivers[j].1 -= amount;
        if payers[i].1 == 0 {
            i += 1;
        }
        if receivers[j].1 == 0 {
            j += 1;
        }
    }

    transfers
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
