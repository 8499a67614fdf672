//! Liquidation planner.
//!
//! Turns a participant's valued loot into sell lists: what to dump into
//! market buy offers, what to take to a vendor, and what nobody could
//! price. Coins are never listed.

use crate::types::{ItemValuation, ParticipantPlan, Route, SellInstruction, UnmatchedLine};

impl From<&ItemValuation> for SellInstruction {
    fn from(v: &ItemValuation) -> Self {
        SellInstruction {
            item_name: v.item_name.clone(),
            quantity: v.quantity,
            item_id: v.item_id,
            npc_unit_price: v.npc_unit_price,
            npc_total: v.npc_total,
            market_total: v.market_total,
            chosen_total: v.chosen_total,
            used_levels: v.used_levels.clone(),
            best_vendor: v.best_vendor.clone(),
            quote: v.quote.clone(),
        }
    }
}

/// Bucket one participant's valuations by sell venue, largest first.
pub fn plan_participant(name: &str, valuations: &[ItemValuation]) -> ParticipantPlan {
    let mut plan = ParticipantPlan {
        name: name.to_string(),
        ..ParticipantPlan::default()
    };

    for v in valuations {
        match v.route {
            Route::Market => plan.market.push(v.into()),
            Route::Npc => plan.npc.push(v.into()),
            Route::Unmatched => plan.unmatched.push(UnmatchedLine {
                item_name: v.item_name.clone(),
                quantity: v.quantity,
            }),
            Route::Currency => {}
        }
    }

    // stable: equal totals keep loot order
    plan.market.sort_by(|a, b| b.chosen_total.cmp(&a.chosen_total));
    plan.npc.sort_by(|a, b| b.chosen_total.cmp(&a.chosen_total));
    plan
}
