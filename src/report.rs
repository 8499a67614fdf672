//! Plain-text rendering of settlement results and price lookups.

use std::fmt::Write;

use crate::engine::PriceReport;
use crate::gold::{format_gold, format_grouped};
use crate::types::{SellInstruction, SettlementResult};

/// Render a settlement as a human-readable report.
pub fn render_report(result: &SettlementResult) -> String {
    let mut out = String::new();

    match result.as_of {
        Some(at) => {
            let _ = writeln!(out, "Settlement (prices as of {})", at.format("%Y-%m-%d %H:%M UTC"));
        }
        None => out.push_str("Settlement (no market prices used)\n"),
    }
    let _ = writeln!(out, "  Total loot:     {}", format_grouped(result.total_held_loot));
    let _ = writeln!(out, "  Total supplies: {}", format_grouped(result.total_supplies));
    let _ = writeln!(out, "  Net:            {}", format_grouped(result.corrected_net));
    let _ = writeln!(out, "  Share each:     {}", format_grouped(result.equal_share));
    let remainder = result.remainder();
    if remainder > 0 {
        let _ = writeln!(out, "  Undistributed:  {remainder}");
    }

    out.push_str("\nParticipants\n");
    for p in &result.participants {
        let _ = writeln!(
            out,
            "  {:<24} supplies {:>12}  held {:>12}  payout {:>12}  delta {:>12}",
            p.name,
            format_grouped(p.supplies_cost),
            format_grouped(p.held_loot_value),
            format_grouped(p.fair_payout),
            format_grouped(p.delta),
        );
    }

    out.push_str("\nTransfers\n");
    if result.transfers.is_empty() {
        out.push_str("  none\n");
    }
    for t in &result.transfers {
        let _ = writeln!(out, "  {} -> {}: {} ({})", t.from, t.to, format_grouped(t.amount), format_gold(t.amount));
    }

    for plan in &result.sell_instructions {
        if plan.market.is_empty() && plan.npc.is_empty() && plan.unmatched.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{} sells", plan.name);
        if !plan.market.is_empty() {
            out.push_str("  Market:\n");
            for s in &plan.market {
                write_instruction(&mut out, s, s.market_total);
            }
        }
        if !plan.npc.is_empty() {
            out.push_str("  NPC:\n");
            for s in &plan.npc {
                write_instruction(&mut out, s, s.npc_total);
                if let Some(vendor) = &s.best_vendor {
                    let _ = writeln!(out, "        to {vendor}");
                }
            }
        }
        if !plan.unmatched.is_empty() {
            out.push_str("  Price manually:\n");
            for u in &plan.unmatched {
                let _ = writeln!(out, "    {}x {}", u.quantity, u.item_name);
            }
        }
    }

    if !result.degraded.is_empty() {
        out.push_str("\nPartial market data\n");
        for d in &result.degraded {
            let _ = writeln!(out, "  {}: {}", d.item_name, d.reason);
        }
    }

    out
}

fn write_instruction(out: &mut String, s: &SellInstruction, total: i64) {
    let _ = writeln!(out, "    {}x {:<32} {:>10}", s.quantity, s.item_name, format_gold(total));
}

/// Render a single-item price lookup.
pub fn render_price(report: &PriceReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", report.item_name);

    if let Some(value) = report.fixed_value {
        let _ = writeln!(out, "  Fixed value: {} gp", format_grouped(value));
        return out;
    }

    let show = |v: Option<i64>| v.map(|g| format!("{} gp", format_gold(g))).unwrap_or_else(|| "n/a".into());
    let quote = report.quote.clone().unwrap_or_default();
    let _ = writeln!(out, "  Buy offer:  {}", show(quote.buy_offer));
    let _ = writeln!(out, "  Sell offer: {}", show(quote.sell_offer));
    if quote.month_average_buy.is_some() || quote.month_average_sell.is_some() {
        let _ = writeln!(
            out,
            "  30d avg:    buy {} / sell {}",
            show(quote.month_average_buy),
            show(quote.month_average_sell)
        );
    }
    match &report.best_npc {
        Some(npc) => {
            let _ = writeln!(out, "  NPC:        {} gp ({})", format_gold(npc.price), npc.vendor);
        }
        None => {
            let _ = writeln!(out, "  NPC:        n/a");
        }
    }
    let _ = writeln!(out, "  Updated:    {}", report.as_of.to_rfc3339());
    out
}
