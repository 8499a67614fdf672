//! Gold amount parsing and compact formatting.
//!
//! Players write amounts as `12k`, `1.5kk`, `3m` or `1,250`. The same
//! shorthand is used when rendering reports.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::Gold;

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+(?:\.\d+)?)(k|kk|m|b)?$").expect("valid amount regex"))
}

/// Parse a gold amount. Returns `None` for anything that isn't a plain or
/// suffixed non-negative number.
pub fn parse_gold(input: &str) -> Option<Gold> {
    let cleaned = input.trim().to_lowercase().replace(',', "");
    let caps = amount_re().captures(&cleaned)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str()) {
        Some("k") => 1e3,
        Some("kk") | Some("m") => 1e6,
        Some("b") => 1e9,
        _ => 1.0,
    };
    let amount = (value * multiplier).round();
    if amount >= Gold::MAX as f64 {
        return None;
    }
    Some(amount as Gold)
}

/// Render an amount compactly: `1.50kk`, `12.00k`, `999`.
pub fn format_gold(amount: Gold) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs() as f64;
    if abs >= 1e9 {
        format!("{sign}{:.2}b", abs / 1e9)
    } else if abs >= 1e6 {
        format!("{sign}{:.2}kk", abs / 1e6)
    } else if abs >= 1e3 {
        format!("{sign}{:.2}k", abs / 1e3)
    } else {
        format!("{sign}{}", amount.unsigned_abs())
    }
}

/// `unit × quantity`, or `None` if it does not fit in a gold amount.
pub fn checked_total(unit: Gold, quantity: u64) -> Option<Gold> {
    Gold::try_from(quantity).ok().and_then(|q| unit.checked_mul(q))
}

/// Sum of gold amounts, or `None` on overflow.
pub fn checked_sum<I: IntoIterator<Item = Gold>>(amounts: I) -> Option<Gold> {
    amounts.into_iter().try_fold(0, |acc: Gold, g| acc.checked_add(g))
}

/// Render an amount with thousands separators: `-1,490`.
pub fn format_grouped(amount: Gold) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
