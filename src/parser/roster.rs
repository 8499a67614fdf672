//! Party roster parser.
//!
//! A roster paste lists each participant as a header line followed by
//! stat lines (`Loot:`, `Supplies:`, `Balance:`, `Damage:`, `Healing:`).
//! Only headers with a `Supplies:` value inside the lookahead window
//! become roster entries; the rest are dropped without error.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::{classify, split_lines, LogLine, StatKind};
use crate::types::RosterEntry;

/// How many lines after a header are searched for its `Supplies:` line.
pub const LOOKAHEAD_LINES: usize = 11;

/// Header words that are stat labels, not participant names.
const RESERVED_NAMES: [&str; 3] = ["loot", "supplies", "balance"];

fn index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\d+\s+").expect("valid index regex"))
}

fn leader_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\(leader\)").expect("valid leader regex"))
}

/// Strip a leading numeric index token and the `(Leader)` marker.
pub fn clean_header_name(header: &str) -> String {
    let without_index = index_re().replace(header, "");
    let without_leader = leader_re().replace_all(&without_index, "");
    without_leader.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a party roster into `[{name, supplies_cost}]`, in paste order.
///
/// Names are unique case-insensitively; the first occurrence wins.
pub fn parse_roster(text: &str) -> Vec<RosterEntry> {
    let lines = split_lines(text);
    let classified: Vec<LogLine> = lines.iter().map(|l| classify(l)).collect();

    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for (i, kind) in classified.iter().enumerate() {
        if kind.is_heading() {
            continue;
        }

        let name = clean_header_name(lines[i].trim());
        if name.is_empty() || RESERVED_NAMES.contains(&name.to_lowercase().as_str()) {
            continue;
        }

        let window_end = (i + 1 + LOOKAHEAD_LINES).min(lines.len());
        let mut supplies = None;
        for next in &classified[i + 1..window_end] {
            // another header starts another participant's block
            if !next.is_heading() {
                break;
            }
            if let LogLine::Stat { kind: StatKind::Supplies, value: Some(v) } = next {
                supplies = Some(*v);
            }
        }

        let Some(supplies_cost) = supplies else {
            debug!(header = %name, "Roster header without Supplies in window, dropped");
            continue;
        };

        if seen.insert(name.to_lowercase()) {
            entries.push(RosterEntry { name, supplies_cost });
        } else {
            debug!(name = %name, "Duplicate roster participant ignored");
        }
    }

    entries
}
