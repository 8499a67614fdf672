//! Per-participant loot log parser.
//!
//! The normal paste has a `Looted Items:` line followed by one
//! `<n>x <item>` per line. Chat clients sometimes collapse the paste onto
//! a single line, so when no item lines follow the marker the text after
//! it (or the whole text, if there is no marker) is tokenized instead.

use std::sync::OnceLock;

use regex::Regex;

use super::{classify, normalize_item_name, split_lines, LogLine};
use crate::types::LootLine;

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(\d+)\s*x\s+").expect("valid token regex"))
}

fn inline_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)looted items\s*:").expect("valid marker regex"))
}

fn none_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^none\b").expect("valid none regex"))
}

/// Parse one participant's loot log into item lines.
///
/// Duplicate items are returned as-is; callers aggregate them.
pub fn parse_loot_log(text: &str) -> Vec<LootLine> {
    let lines = split_lines(text);
    let marker = lines
        .iter()
        .enumerate()
        .find_map(|(i, l)| match classify(l) {
            LogLine::LootMarker { rest } => Some((i, rest)),
            _ => None,
        });

    match marker {
        Some((idx, rest)) => {
            let mut items = parse_item_lines(&lines[idx + 1..]);
            if items.is_empty() && !rest.is_empty() {
                items = parse_collapsed(&rest);
            }
            items
        }
        None => parse_collapsed(after_marker(text)),
    }
}

/// Multi-line form: every non-blank line after the marker.
fn parse_item_lines(lines: &[String]) -> Vec<LootLine> {
    lines
        .iter()
        .filter_map(|line| match classify(line) {
            LogLine::Item { quantity, name } if quantity > 0 && !name.is_empty() => {
                Some(LootLine::new(name, quantity))
            }
            _ => None,
        })
        .collect()
}

/// Everything after a `Looted Items:` marker found mid-line, or the whole text.
fn after_marker(text: &str) -> &str {
    match inline_marker_re().find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

/// Collapsed form: `9x a gold coin 2x an orc tooth ...` on one line.
///
/// Each description runs up to the next `<n>x` token, so multi-word names
/// are captured whole.
fn parse_collapsed(text: &str) -> Vec<LootLine> {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if none_re().is_match(flat.trim()) {
        return Vec::new();
    }

    let tokens: Vec<_> = token_re().captures_iter(&flat).collect();
    let mut items = Vec::with_capacity(tokens.len());

    for (k, caps) in tokens.iter().enumerate() {
        let (Some(whole), Some(qty)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = tokens
            .get(k + 1)
            .and_then(|next| next.get(0))
            .map_or(flat.len(), |m| m.start());
        let description = flat[whole.end()..end].trim_end_matches(|c: char| {
            c.is_whitespace() || matches!(c, ',' | ';' | '.')
        });
        let name = normalize_item_name(description);
        match qty.as_str().parse::<u64>() {
            Ok(quantity) if quantity > 0 && !name.is_empty() => {
                items.push(LootLine::new(name, quantity));
            }
            _ => {}
        }
    }

    items
}
