//! Game-log parsing.
//!
//! Both log formats are pasted free text. Every line is first classified
//! into a small tagged variant (`LogLine`); the roster and loot parsers
//! then run short state machines over the classified lines. Parsing is
//! best-effort: malformed lines are skipped, never reported as errors.

pub mod loot;
pub mod roster;

use std::sync::OnceLock;

use regex::Regex;

pub use loot::parse_loot_log;
pub use roster::parse_roster;

/// Statistic lines found under a participant header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Loot,
    Supplies,
    Balance,
    Damage,
    Healing,
    Other,
}

impl StatKind {
    fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "loot" => StatKind::Loot,
            "supplies" => StatKind::Supplies,
            "balance" => StatKind::Balance,
            "damage" => StatKind::Damage,
            "healing" => StatKind::Healing,
            _ => StatKind::Other,
        }
    }
}

/// One classified log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine {
    Blank,
    /// The `Looted Items:` marker; `rest` is whatever followed it on the line.
    LootMarker { rest: String },
    /// `Label: <number>`. `value` is `None` when the number doesn't parse.
    Stat { kind: StatKind, value: Option<i64> },
    /// `<n> x <description>` with the description already normalized.
    Item { quantity: u64, name: String },
    /// Section headings and other colon lines.
    Heading,
    /// Anything else. In a roster this is a participant header candidate.
    Text,
}

impl LogLine {
    /// Lines that can never start (or interrupt) a participant block.
    pub fn is_heading(&self) -> bool {
        matches!(
            self,
            LogLine::Blank | LogLine::LootMarker { .. } | LogLine::Stat { .. } | LogLine::Heading
        )
    }
}

fn stat_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z][A-Za-z ]*?)\s*:\s*([-\d,]+)").expect("valid stat regex")
    })
}

fn item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(\d+)\s*x\s+(.+)$").expect("valid item regex"))
}

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^looted items\s*:(.*)$").expect("valid marker regex"))
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(session data|session|loot type|looted items|killed monsters|damage|healing)|^(market|npc|custom)$",
        )
        .expect("valid heading regex")
    })
}

/// Classify one line of pasted log text.
pub fn classify(line: &str) -> LogLine {
    let t = line.trim();
    if t.is_empty() {
        return LogLine::Blank;
    }
    if let Some(caps) = marker_re().captures(t) {
        return LogLine::LootMarker {
            rest: caps.get(1).map_or("", |m| m.as_str()).trim().to_string(),
        };
    }
    if let Some(caps) = stat_re().captures(t) {
        return LogLine::Stat {
            kind: StatKind::from_label(&caps[1]),
            value: parse_int_grouped(&caps[2]),
        };
    }
    if let Some(caps) = item_re().captures(t) {
        if let Ok(quantity) = caps[1].parse::<u64>() {
            return LogLine::Item {
                quantity,
                name: normalize_item_name(&caps[2]),
            };
        }
    }
    if t.contains(':') || heading_re().is_match(t) {
        return LogLine::Heading;
    }
    LogLine::Text
}

/// Parse `-1,234` style integers. Commas are dropped wherever they appear.
pub fn parse_int_grouped(s: &str) -> Option<i64> {
    s.replace(',', "").trim().parse().ok()
}

/// Lower-case, strip a leading article, collapse internal whitespace.
pub fn normalize_item_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let mut words: Vec<&str> = lowered.split_whitespace().collect();
    if words.len() > 1 && matches!(words[0], "a" | "an") {
        words.remove(0);
    }
    words.join(" ")
}

/// Split pasted text into lines, normalizing CRLF and tabs.
pub(crate) fn split_lines(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split('\n')
        .map(|l| l.replace('\t', "    ").trim_end().to_string())
        .collect()
}
