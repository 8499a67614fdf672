//! Fatal settlement errors.
//!
//! Anything that aborts a run lives here. Recoverable conditions
//! (unmatched items, degraded market lookups) are carried on the
//! `SettlementResult` instead.

use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Error)]
pub enum SettlementError {
    /// The roster parsed to zero participants.
    #[error("No players in party: the roster text produced no participant with a Supplies value")]
    EmptyRoster,

    /// Some roster participants have no loot submission at all.
    #[error(
        "Missing loot paste for: {} (paste even if \"Looted Items: None\")",
        .missing.join(", ")
    )]
    MissingLootSubmission { missing: Vec<String> },

    /// Item identities could not be resolved because the market service failed.
    #[error("Market data unavailable: {0}")]
    MarketUnavailable(String),

    /// A loot quantity or gold total does not fit in a gold amount.
    #[error("Amount too large to settle: {0}")]
    AmountOverflow(String),

    /// Single-item price lookup for a name the market does not know.
    #[error("Unknown item: {0}")]
    UnknownItem(String),
}
