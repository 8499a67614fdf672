//! API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ApiState>`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::ApiError;
use crate::engine::{PriceReport, Settler};
use crate::gold::parse_gold;
use crate::types::SettlementResult;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub settler: Settler,
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SettleRequest {
    /// Raw party log text.
    pub roster: String,
    #[serde(default)]
    pub loot: Vec<LootPaste>,
    /// Supplies corrections, e.g. `{"participant": "Eryn", "amount": "12k"}`.
    #[serde(default)]
    pub supplies: Vec<SupplyOverride>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupplyOverride {
    pub participant: String,
    /// Gold amount in player shorthand (`12k`, `1.5kk`, `3,400`).
    pub amount: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LootPaste {
    pub participant: String,
    /// Raw loot log text for this participant.
    pub log: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/price/:item
pub async fn get_price(
    State(state): State<AppState>,
    Path(item): Path<String>,
) -> Result<Json<PriceReport>, ApiError> {
    let report = state.settler.price_lookup(&item).await?;
    Ok(Json(report))
}

/// POST /api/settle
pub async fn post_settle(
    State(state): State<AppState>,
    body: Result<Json<SettleRequest>, JsonRejection>,
) -> Result<Json<SettlementResult>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let supplies = req
        .supplies
        .into_iter()
        .map(|o| match parse_gold(&o.amount) {
            Some(amount) => Ok((o.participant, amount)),
            None => Err(ApiError::BadRequest(format!(
                "Invalid supplies amount for {}: {:?}",
                o.participant, o.amount
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let logs: Vec<(String, String)> = req
        .loot
        .into_iter()
        .map(|p| (p.participant, p.log))
        .collect();
    let result = state
        .settler
        .settle_text_with_overrides(&req.roster, &logs, &supplies)
        .await?;

    info!(
        participants = result.participants.len(),
        transfers = result.transfers.len(),
        "Settlement served"
    );
    Ok(Json(result))
}
