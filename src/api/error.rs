use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::SettlementError;

/// API-layer error type
#[derive(Debug)]
pub enum ApiError {
    /// 400 - Malformed request body
    BadRequest(String),

    /// 422 - Well-formed input that cannot be settled
    Unprocessable(String),

    /// 404 - Unknown item
    NotFound(String),

    /// 502 - Market service failed
    BadGateway(String),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "market_unavailable", msg),
        };

        let body = ErrorBody {
            error: error_type.into(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        let msg = err.to_string();
        match err {
            SettlementError::EmptyRoster
            | SettlementError::MissingLootSubmission { .. }
            | SettlementError::AmountOverflow(_) => ApiError::Unprocessable(msg),
            SettlementError::UnknownItem(_) => ApiError::NotFound(msg),
            SettlementError::MarketUnavailable(_) => ApiError::BadGateway(msg),
        }
    }
}
