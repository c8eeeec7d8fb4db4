//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ledger::{DeductionError, LedgerError};
use serde_json::json;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Request body that could not be read as the expected JSON.
    BadRequest(String),
    /// Ledger operation error.
    Ledger(LedgerError),
    /// Failed deduction, carrying the stock levels the store observed.
    Deduction(DeductionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Ledger(err) => ledger_error_to_response(&err),
            ApiError::Deduction(DeductionError { result, error }) => match error {
                LedgerError::InsufficientStock { .. } => (
                    StatusCode::BAD_REQUEST,
                    json!({
                        "error": "Insufficient stock",
                        "available": result.previous_stock,
                        "requested": result.deducted,
                    }),
                ),
                other => ledger_error_to_response(&other),
            },
        };

        (status, axum::Json(body)).into_response()
    }
}

fn ledger_error_to_response(err: &LedgerError) -> (StatusCode, serde_json::Value) {
    let status = match err {
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::AlreadyExists(_) => StatusCode::CONFLICT,
        LedgerError::InsufficientStock { .. } | LedgerError::InvalidRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        LedgerError::TransientStore(source) => {
            tracing::error!(error = %source, "stock store unavailable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    };

    (status, json!({ "error": err.to_string() }))
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<DeductionError> for ApiError {
    fn from(err: DeductionError) -> Self {
        ApiError::Deduction(err)
    }
}
