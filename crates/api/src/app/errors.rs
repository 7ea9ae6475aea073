use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

use ledgerd_core::LedgerError;

/// Where an error surfaced; decides the status of `AccountNotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorContext {
    /// Direct lookups (`GET /accounts/:id`).
    Lookup,
    /// Withdraw, deposit, transfer and account creation.
    Operation,
}

pub fn ok<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, axum::Json(json!({ "success": true, "data": data }))).into_response()
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "error": {
                "code": code,
                "message": message.into(),
            },
        })),
    )
        .into_response()
}

pub fn error_code(err: &LedgerError) -> &'static str {
    match err {
        LedgerError::InvalidRequest(_) => "INVALID_REQUEST",
        LedgerError::InvalidAmount(_) => "INVALID_AMOUNT",
        LedgerError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
        LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
        LedgerError::Timeout(_) => "LOCK_TIMEOUT",
        LedgerError::Internal(_) => "INTERNAL_SERVER_ERROR",
    }
}

pub fn ledger_error_to_response(err: LedgerError, context: ErrorContext) -> Response {
    let status = match (&err, context) {
        (LedgerError::AccountNotFound(_), ErrorContext::Lookup) => StatusCode::NOT_FOUND,
        (LedgerError::Timeout(_), _) => StatusCode::SERVICE_UNAVAILABLE,
        (LedgerError::Internal(_), _) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };

    match &err {
        LedgerError::Internal(detail) => {
            tracing::error!(error = %detail, "unhandled ledger error");
            json_error(status, error_code(&err), "An unexpected error occurred")
        }
        LedgerError::Timeout(detail) => {
            tracing::warn!(error = %detail, "lock wait timed out");
            json_error(status, error_code(&err), "Account is busy, try again")
        }
        LedgerError::AccountNotFound(_) => unknown_account(context),
        _ => json_error(status, error_code(&err), err.to_string()),
    }
}

/// Malformed or unreadable JSON body.
pub fn rejection_to_response(rejection: JsonRejection) -> Response {
    json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", rejection.body_text())
}

/// A path or body id that cannot name an account.
pub fn unknown_account(context: ErrorContext) -> Response {
    let status = match context {
        ErrorContext::Lookup => StatusCode::NOT_FOUND,
        ErrorContext::Operation => StatusCode::BAD_REQUEST,
    };
    json_error(status, "ACCOUNT_NOT_FOUND", "Account not found")
}

/// Body for requests that matched no route.
pub fn not_found() -> Response {
    (StatusCode::NOT_FOUND, axum::Json(json!({ "error": "Not found" }))).into_response()
}

/// Body for a handler that panicked.
pub fn internal_server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}
