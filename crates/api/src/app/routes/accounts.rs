use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};

use ledgerd_core::LedgerError;

use crate::app::dto::{self, MovementResponse, TransferResponse};
use crate::app::errors::{self, ErrorContext};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_account).get(list_accounts))
        .route("/transfer", post(transfer))
        .route("/:id", get(get_account))
        .route("/:id/withdraw", post(withdraw))
        .route("/:id/deposit", post(deposit))
}

fn operation_error(err: LedgerError) -> Response {
    errors::ledger_error_to_response(err, ErrorContext::Operation)
}

pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateAccountRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };

    let initial_balance = match dto::decimal_field(body.initial_balance.as_deref()) {
        Ok(v) => v,
        Err(e) => return operation_error(e),
    };

    let name = body.name.as_deref().unwrap_or_default();
    match services.directory.create_account(name, initial_balance).await {
        Ok(account) => errors::ok(StatusCode::CREATED, account),
        Err(e) => operation_error(e),
    }
}

pub async fn list_accounts(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.directory.list_accounts().await {
        Ok(accounts) => errors::ok(StatusCode::OK, accounts),
        Err(e) => operation_error(e),
    }
}

pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    let Some(id) = dto::parse_account_id(&id) else {
        return errors::unknown_account(ErrorContext::Lookup);
    };

    match services.directory.get_account(id).await {
        Ok(account) => errors::ok(StatusCode::OK, account),
        Err(e) => errors::ledger_error_to_response(e, ErrorContext::Lookup),
    }
}

pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::TransferRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };

    let (Some(from), Some(to), Some(amount)) =
        (dto::present(body.from), dto::present(body.to), body.amount)
    else {
        return operation_error(LedgerError::invalid_request(
            "from, to, and amount are required",
        ));
    };

    let amount = match dto::positive_amount(Some(&*amount)) {
        Ok(v) => v,
        Err(e) => return operation_error(e),
    };

    let (Some(from), Some(to)) = (dto::parse_account_id(&from), dto::parse_account_id(&to)) else {
        return errors::unknown_account(ErrorContext::Operation);
    };

    match services
        .engine
        .transfer(from, to, amount, body.description)
        .await
    {
        Ok(t) => errors::ok(StatusCode::OK, TransferResponse::from(t)),
        Err(e) => operation_error(e),
    }
}

pub async fn withdraw(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::AmountRequest>, JsonRejection>,
) -> Response {
    let (id, amount) = match movement_input(&id, body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.withdraw(id, amount).await {
        Ok(m) => errors::ok(StatusCode::OK, MovementResponse::from(m)),
        Err(e) => operation_error(e),
    }
}

pub async fn deposit(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::AmountRequest>, JsonRejection>,
) -> Response {
    let (id, amount) = match movement_input(&id, body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.deposit(id, amount).await {
        Ok(m) => errors::ok(StatusCode::OK, MovementResponse::from(m)),
        Err(e) => operation_error(e),
    }
}

/// Shared validation for withdraw/deposit: body first, then the path id.
fn movement_input(
    raw_id: &str,
    body: Result<Json<dto::AmountRequest>, JsonRejection>,
) -> Result<(ledgerd_core::AccountId, rust_decimal::Decimal), Response> {
    let Json(body) = body.map_err(errors::rejection_to_response)?;
    let amount = dto::positive_amount(body.amount.as_deref()).map_err(operation_error)?;
    let id = dto::parse_account_id(raw_id)
        .ok_or_else(|| errors::unknown_account(ErrorContext::Operation))?;
    Ok((id, amount))
}
