use axum::Router;

pub mod accounts;
pub mod system;

/// Router for the ledger endpoints.
pub fn router() -> Router {
    Router::new().nest("/accounts", accounts::router())
}
