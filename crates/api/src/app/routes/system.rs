use axum::{response::IntoResponse, Json};
use chrono::{SecondsFormat, Utc};

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

/// Fallback for unmatched routes.
pub async fn not_found() -> axum::response::Response {
    crate::app::errors::not_found()
}
