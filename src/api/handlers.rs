use crate::api::AppState;
use crate::api::error::{ApiError, RefreshError};
use crate::core::RateReading;
use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Html;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

const INDEX_PAGE: &str = include_str!("../../templates/index.html");

const DEFAULT_HISTORY_LIMIT: u32 = 30;
const MAX_HISTORY_LIMIT: u32 = 500;

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<u32>,
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Fetches the current rate from the source and appends it to the store.
pub async fn refresh_rate(
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>, RefreshError> {
    let rate = state
        .source
        .fetch_rate()
        .await
        .ok_or(RefreshError(ApiError::RateUnavailable))?;

    state.store.insert(rate).await?;
    info!(%rate, "Stored refreshed rate");

    Ok(Json(RefreshResponse { rate, ok: true }))
}

pub async fn latest_rate(State(state): State<AppState>) -> Result<Json<RateReading>, ApiError> {
    let reading = state
        .store
        .latest()
        .await?
        .ok_or_else(|| ApiError::NotFound("No rate available".to_string()))?;
    Ok(Json(reading))
}

pub async fn rate_history(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<RateReading>>, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::BadRequest(format!("Invalid query: {e}")))?;
    let limit = q
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    Ok(Json(state.store.recent(limit).await?))
}
