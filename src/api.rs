//! HTTP surface of the aggregator.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::aggregator::AggregatorService;
use crate::types::{AggregationResult, MarketQuote, TokenSpec};

pub type AppState = Arc<AggregatorService>;

/// Error body returned for rejected requests.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// API error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub detail: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            detail: None,
        }
    }

    pub fn upstream(message: impl Into<String>, detail: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            detail: Some(detail.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
            detail: self.detail,
        });
        (self.status, body).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "API Error {}: {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, Deserialize)]
pub struct MarketsQuery {
    pub ids: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub query: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BalanceRequest {
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "coin_id_list")]
    pub coin_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tokens: Vec<TokenSpec>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MultiBalanceRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub addresses: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "coin_id_list")]
    pub coin_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tokens: Vec<TokenSpec>,
}

/// Create the REST API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/coins/markets", get(coin_markets))
        .route("/api/coins/search", get(coin_search))
        .route("/api/balance", post(balance))
        .route("/api/balance/multi", post(balance_multi))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /api/coins/markets?ids=a,b
async fn coin_markets(
    State(state): State<AppState>,
    Query(query): Query<MarketsQuery>,
) -> Result<Json<Vec<MarketQuote>>, ApiError> {
    let ids: Vec<String> = query
        .ids
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Err(ApiError::bad_request("ids query param required"));
    }
    Ok(Json(state.market().markets(&ids).await))
}

/// GET /api/coins/search?q=...
async fn coin_search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let q = query
        .q
        .or(query.query)
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("q parameter required"))?;

    state.market().search(q.trim()).await.map(Json).map_err(|e| {
        error!("search failed: {}", e);
        ApiError::upstream("search failed", e.to_string())
    })
}

/// POST /api/balance
async fn balance(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AggregationResult>, ApiError> {
    let request: BalanceRequest = parse_body(&body)?;
    let chain = request
        .chain
        .as_deref()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("chain is required"))?;
    let address = request
        .address
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::bad_request("address is required"))?;

    let result = state
        .aggregate(&chain, address, &request.coin_ids, &request.tokens)
        .await;
    Ok(Json(result))
}

/// POST /api/balance/multi
async fn balance_multi(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BTreeMap<String, AggregationResult>>, ApiError> {
    let request: MultiBalanceRequest = parse_body(&body)?;
    if request.addresses.is_empty() {
        return Err(ApiError::bad_request("addresses is required"));
    }

    let results = state
        .aggregate_many(&request.addresses, &request.coin_ids, &request.tokens)
        .await;
    Ok(Json(results))
}

/// `null` reads as the empty value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Coin ids as strings; numbers and other scalars are stringified and
/// `null` entries dropped.
fn coin_id_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Vec<serde_json::Value> = null_as_default(deserializer)?;
    Ok(values
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(id) => Some(id),
            other => Some(other.to_string()),
        })
        .collect())
}

/// Parse a JSON body regardless of content type; an empty body is an empty
/// request.
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError {
        detail: Some(e.to_string()),
        ..ApiError::bad_request("invalid JSON body")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body() {
        let request: BalanceRequest = parse_body(b"").unwrap();
        assert!(request.chain.is_none());

        let request: BalanceRequest =
            parse_body(br#"{"chain": "ethereum", "address": "0xabc", "coin_ids": ["usd-coin"]}"#)
                .unwrap();
        assert_eq!(request.coin_ids, vec!["usd-coin".to_string()]);
        assert!(request.tokens.is_empty());

        let request: BalanceRequest = parse_body(
            br#"{"chain": "ethereum", "address": "0xabc", "coin_ids": null, "tokens": null}"#,
        )
        .unwrap();
        assert!(request.coin_ids.is_empty());
        assert!(request.tokens.is_empty());

        let request: BalanceRequest =
            parse_body(br#"{"coin_ids": ["usd-coin", 1, null, true]}"#).unwrap();
        assert_eq!(request.coin_ids, vec!["usd-coin", "1", "true"]);

        let request: MultiBalanceRequest = parse_body(br#"{"addresses": null}"#).unwrap();
        assert!(request.addresses.is_empty());

        let err = parse_body::<BalanceRequest>(b"{not json").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.detail.is_some());
    }
}
