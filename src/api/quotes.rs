use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::AppState;
use super::error::{ApiError, ApiResult};
use crate::core::model::{CurrencyCode, MarketData, normalize_symbol};
use crate::providers::quote_client::{Quote, SearchResults};

#[derive(Debug, Deserialize)]
struct SymbolQuery {
    symbol: Option<String>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PairQuery {
    base: Option<String>,
    target: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PriceResponse {
    symbol: String,
    currency: CurrencyCode,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct RateResponse {
    base: CurrencyCode,
    target: CurrencyCode,
    #[serde(with = "rust_decimal::serde::float")]
    rate: Decimal,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    connectors: BTreeMap<String, bool>,
}

fn required(value: Option<String>, name: &'static str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::MissingParameter(name))
}

fn currency_or(value: Option<String>, fallback: &CurrencyCode) -> ApiResult<CurrencyCode> {
    match value {
        Some(code) if !code.trim().is_empty() => code
            .parse()
            .map_err(|_| ApiError::InvalidCurrency(code)),
        _ => Ok(fallback.clone()),
    }
}

async fn get_quote(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SymbolQuery>,
) -> ApiResult<Json<Quote>> {
    let symbol = required(params.symbol, "symbol")?;
    let quote = state
        .quotes
        .quote(&symbol)
        .await
        .map_err(|source| ApiError::Quote { symbol, source })?;
    Ok(Json(quote))
}

async fn search_symbols(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<SearchResults>> {
    let query = required(params.q, "q")?;
    let results = state
        .quotes
        .search(&query)
        .await
        .map_err(|source| ApiError::Search { query, source })?;
    Ok(Json(results))
}

async fn get_price(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SymbolQuery>,
) -> ApiResult<Json<PriceResponse>> {
    let symbol = normalize_symbol(&required(params.symbol, "symbol")?);
    let currency = currency_or(params.currency, &state.currency)?;
    let resolution = state
        .prices
        .resolve(&symbol, &currency)
        .await
        .map_err(|source| ApiError::Price {
            symbol: symbol.clone(),
            source,
        })?;

    // The provider or an older cache row may quote in another currency.
    let currency = resolution.currency().cloned().unwrap_or(currency);
    Ok(Json(PriceResponse {
        symbol,
        currency,
        price: resolution.price(),
        status: resolution.status(),
        fetched_at: resolution.fetched_at(),
    }))
}

async fn get_crypto_price(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SymbolQuery>,
) -> ApiResult<Json<MarketData>> {
    let symbol = required(params.symbol, "symbol")?;
    let currency = currency_or(params.currency, &state.currency)?;
    let data = state
        .crypto
        .fetch_price(&symbol, &currency)
        .await
        .map_err(|source| ApiError::Crypto { symbol, source })?;
    Ok(Json(data))
}

async fn get_rate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PairQuery>,
) -> ApiResult<Json<RateResponse>> {
    let base = currency_or(Some(required(params.base, "base")?), &state.currency)?;
    let target = currency_or(Some(required(params.target, "target")?), &state.currency)?;
    let rate = state
        .fx
        .fetch_rate(&base, &target)
        .await
        .map_err(|source| ApiError::Rate {
            pair: format!("{base}/{target}"),
            source,
        })?;
    Ok(Json(RateResponse { base, target, rate }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let results =
        futures::future::join_all(state.connectors.iter().map(|c| c.test_connection())).await;

    Json(HealthResponse {
        status: "ok",
        connectors: state
            .connectors
            .iter()
            .zip(results)
            .map(|(c, up)| (c.name().to_string(), up))
            .collect(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quote", get(get_quote))
        .route("/search", get(search_symbols))
        .route("/price", get(get_price))
        .route("/crypto/price", get(get_crypto_price))
        .route("/fx", get(get_rate))
        .route("/health", get(health))
}
