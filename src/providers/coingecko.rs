//! CoinGecko simple-price adapter for crypto assets.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::cache::Cache;
use crate::core::connector::{Connector, MarketDataConnector};
use crate::core::error::{PriceError, Result};
use crate::core::model::{CurrencyCode, MarketData, normalize_symbol};
use crate::store::memory::MemoryCache;

pub const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// How long a successful upstream response is reused.
pub const RESPONSE_TTL: Duration = Duration::from_secs(5 * 60);

/// Tickers whose CoinGecko id is not simply the lower-cased ticker.
const COIN_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("USDT", "tether"),
    ("BNB", "binancecoin"),
    ("SOL", "solana"),
    ("XRP", "ripple"),
    ("USDC", "usd-coin"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
];

/// Maps a ticker to its CoinGecko id. Unmapped tickers are lower-cased and
/// used as the id, which misses coins whose id differs from the ticker.
pub fn coin_id(symbol: &str) -> String {
    let symbol = normalize_symbol(symbol);
    COIN_IDS
        .iter()
        .find(|(ticker, _)| *ticker == symbol)
        .map(|(_, id)| id.to_string())
        .unwrap_or_else(|| symbol.to_lowercase())
}

type SimplePrice = HashMap<String, HashMap<String, f64>>;

pub struct CoinGeckoProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    responses: MemoryCache<String, SimplePrice>,
}

impl CoinGeckoProvider {
    pub fn new(base_url: &str, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("quotevault/0.1")
            .build()?;
        Ok(CoinGeckoProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client,
            responses: MemoryCache::new(),
        })
    }

    fn get(&self, url: reqwest::Url) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn simple_price(&self, id: &str, vs_currency: &str) -> Result<SimplePrice> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/api/v3/simple/price", self.base_url),
            &[("ids", id), ("vs_currencies", vs_currency)],
        )
        .map_err(|e| PriceError::ProviderUnavailable(format!("Invalid CoinGecko URL: {e}")))?;

        let cache_key = url.to_string();
        if let Some(cached) = self.responses.get(&cache_key).await {
            return Ok(cached);
        }

        debug!("Requesting price data from {}", url);
        let response = self.get(url).send().await.map_err(|e| {
            PriceError::ProviderUnavailable(format!("Request error: {e} for coin: {id}"))
        })?;

        if !response.status().is_success() {
            return Err(PriceError::ProviderUnavailable(format!(
                "HTTP error: {} for coin: {}",
                response.status(),
                id
            )));
        }

        let text = response.text().await.map_err(|e| {
            PriceError::ProviderUnavailable(format!("Failed to read response for {id}: {e}"))
        })?;
        let prices: SimplePrice = serde_json::from_str(&text).map_err(|e| {
            PriceError::MalformedUpstreamResponse(format!(
                "Failed to parse CoinGecko response for {id}: {e}"
            ))
        })?;

        // Answers without the requested pair are not reused, so unknown ids
        // cannot pile up in the cache.
        if prices
            .get(id)
            .is_some_and(|by_currency| by_currency.contains_key(vs_currency))
        {
            self.responses
                .put(cache_key, prices.clone(), Some(RESPONSE_TTL))
                .await;
        }
        Ok(prices)
    }
}

#[async_trait]
impl Connector for CoinGeckoProvider {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn test_connection(&self) -> bool {
        let Ok(url) = reqwest::Url::parse(&format!("{}/api/v3/ping", self.base_url)) else {
            return false;
        };
        match self.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("CoinGecko ping failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl MarketDataConnector for CoinGeckoProvider {
    #[instrument(name = "CoinGeckoPriceFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_price(&self, symbol: &str, currency: &CurrencyCode) -> Result<MarketData> {
        let id = coin_id(symbol);
        let vs_currency = currency.to_lowercase();
        let prices = self.simple_price(&id, &vs_currency).await?;

        let price = prices
            .get(&id)
            .ok_or_else(|| PriceError::SymbolNotFound(format!("Unknown coin id: {id}")))?
            .get(&vs_currency)
            .ok_or_else(|| {
                PriceError::SymbolNotFound(format!("No {vs_currency} price for coin id: {id}"))
            })?;
        let price = Decimal::try_from(*price).map_err(|e| {
            PriceError::MalformedUpstreamResponse(format!("Price {price} for {id}: {e}"))
        })?;

        Ok(MarketData::new(
            &normalize_symbol(symbol),
            price,
            currency.clone(),
            Utc::now(),
        ))
    }
}
