use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::quote_client::{
    ClientConfig, ClientSurface, Quote, QuoteClient, ResolvedClient, SearchResults,
    resolve_client,
};
use crate::core::cache::Cache;
use crate::core::connector::{Connector, FxConnector, MarketDataConnector};
use crate::core::error::{PriceError, Result};
use crate::core::model::{CurrencyCode, MarketData, normalize_symbol};
use crate::store::memory::MemoryCache;

const USER_AGENT: &str = "quotevault/0.1";

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Vec<ChartItem>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: ChartMeta,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: Option<String>,
    currency: Option<String>,
    exchange_name: Option<String>,
    short_name: Option<String>,
    long_name: Option<String>,
    regular_market_price: Option<f64>,
    #[serde(alias = "previousClose")]
    chart_previous_close: Option<f64>,
    regular_market_time: Option<i64>,
}

/// Builds the chart URL with the symbol as one escaped path segment, so
/// characters like `#`, `?` or `/` stay part of the symbol.
fn chart_url(base_url: &str, symbol: &str) -> Result<reqwest::Url> {
    let invalid = |detail: String| {
        PriceError::ProviderUnavailable(format!("Invalid chart URL for {symbol}: {detail}"))
    };
    let mut url = reqwest::Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid(format!("{base_url} cannot be a base")))?
        .pop_if_empty()
        .extend(["v8", "finance", "chart"])
        .push(symbol);
    url.query_pairs_mut()
        .append_pair("interval", "1d")
        .append_pair("range", "1d");
    Ok(url)
}

async fn fetch_chart_meta(
    client: &reqwest::Client,
    base_url: &str,
    symbol: &str,
) -> Result<ChartMeta> {
    let url = chart_url(base_url, symbol)?;
    debug!("Requesting chart data from {}", url);

    let response = client.get(url).send().await.map_err(|e| {
        PriceError::ProviderUnavailable(format!("Request error: {e} for symbol: {symbol}"))
    })?;

    if !response.status().is_success() {
        return Err(PriceError::ProviderUnavailable(format!(
            "HTTP error: {} for symbol: {}",
            response.status(),
            symbol
        )));
    }

    let text = response.text().await.map_err(|e| {
        PriceError::ProviderUnavailable(format!("Failed to read response for {symbol}: {e}"))
    })?;
    let data: ChartResponse = serde_json::from_str(&text).map_err(|e| {
        PriceError::MalformedUpstreamResponse(format!(
            "Failed to parse JSON response for {symbol}: {e}"
        ))
    })?;

    data.chart
        .result
        .into_iter()
        .next()
        .map(|item| item.meta)
        .ok_or_else(|| {
            PriceError::SymbolNotFound(format!("No chart data found for symbol: {symbol}"))
        })
}

/// Yahoo Finance quote and search client over the public chart and search
/// endpoints.
pub struct YahooQuoteClient {
    base_url: String,
    client: reqwest::Client,
    validation_warnings: AtomicBool,
    suppressed_notices: RwLock<HashSet<String>>,
}

impl YahooQuoteClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(YahooQuoteClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            validation_warnings: AtomicBool::new(true),
            suppressed_notices: RwLock::new(HashSet::new()),
        })
    }

    /// The client as a constructor export, ready for probing.
    pub fn surface(base_url: &str) -> ClientSurface {
        let base_url = base_url.to_string();
        ClientSurface {
            constructor: Some(Box::new(move || -> anyhow::Result<Arc<dyn QuoteClient>> {
                Ok(Arc::new(YahooQuoteClient::new(&base_url)?))
            })),
            ..Default::default()
        }
    }

    fn notice(&self, id: &str, message: &str) {
        let suppressed = self
            .suppressed_notices
            .read()
            .map(|set| set.contains(id))
            .unwrap_or(false);
        if suppressed {
            debug!(notice = id, "{}", message);
        } else {
            info!(notice = id, "{}", message);
        }
    }

    fn validation_warning(&self, symbol: &str, field: &str) {
        if self.validation_warnings.load(Ordering::Relaxed) {
            warn!(symbol, field, "Quote response is missing a field");
        } else {
            debug!(symbol, field, "Quote response is missing a field");
        }
    }
}

#[async_trait]
impl QuoteClient for YahooQuoteClient {
    #[instrument(name = "YahooQuote", skip(self), fields(symbol = %symbol))]
    async fn quote(&self, symbol: &str) -> anyhow::Result<Quote> {
        self.notice(
            "anonymous-access",
            "Yahoo Finance is queried without credentials and may rate limit",
        );
        let meta = fetch_chart_meta(&self.client, &self.base_url, symbol)
            .await
            .map_err(|e| anyhow!("{}", e.detail()))?;

        if meta.currency.is_none() {
            self.validation_warning(symbol, "currency");
        }
        if meta.regular_market_price.is_none() {
            self.validation_warning(symbol, "regularMarketPrice");
        }

        Ok(Quote {
            symbol: meta.symbol.unwrap_or_else(|| symbol.to_string()),
            short_name: meta.short_name,
            long_name: meta.long_name,
            currency: meta.currency,
            exchange_name: meta.exchange_name,
            regular_market_price: meta.regular_market_price,
            regular_market_previous_close: meta.chart_previous_close,
            regular_market_time: meta.regular_market_time,
        })
    }

    #[instrument(name = "YahooSearch", skip(self), fields(query = %query))]
    async fn search(&self, query: &str) -> anyhow::Result<SearchResults> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/v1/finance/search", self.base_url),
            &[("q", query), ("quotesCount", "10"), ("newsCount", "0")],
        )?;
        debug!("Requesting search results from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for query: {}", e, query))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for query: {}",
                response.status(),
                query
            ));
        }

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse search response for {}: {}", query, e))
    }

    fn set_global_config(&self, config: &ClientConfig) {
        self.validation_warnings
            .store(config.validation_warnings, Ordering::Relaxed);
    }

    fn suppress_notices(&self, notices: &[&str]) {
        if let Ok(mut set) = self.suppressed_notices.write() {
            set.extend(notices.iter().map(|n| n.to_string()));
        }
    }
}

/// Equity quote adapter: the market data connector the resolution service
/// uses, plus the raw quote and search operations for the HTTP edge.
pub struct YahooQuoteAdapter {
    client: Arc<dyn QuoteClient>,
}

impl YahooQuoteAdapter {
    pub fn new(resolved: ResolvedClient) -> Self {
        YahooQuoteAdapter {
            client: resolved.client,
        }
    }

    pub fn from_surface(surface: ClientSurface) -> Self {
        Self::new(resolve_client(surface))
    }

    pub async fn quote(&self, symbol: &str) -> Result<Quote> {
        self.client
            .quote(symbol)
            .await
            .map_err(|e| PriceError::ProviderUnavailable(e.to_string()))
    }

    pub async fn search(&self, query: &str) -> Result<SearchResults> {
        self.client
            .search(query)
            .await
            .map_err(|e| PriceError::ProviderUnavailable(e.to_string()))
    }
}

#[async_trait]
impl Connector for YahooQuoteAdapter {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn test_connection(&self) -> bool {
        self.client.search("AAPL").await.is_ok()
    }
}

#[async_trait]
impl MarketDataConnector for YahooQuoteAdapter {
    async fn fetch_price(&self, symbol: &str, currency: &CurrencyCode) -> Result<MarketData> {
        let quote = self.quote(symbol).await?;

        let price = quote
            .regular_market_price
            .ok_or_else(|| PriceError::SymbolNotFound(format!("No market price for {symbol}")))?;
        let price = Decimal::try_from(price).map_err(|e| {
            PriceError::MalformedUpstreamResponse(format!("Price {price} for {symbol}: {e}"))
        })?;

        let currency = quote
            .currency
            .as_deref()
            .map(CurrencyCode::new)
            .unwrap_or_else(|| currency.clone());
        let last_updated = quote
            .regular_market_time
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(Utc::now);

        Ok(MarketData::new(
            &normalize_symbol(symbol),
            price,
            currency,
            last_updated,
        ))
    }
}

// YahooFxProvider implementation for FxConnector
pub struct YahooFxProvider {
    base_url: String,
    client: reqwest::Client,
    cache: MemoryCache<String, Decimal>,
    ttl: Duration,
}

impl YahooFxProvider {
    pub fn new(base_url: &str, ttl: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(YahooFxProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            cache: MemoryCache::new(),
            ttl,
        })
    }
}

#[async_trait]
impl Connector for YahooFxProvider {
    fn name(&self) -> &str {
        "yahoo-fx"
    }

    async fn test_connection(&self) -> bool {
        self.fetch_rate(&CurrencyCode::new("USD"), &CurrencyCode::new("EUR"))
            .await
            .is_ok()
    }
}

#[async_trait]
impl FxConnector for YahooFxProvider {
    #[instrument(name = "YahooRateFetch", skip(self), fields(base = %base, target = %target))]
    async fn fetch_rate(&self, base: &CurrencyCode, target: &CurrencyCode) -> Result<Decimal> {
        if base == target {
            return Ok(Decimal::ONE);
        }

        let symbol = format!("{base}{target}=X");
        if let Some(cached) = self.cache.get(&symbol).await {
            return Ok(cached);
        }

        let meta = fetch_chart_meta(&self.client, &self.base_url, &symbol)
            .await
            .map_err(|e| match e {
                PriceError::SymbolNotFound(_) => PriceError::SymbolNotFound(format!(
                    "No rate data found for currency pair: {symbol}"
                )),
                other => other,
            })?;

        let rate = meta.regular_market_price.ok_or_else(|| {
            PriceError::SymbolNotFound(format!("No rate data found for currency pair: {symbol}"))
        })?;
        let rate = Decimal::try_from(rate).map_err(|e| {
            PriceError::MalformedUpstreamResponse(format!("Rate {rate} for {symbol}: {e}"))
        })?;

        self.cache.put(symbol, rate, Some(self.ttl)).await;
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_mock_server(symbol: &str, status: u16, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        let request_path = format!("/v8/finance/chart/{symbol}");

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(status).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn adapter(base_url: &str) -> YahooQuoteAdapter {
        YahooQuoteAdapter::from_surface(YahooQuoteClient::surface(base_url))
    }

    #[tokio::test]
    async fn test_successful_quote() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "symbol": "AAPL",
                        "currency": "USD",
                        "exchangeName": "NMS",
                        "shortName": "Apple Inc.",
                        "regularMarketPrice": 150.5,
                        "chartPreviousClose": 149.0,
                        "regularMarketTime": 1700000000
                    }
                }]
            }
        }"#;

        let mock_server = create_mock_server("AAPL", 200, mock_response).await;
        let quote = adapter(&mock_server.uri()).quote("AAPL").await.unwrap();

        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.short_name.as_deref(), Some("Apple Inc."));
        assert_eq!(quote.regular_market_price, Some(150.5));
        assert_eq!(quote.regular_market_previous_close, Some(149.0));
        assert_eq!(quote.currency.as_deref(), Some("USD"));
    }

    #[tokio::test]
    async fn test_fetch_price_prefers_reported_currency() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "currency": "EUR",
                        "regularMarketPrice": 612.5,
                        "regularMarketTime": 1700000000
                    }
                }]
            }
        }"#;

        let mock_server = create_mock_server("ASML.AS", 200, mock_response).await;
        let data = adapter(&mock_server.uri())
            .fetch_price("ASML.AS", &CurrencyCode::new("USD"))
            .await
            .unwrap();

        assert_eq!(data.symbol(), "ASML.AS");
        assert_eq!(data.price(), dec!(612.5));
        assert_eq!(data.currency().as_str(), "EUR");
        assert_eq!(data.last_updated().timestamp(), 1700000000);
    }

    #[tokio::test]
    async fn test_fetch_price_falls_back_to_requested_currency() {
        let mock_response = r#"{"chart": {"result": [{"meta": {"regularMarketPrice": 10.25}}]}}"#;
        let mock_server = create_mock_server("XYZ", 200, mock_response).await;
        let data = adapter(&mock_server.uri())
            .fetch_price("XYZ", &CurrencyCode::new("eur"))
            .await
            .unwrap();

        assert_eq!(data.currency().as_str(), "EUR");
        assert_eq!(data.price(), dec!(10.25));
    }

    #[tokio::test]
    async fn test_fetch_price_without_market_price() {
        let mock_response = r#"{"chart": {"result": [{"meta": {"currency": "USD"}}]}}"#;
        let mock_server = create_mock_server("DELISTED", 200, mock_response).await;
        let result = adapter(&mock_server.uri())
            .fetch_price("DELISTED", &CurrencyCode::new("USD"))
            .await;

        assert!(matches!(result, Err(PriceError::SymbolNotFound(_))));
    }

    #[tokio::test]
    async fn test_quote_upstream_error_is_provider_unavailable() {
        let mock_server = create_mock_server("AAPL", 500, "").await;
        let result = adapter(&mock_server.uri()).quote("AAPL").await;

        match result {
            Err(PriceError::ProviderUnavailable(message)) => assert_eq!(
                message,
                "HTTP error: 500 Internal Server Error for symbol: AAPL"
            ),
            other => panic!("Expected ProviderUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_chart_url_escapes_symbol() {
        let url = chart_url("http://localhost:8080/", "AAPL#X").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/v8/finance/chart/AAPL%23X?interval=1d&range=1d"
        );

        let url = chart_url("http://localhost:8080/proxy", "USDEUR=X").unwrap();
        assert_eq!(url.path(), "/proxy/v8/finance/chart/USDEUR=X");
        assert_eq!(
            chart_url("http://localhost", "A/B").unwrap().path(),
            "/v8/finance/chart/A%2FB"
        );
    }

    #[tokio::test]
    async fn test_symbol_with_reserved_characters_is_not_truncated() {
        let mock_response = r#"{"chart": {"result": [{"meta": {
            "symbol": "AAPL#X",
            "currency": "USD",
            "regularMarketPrice": 1.25
        }}]}}"#;
        let mock_server = create_mock_server("AAPL%23X", 200, mock_response).await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let quote = adapter(&mock_server.uri()).quote("AAPL#X").await.unwrap();
        assert_eq!(quote.symbol, "AAPL#X");
        assert_eq!(quote.regular_market_price, Some(1.25));
    }

    #[tokio::test]
    async fn test_no_quote_result_data() {
        let mock_server = create_mock_server("INVALID", 200, r#"{"chart": {"result": []}}"#).await;
        let result = adapter(&mock_server.uri()).quote("INVALID").await;

        assert_eq!(
            result.unwrap_err().to_string(),
            "Provider unavailable: No chart data found for symbol: INVALID"
        );
    }

    #[tokio::test]
    async fn test_successful_search() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .and(query_param("q", "apple inc"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{
                    "count": 2,
                    "quotes": [
                        {"symbol": "AAPL", "shortname": "Apple Inc.", "quoteType": "EQUITY", "exchange": "NMS", "exchDisp": "NASDAQ"},
                        {"symbol": "APC.F", "shortname": "Apple Inc.", "quoteType": "EQUITY"}
                    ],
                    "news": []
                }"#,
            ))
            .mount(&mock_server)
            .await;

        let results = adapter(&mock_server.uri())
            .search("apple inc")
            .await
            .unwrap();
        assert_eq!(results.quotes.len(), 2);
        assert_eq!(results.quotes[0].symbol, "AAPL");
        assert_eq!(results.quotes[0].exch_disp.as_deref(), Some("NASDAQ"));
        assert_eq!(results.quotes[1].exchange, None);
    }

    #[tokio::test]
    async fn test_search_malformed_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let err = adapter(&mock_server.uri()).search("x").await.unwrap_err();
        assert!(
            err.to_string()
                .contains("Failed to parse search response for x")
        );
    }

    #[tokio::test]
    async fn test_quote_client_configuration_hooks() {
        let client = YahooQuoteClient::new("http://localhost").unwrap();
        assert!(client.validation_warnings.load(Ordering::Relaxed));

        client.set_global_config(&ClientConfig {
            validation_warnings: false,
        });
        client.suppress_notices(&["anonymous-access"]);

        assert!(!client.validation_warnings.load(Ordering::Relaxed));
        assert!(
            client
                .suppressed_notices
                .read()
                .unwrap()
                .contains("anonymous-access")
        );
    }

    // Tests for YahooFxProvider (FxConnector)
    #[tokio::test]
    async fn test_successful_rate_fetch() {
        let mock_server = MockServer::start().await;
        let provider = YahooFxProvider::new(&mock_server.uri(), Duration::from_secs(300)).unwrap();

        let mock_response = r#"{
            "chart": {
                "result": [
                    {
                        "meta": {
                            "regularMarketPrice": 1.25
                        }
                    }
                ]
            }
        }"#;

        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/USDEUR=X"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .expect(1)
            .mount(&mock_server)
            .await;

        let usd = CurrencyCode::new("USD");
        let eur = CurrencyCode::new("EUR");
        let rate = provider
            .fetch_rate(&usd, &eur)
            .await
            .expect("Failed to get rate");
        assert_eq!(rate, dec!(1.25));

        // Served from the rate cache
        let rate = provider.fetch_rate(&usd, &eur).await.unwrap();
        assert_eq!(rate, dec!(1.25));
    }

    #[tokio::test]
    async fn test_same_currency_rate_is_one() {
        let provider = YahooFxProvider::new("http://localhost:1", Duration::from_secs(1)).unwrap();
        let usd = CurrencyCode::new("USD");
        assert_eq!(provider.fetch_rate(&usd, &usd).await.unwrap(), Decimal::ONE);
    }

    #[tokio::test]
    async fn test_no_currency_rate_found() {
        let mock_server =
            create_mock_server("USDEUR=X", 200, r#"{"chart": {"result": []}}"#).await;
        let provider = YahooFxProvider::new(&mock_server.uri(), Duration::from_secs(1)).unwrap();

        let result = provider
            .fetch_rate(&CurrencyCode::new("USD"), &CurrencyCode::new("EUR"))
            .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "Symbol not found: No rate data found for currency pair: USDEUR=X"
        );
    }

    #[tokio::test]
    async fn test_yahoo_currency_api_error_response() {
        let mock_server = create_mock_server("USDEUR=X", 500, "").await;
        let provider = YahooFxProvider::new(&mock_server.uri(), Duration::from_secs(1)).unwrap();

        let result = provider
            .fetch_rate(&CurrencyCode::new("USD"), &CurrencyCode::new("EUR"))
            .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "Provider unavailable: HTTP error: 500 Internal Server Error for symbol: USDEUR=X"
        );
    }

    #[tokio::test]
    async fn test_yahoo_currency_api_malformed_response() {
        let mock_response = r#"{
            "chart": {
                "results": []
            }
        }"#; // "results" instead of "result"
        let mock_server = create_mock_server("USDEUR=X", 200, mock_response).await;
        let provider = YahooFxProvider::new(&mock_server.uri(), Duration::from_secs(1)).unwrap();

        let result = provider
            .fetch_rate(&CurrencyCode::new("USD"), &CurrencyCode::new("EUR"))
            .await;
        match result {
            Err(PriceError::MalformedUpstreamResponse(message)) => {
                assert!(message.contains("Failed to parse JSON response for USDEUR=X"))
            }
            other => panic!("Expected MalformedUpstreamResponse, got {other:?}"),
        }
    }
}
