//! HTTP edge over the quote, price, news and rate operations.

pub mod error;
mod news;
mod quotes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::core::connector::{Connector, FxConnector, MarketDataConnector};
use crate::core::model::CurrencyCode;
use crate::price_service::PriceService;
use crate::providers::yahoo_finance::YahooQuoteAdapter;
use crate::providers::yahoo_rss::YahooNewsProvider;

/// Everything the handlers share. Built once at start up.
pub struct AppState {
    pub quotes: Arc<YahooQuoteAdapter>,
    pub prices: PriceService,
    pub news: YahooNewsProvider,
    pub fx: Arc<dyn FxConnector>,
    pub crypto: Arc<dyn MarketDataConnector>,
    /// Probed by `/health`.
    pub connectors: Vec<Arc<dyn Connector>>,
    /// Used when a request names no currency.
    pub currency: CurrencyCode,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(quotes::router())
        .merge(news::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{PriceError, Result as PriceResult};
    use crate::core::model::MarketData;
    use crate::providers::quote_client::{
        ClientSurface, Quote, QuoteClient, SearchQuote, SearchResults,
    };
    use crate::store::memory::MemoryPriceStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{TimeDelta, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct StubQuotes;

    #[async_trait]
    impl QuoteClient for StubQuotes {
        async fn quote(&self, symbol: &str) -> anyhow::Result<Quote> {
            if symbol == "FAIL" {
                anyhow::bail!("HTTP error: 503 Service Unavailable for symbol: {symbol}");
            }
            if symbol == "ASML.AS" {
                return Ok(Quote {
                    symbol: symbol.to_string(),
                    short_name: Some("ASML Holding".to_string()),
                    long_name: None,
                    currency: Some("EUR".to_string()),
                    exchange_name: Some("AMS".to_string()),
                    regular_market_price: Some(612.5),
                    regular_market_previous_close: None,
                    regular_market_time: Some(1_760_000_000),
                });
            }
            Ok(Quote {
                symbol: symbol.to_string(),
                short_name: Some("Apple Inc.".to_string()),
                long_name: None,
                currency: Some("USD".to_string()),
                exchange_name: Some("NMS".to_string()),
                regular_market_price: Some(150.5),
                regular_market_previous_close: Some(149.0),
                regular_market_time: Some(1_760_000_000),
            })
        }

        async fn search(&self, query: &str) -> anyhow::Result<SearchResults> {
            Ok(SearchResults {
                quotes: vec![SearchQuote {
                    symbol: query.to_uppercase(),
                    shortname: Some("Apple Inc.".to_string()),
                    longname: None,
                    quote_type: Some("EQUITY".to_string()),
                    exchange: Some("NMS".to_string()),
                    exch_disp: Some("NASDAQ".to_string()),
                }],
            })
        }
    }

    struct StubMarkets;

    #[async_trait]
    impl Connector for StubMarkets {
        fn name(&self) -> &str {
            "stub-markets"
        }

        async fn test_connection(&self) -> bool {
            false
        }
    }

    #[async_trait]
    impl MarketDataConnector for StubMarkets {
        async fn fetch_price(
            &self,
            symbol: &str,
            currency: &CurrencyCode,
        ) -> PriceResult<MarketData> {
            match symbol {
                "BTC" => Ok(MarketData::new(
                    symbol,
                    dec!(42000.5),
                    currency.clone(),
                    Utc::now(),
                )),
                _ => Err(PriceError::SymbolNotFound(format!(
                    "Unknown coin id: {}",
                    symbol.to_lowercase()
                ))),
            }
        }
    }

    #[async_trait]
    impl FxConnector for StubMarkets {
        async fn fetch_rate(
            &self,
            base: &CurrencyCode,
            target: &CurrencyCode,
        ) -> PriceResult<Decimal> {
            if base == target {
                return Ok(Decimal::ONE);
            }
            Ok(dec!(0.5))
        }
    }

    fn test_router() -> Router {
        let quotes = Arc::new(YahooQuoteAdapter::from_surface(ClientSurface {
            instance: Some(Arc::new(StubQuotes)),
            ..Default::default()
        }));
        let markets = Arc::new(StubMarkets);
        let state = AppState {
            quotes: quotes.clone(),
            prices: PriceService::new(
                Arc::new(MemoryPriceStore::new()),
                quotes.clone(),
                TimeDelta::minutes(5),
            ),
            news: YahooNewsProvider::new("http://127.0.0.1:1").unwrap(),
            fx: markets.clone(),
            crypto: markets.clone(),
            connectors: vec![quotes as Arc<dyn Connector>, markets],
            currency: CurrencyCode::new("USD"),
        };
        router(Arc::new(state))
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_quote_route() {
        let app = test_router();
        let (status, body) = get(&app, "/quote?symbol=AAPL").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "AAPL");
        assert_eq!(body["regularMarketPrice"], 150.5);
    }

    #[tokio::test]
    async fn test_quote_failure_shape() {
        let app = test_router();
        let (status, body) = get(&app, "/quote?symbol=FAIL").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({
                "error": "Failed to fetch quote",
                "details": "Symbol: FAIL. Check server logs for details."
            })
        );
    }

    #[tokio::test]
    async fn test_missing_parameter_is_bad_request() {
        let app = test_router();
        let (status, body) = get(&app, "/quote").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing query parameter: symbol");

        let (status, _) = get(&app, "/search?q=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_route() {
        let app = test_router();
        let (status, body) = get(&app, "/search?q=aapl").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["quotes"][0]["symbol"], "AAPL");
        assert_eq!(body["quotes"][0]["quoteType"], "EQUITY");
    }

    #[tokio::test]
    async fn test_price_route_fetches_then_serves_cache() {
        let app = test_router();

        let (status, body) = get(&app, "/price?symbol=aapl").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"symbol": "AAPL", "currency": "USD", "price": 150.5, "status": "fresh"})
        );

        let (_, body) = get(&app, "/price?symbol=AAPL&currency=usd").await;
        assert_eq!(body["status"], "cached");
        assert_eq!(body["price"], 150.5);
    }

    #[tokio::test]
    async fn test_price_route_reports_provider_currency() {
        let app = test_router();

        let (status, body) = get(&app, "/price?symbol=ASML.AS&currency=USD").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"symbol": "ASML.AS", "currency": "EUR", "price": 612.5, "status": "fresh"})
        );

        let (_, body) = get(&app, "/price?symbol=asml.as&currency=USD").await;
        assert_eq!(body["status"], "cached");
        assert_eq!(body["currency"], "EUR");
    }

    #[tokio::test]
    async fn test_price_route_unknown_symbol_is_zero() {
        let app = test_router();
        let (status, body) = get(&app, "/price?symbol=FAIL").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["price"], 0.0);
        assert_eq!(body["status"], "unavailable");
    }

    #[tokio::test]
    async fn test_invalid_currency_is_rejected() {
        let app = test_router();
        let (status, _) = get(&app, "/price?symbol=AAPL&currency=U5D").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_crypto_route() {
        let app = test_router();
        let (status, body) = get(&app, "/crypto/price?symbol=BTC").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["price"], 42000.5);
        assert_eq!(body["currency"], "USD");

        let (status, body) = get(&app, "/crypto/price?symbol=XYZ").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Failed to fetch crypto price");
    }

    #[tokio::test]
    async fn test_fx_route() {
        let app = test_router();
        let (status, body) = get(&app, "/fx?base=usd&target=eur").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"base": "USD", "target": "EUR", "rate": 0.5}));
    }

    #[tokio::test]
    async fn test_news_route_never_fails() {
        let app = test_router();

        let (status, body) = get(&app, "/news").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"news": [], "source": "unavailable"}));

        let (status, body) = get(&app, "/news?symbol=AAPL").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "error");
    }

    #[tokio::test]
    async fn test_health_route() {
        let app = test_router();
        let (status, body) = get(&app, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "ok", "connectors": {"stub-markets": false, "yahoo": true}})
        );
    }
}
