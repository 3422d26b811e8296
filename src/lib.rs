pub mod api;
pub mod cli;
pub mod core;
pub mod price_service;
pub mod providers;
pub mod store;

use crate::api::AppState;
use crate::core::config::AppConfig;
use crate::core::connector::Connector;
use crate::core::model::CurrencyCode;
use crate::price_service::PriceService;
use crate::providers::coingecko::CoinGeckoProvider;
use crate::providers::yahoo_finance::{YahooFxProvider, YahooQuoteAdapter, YahooQuoteClient};
use crate::providers::yahoo_rss::YahooNewsProvider;
use anyhow::{Context, Result};
use chrono::TimeDelta;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    Serve,
    Price {
        symbols: Vec<String>,
        currency: Option<String>,
    },
    Search {
        query: String,
    },
    News {
        symbol: String,
    },
    Rate {
        base: String,
        target: String,
    },
}

/// Wires providers, the persisted cache and the resolution service from
/// configuration. The quote client is probed here, once.
pub fn build_state(config: &AppConfig) -> Result<AppState> {
    let currency: CurrencyCode = config
        .currency
        .parse()
        .with_context(|| format!("Invalid default currency: {}", config.currency))?;
    let ttl = TimeDelta::from_std(config.cache.ttl()).context("Cache TTL is out of range")?;

    let quotes = Arc::new(YahooQuoteAdapter::from_surface(YahooQuoteClient::surface(
        &config.providers.yahoo.base_url,
    )));
    let crypto = Arc::new(CoinGeckoProvider::new(
        &config.providers.coingecko.base_url,
        config.providers.coingecko.api_key.clone(),
    )?);
    let fx = Arc::new(YahooFxProvider::new(
        &config.providers.yahoo.base_url,
        config.cache.ttl(),
    )?);
    let news = YahooNewsProvider::new(&config.providers.news.base_url)?;

    let store = store::open_price_store(config);
    let prices = PriceService::new(store, quotes.clone(), ttl);

    let connectors: Vec<Arc<dyn Connector>> = vec![
        quotes.clone() as Arc<dyn Connector>,
        crypto.clone(),
        fx.clone(),
    ];
    Ok(AppState {
        quotes,
        prices,
        news,
        fx,
        crypto,
        connectors,
        currency,
    })
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("quotevault starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(currency = %config.currency, "Loaded config");

    let state = build_state(&config)?;

    match command {
        AppCommand::Serve => api::serve(Arc::new(state), config.server.listen_addr).await,
        AppCommand::Price { symbols, currency } => {
            let currency = match currency {
                Some(code) => code.parse()?,
                None => state.currency.clone(),
            };
            cli::prices::run(&state.prices, &symbols, &currency).await
        }
        AppCommand::Search { query } => cli::lookup::search(&state.quotes, &query).await,
        AppCommand::News { symbol } => cli::lookup::news(&state.news, &symbol).await,
        AppCommand::Rate { base, target } => {
            cli::lookup::rate(state.fx.as_ref(), &base.parse()?, &target.parse()?).await
        }
    }
}
