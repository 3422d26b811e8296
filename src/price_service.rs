//! Cache-first price resolution with stale fallback.

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::core::cache::PriceCacheStore;
use crate::core::connector::MarketDataConnector;
use crate::core::error::Result;
use crate::core::model::{CacheEntry, CurrencyCode, normalize_symbol};

/// How a price was obtained.
///
/// `currency` is the currency the price is quoted in, which may differ from
/// the one requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceResolution {
    /// A cache row that had not expired.
    Cached {
        price: Decimal,
        currency: CurrencyCode,
    },
    /// Fetched from the provider just now and written to the cache.
    Fresh {
        price: Decimal,
        currency: CurrencyCode,
    },
    /// The provider failed; this is the last price ever fetched.
    Stale {
        price: Decimal,
        currency: CurrencyCode,
        fetched_at: DateTime<Utc>,
    },
    /// The provider failed and nothing was ever cached.
    Unavailable,
}

impl PriceResolution {
    /// Zero when no price is known.
    pub fn price(&self) -> Decimal {
        match self {
            PriceResolution::Cached { price, .. }
            | PriceResolution::Fresh { price, .. }
            | PriceResolution::Stale { price, .. } => *price,
            PriceResolution::Unavailable => Decimal::ZERO,
        }
    }

    /// Currency of the served price. `None` when no price is known.
    pub fn currency(&self) -> Option<&CurrencyCode> {
        match self {
            PriceResolution::Cached { currency, .. }
            | PriceResolution::Fresh { currency, .. }
            | PriceResolution::Stale { currency, .. } => Some(currency),
            PriceResolution::Unavailable => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            PriceResolution::Cached { .. } => "cached",
            PriceResolution::Fresh { .. } => "fresh",
            PriceResolution::Stale { .. } => "stale",
            PriceResolution::Unavailable => "unavailable",
        }
    }

    /// When the served price was fetched, if it came from an expired row.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        match self {
            PriceResolution::Stale { fetched_at, .. } => Some(*fetched_at),
            _ => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            PriceResolution::Stale { .. } | PriceResolution::Unavailable
        )
    }
}

pub struct PriceService {
    store: Arc<dyn PriceCacheStore>,
    connector: Arc<dyn MarketDataConnector>,
    ttl: TimeDelta,
}

impl PriceService {
    pub fn new(
        store: Arc<dyn PriceCacheStore>,
        connector: Arc<dyn MarketDataConnector>,
        ttl: TimeDelta,
    ) -> Self {
        PriceService {
            store,
            connector,
            ttl,
        }
    }

    pub fn store(&self) -> &Arc<dyn PriceCacheStore> {
        &self.store
    }

    /// Resolves a price, always yielding a number. Zero means unknown.
    ///
    /// Only a failing cache store surfaces as an error.
    pub async fn get_price(&self, symbol: &str, currency: &CurrencyCode) -> Result<Decimal> {
        Ok(self.resolve(symbol, currency).await?.price())
    }

    #[instrument(name = "ResolvePrice", skip(self), fields(symbol = %symbol, currency = %currency))]
    pub async fn resolve(
        &self,
        symbol: &str,
        currency: &CurrencyCode,
    ) -> Result<PriceResolution> {
        let symbol = normalize_symbol(symbol);
        let now = Utc::now();

        if let Some(entry) = self.store.find_fresh(&symbol, now).await? {
            debug!(provider = %entry.provider, "Cache hit for {}", symbol);
            return Ok(PriceResolution::Cached {
                price: entry.price,
                currency: entry.currency,
            });
        }

        match self.connector.fetch_price(&symbol, currency).await {
            Ok(data) => {
                let mut entry =
                    CacheEntry::from_market_data(&data, self.connector.name(), now, self.ttl);
                entry.symbol = symbol.clone();
                let resolution = PriceResolution::Fresh {
                    price: entry.price,
                    currency: entry.currency.clone(),
                };
                self.store.upsert(entry).await?;
                debug!("Fetched {} {} for {}", data.price(), data.currency(), symbol);
                Ok(resolution)
            }
            Err(e) if e.is_provider_failure() => {
                warn!("Price fetch failed for {}: {}", symbol, e);
                match self.store.find_latest(&symbol).await? {
                    Some(entry) => {
                        info!(
                            "Serving stale price for {} fetched at {}",
                            symbol, entry.fetched_at
                        );
                        Ok(PriceResolution::Stale {
                            price: entry.price,
                            currency: entry.currency,
                            fetched_at: entry.fetched_at,
                        })
                    }
                    None => Ok(PriceResolution::Unavailable),
                }
            }
            Err(e) => Err(e),
        }
    }
}
