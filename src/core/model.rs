//! Normalized value types produced by every connector

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// An upper-cased currency code such as `USD` or `EUR`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: &str) -> Self {
        CurrencyCode(code.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased form, as some upstream APIs key their responses.
    pub fn to_lowercase(&self) -> String {
        self.0.to_lowercase()
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(anyhow::anyhow!("Invalid currency code: {}", s));
        }
        Ok(CurrencyCode::new(trimmed))
    }
}

impl From<&str> for CurrencyCode {
    fn from(code: &str) -> Self {
        CurrencyCode::new(code)
    }
}

/// A price observation from a market data provider.
///
/// Fields are read-only; a newer observation supersedes an older one instead
/// of mutating it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    currency: CurrencyCode,
    last_updated: DateTime<Utc>,
}

impl MarketData {
    pub fn new(
        symbol: &str,
        price: Decimal,
        currency: CurrencyCode,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            price,
            currency,
            last_updated,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

/// One account balance reported by a banking provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedBalance {
    pub external_id: String,
    pub name: String,
    pub balance: Decimal,
    pub currency: CurrencyCode,
    #[serde(rename = "type")]
    pub account_type: String,
}

/// One ledger movement; `external_id` deduplicates repeated imports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTransaction {
    pub external_id: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub category: Option<String>,
    pub merchant: Option<String>,
}

/// A persisted price observation with its validity window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub symbol: String,
    pub currency: CurrencyCode,
    pub price: Decimal,
    pub provider: String,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Builds the entry written after a successful fetch. The symbol is
    /// upper-cased and the provider-reported currency is kept. A TTL reaching
    /// past the last representable instant never expires.
    pub fn from_market_data(
        data: &MarketData,
        provider: &str,
        fetched_at: DateTime<Utc>,
        ttl: TimeDelta,
    ) -> Self {
        Self {
            symbol: normalize_symbol(data.symbol()),
            currency: data.currency().clone(),
            price: data.price(),
            provider: provider.to_string(),
            fetched_at,
            expires_at: fetched_at
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
