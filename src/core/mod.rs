//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod connector;
pub mod error;
pub mod log;
pub mod model;

// Re-export main types for cleaner imports
pub use cache::{Cache, PriceCacheStore};
pub use connector::{BankingConnector, Connector, FxConnector, MarketDataConnector};
pub use error::PriceError;
pub use model::{
    CacheEntry, CurrencyCode, MarketData, NormalizedBalance, NormalizedTransaction,
};
