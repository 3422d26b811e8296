use super::error::Result;
use super::model::CacheEntry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::hash::Hash;
use std::time::Duration;

/// Short-lived key/value cache with optional per-entry TTL.
#[async_trait]
pub trait Cache<K, V>: Send + Sync
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V>;
    async fn put(&self, key: K, value: V, ttl: Option<Duration>);
}

/// Persisted price cache consulted by the resolution service.
///
/// Symbols passed in are already upper-cased. Rows are kept per
/// `(symbol, currency)` and never deleted here.
#[async_trait]
pub trait PriceCacheStore: Send + Sync {
    /// Most recently fetched entry for `symbol` with `expires_at > now`.
    async fn find_fresh(&self, symbol: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>>;

    /// Inserts the entry, replacing any row for the same symbol and currency.
    async fn upsert(&self, entry: CacheEntry) -> Result<()>;

    /// Most recently fetched entry for `symbol`, expired or not, in any
    /// currency.
    async fn find_latest(&self, symbol: &str) -> Result<Option<CacheEntry>>;

    /// Makes previous writes durable. Stores without a journal need not
    /// override this.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Picks the row with the greatest `fetched_at`.
pub(crate) fn most_recent<I>(entries: I) -> Option<CacheEntry>
where
    I: IntoIterator<Item = CacheEntry>,
{
    entries.into_iter().max_by_key(|e| e.fetched_at)
}
