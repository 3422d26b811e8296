use crate::core::cache::{Cache, PriceCacheStore, most_recent};
use crate::core::error::Result;
use crate::core::model::{CacheEntry, CurrencyCode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct CacheValue<V> {
    value: V,
    expires_at: Option<Instant>,
}

/// In-memory TTL cache backed by a HashMap behind a tokio Mutex
pub struct MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<HashMap<K, CacheValue<V>>>>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, V> Default for MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        let cache = self.inner.lock().await;
        if let Some(entry) = cache.get(key) {
            if let Some(expiry) = entry.expires_at
                && expiry <= Instant::now()
            {
                debug!("Cache entry expired for key: {:?}", key);
                return None;
            }
            debug!("Cache HIT for key: {:?}", key);
            return Some(entry.value.clone());
        }
        debug!("Cache MISS for key: {:?}", key);
        None
    }

    async fn put(&self, key: K, value: V, ttl: Option<Duration>) {
        // A TTL too large for `Instant` means the value never expires.
        let expires_at = ttl.and_then(|duration| Instant::now().checked_add(duration));
        let cache_value = CacheValue { value, expires_at };

        let mut cache = self.inner.lock().await;
        let now = Instant::now();
        cache.retain(|_, entry| entry.expires_at.is_none_or(|expiry| expiry > now));
        debug!("Cache PUT for key: {:?}", key);
        cache.insert(key, cache_value);
    }
}

/// Process-local price cache. Used when no data directory is available and
/// in tests; contents are lost on exit.
#[derive(Default)]
pub struct MemoryPriceStore {
    rows: Mutex<HashMap<String, HashMap<CurrencyCode, CacheEntry>>>,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn rows_for(&self, symbol: &str) -> Vec<CacheEntry> {
        let rows = self.rows.lock().await;
        rows.get(symbol)
            .map(|by_currency| by_currency.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PriceCacheStore for MemoryPriceStore {
    async fn find_fresh(&self, symbol: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>> {
        let rows = self.rows_for(symbol).await;
        Ok(most_recent(rows.into_iter().filter(|e| e.is_fresh(now))))
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<()> {
        let mut rows = self.rows.lock().await;
        debug!(symbol = %entry.symbol, currency = %entry.currency, "Price cache PUT");
        rows.entry(entry.symbol.clone())
            .or_default()
            .insert(entry.currency.clone(), entry);
        Ok(())
    }

    async fn find_latest(&self, symbol: &str) -> Result<Option<CacheEntry>> {
        Ok(most_recent(self.rows_for(symbol).await))
    }
}
