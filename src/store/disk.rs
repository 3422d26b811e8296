use crate::core::cache::{PriceCacheStore, most_recent};
use crate::core::error::{PriceError, Result};
use crate::core::model::CacheEntry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const PARTITION: &str = "price_cache";

/// Price cache persisted in a fjall keyspace.
///
/// Keys are `SYMBOL\0CURRENCY` so all rows of one symbol share a prefix;
/// values are JSON encoded [`CacheEntry`] rows.
pub struct DiskPriceStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskPriceStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(storage_error)?;
        let keyspace = fjall::Config::new(path).open().map_err(storage_error)?;
        let partition = keyspace
            .open_partition(PARTITION, PartitionCreateOptions::default())
            .map_err(storage_error)?;
        debug!("Opened price cache at {}", path.display());
        Ok(Self {
            keyspace,
            partition,
        })
    }

    fn rows_for(&self, symbol: &str) -> Result<Vec<CacheEntry>> {
        let prefix = format!("{symbol}\0");
        self.partition
            .prefix(prefix.as_bytes())
            .map(|item| {
                let (_, value) = item.map_err(storage_error)?;
                serde_json::from_slice::<CacheEntry>(&value).map_err(storage_error)
            })
            .collect()
    }
}

fn row_key(entry: &CacheEntry) -> String {
    format!("{}\0{}", entry.symbol, entry.currency)
}

fn storage_error(e: impl std::fmt::Display) -> PriceError {
    PriceError::CacheUnavailable(e.to_string())
}

#[async_trait]
impl PriceCacheStore for DiskPriceStore {
    async fn find_fresh(&self, symbol: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>> {
        let rows = self.rows_for(symbol)?;
        let fresh = most_recent(rows.into_iter().filter(|e| e.is_fresh(now)));
        debug!(symbol, hit = fresh.is_some(), "Price cache lookup");
        Ok(fresh)
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<()> {
        let value = serde_json::to_vec(&entry).map_err(storage_error)?;
        self.partition
            .insert(row_key(&entry).as_bytes(), value)
            .map_err(storage_error)?;
        debug!(symbol = %entry.symbol, currency = %entry.currency, "Price cache PUT");
        Ok(())
    }

    async fn find_latest(&self, symbol: &str) -> Result<Option<CacheEntry>> {
        Ok(most_recent(self.rows_for(symbol)?))
    }

    async fn flush(&self) -> Result<()> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(storage_error)
    }
}
