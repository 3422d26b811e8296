pub mod disk;
pub mod memory;

use crate::core::cache::PriceCacheStore;
use crate::core::config::AppConfig;
use disk::DiskPriceStore;
use memory::MemoryPriceStore;
use std::sync::Arc;
use tracing::warn;

/// Opens the persisted price cache under the configured data directory.
///
/// Falls back to a process-local store when the directory cannot be
/// resolved or opened, so prices still resolve without persistence.
pub fn open_price_store(config: &AppConfig) -> Arc<dyn PriceCacheStore> {
    let opened = config
        .default_data_path()
        .map_err(|e| e.to_string())
        .and_then(|path| DiskPriceStore::open(&path.join("cache")).map_err(|e| e.to_string()));

    match opened {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("Price cache is not persisted: {}", e);
            Arc::new(MemoryPriceStore::new())
        }
    }
}
