//! Quote/search client contract and start-up selection of a usable client.
//!
//! Quote clients come in several shapes: a constructor, a nested default
//! constructor, or a ready-made instance. The shape is probed once at start
//! up and the selected client is shared for the life of the process.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// A quote as returned to callers of the quote endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub currency: Option<String>,
    pub exchange_name: Option<String>,
    pub regular_market_price: Option<f64>,
    pub regular_market_previous_close: Option<f64>,
    /// Unix seconds of the last trade.
    pub regular_market_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuote {
    pub symbol: String,
    #[serde(default)]
    pub shortname: Option<String>,
    #[serde(default)]
    pub longname: Option<String>,
    #[serde(default)]
    pub quote_type: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub exch_disp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub quotes: Vec<SearchQuote>,
}

/// Process-wide client settings applied once after selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Log non-fatal response validation problems at warn level.
    pub validation_warnings: bool,
}

/// The two operations the quote adapter depends on, plus optional one-time
/// configuration hooks.
#[async_trait]
pub trait QuoteClient: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Quote>;

    async fn search(&self, query: &str) -> Result<SearchResults>;

    fn set_global_config(&self, _config: &ClientConfig) {}

    fn suppress_notices(&self, _notices: &[&str]) {}
}

pub type ClientFactory = Box<dyn Fn() -> Result<Arc<dyn QuoteClient>> + Send + Sync>;

/// Everything a client library might export. Any combination may be present.
#[derive(Default)]
pub struct ClientSurface {
    pub constructor: Option<ClientFactory>,
    pub default_export: Option<ClientFactory>,
    pub instance: Option<Arc<dyn QuoteClient>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientShape {
    Constructor,
    NestedDefault,
    Instance,
    /// No probe succeeded; calls fail explicitly.
    Raw,
}

pub struct ResolvedClient {
    pub client: Arc<dyn QuoteClient>,
    pub shape: ClientShape,
}

/// Notices silenced on every selected client.
pub const SUPPRESSED_NOTICES: &[&str] = &["anonymous-access"];

type Probe = fn(&ClientSurface) -> Option<Result<Arc<dyn QuoteClient>>>;

fn probe_constructor(surface: &ClientSurface) -> Option<Result<Arc<dyn QuoteClient>>> {
    surface.constructor.as_ref().map(|build| build())
}

fn probe_default_export(surface: &ClientSurface) -> Option<Result<Arc<dyn QuoteClient>>> {
    surface.default_export.as_ref().map(|build| build())
}

fn probe_instance(surface: &ClientSurface) -> Option<Result<Arc<dyn QuoteClient>>> {
    surface.instance.clone().map(Ok)
}

const PROBES: [(ClientShape, Probe); 3] = [
    (ClientShape::Constructor, probe_constructor),
    (ClientShape::NestedDefault, probe_default_export),
    (ClientShape::Instance, probe_instance),
];

/// Selects the first usable client in probe order and configures it.
///
/// Never fails: when nothing usable is exported the result wraps a client
/// whose every call returns an error.
pub fn resolve_client(surface: ClientSurface) -> ResolvedClient {
    let mut selected = None;
    for (shape, probe) in PROBES {
        match probe(&surface) {
            Some(Ok(client)) => {
                selected = Some(ResolvedClient { client, shape });
                break;
            }
            Some(Err(e)) => debug!(?shape, "Quote client probe failed: {}", e),
            None => {}
        }
    }

    let resolved = selected.unwrap_or_else(|| {
        warn!("No usable quote client export; quote and search calls will fail");
        ResolvedClient {
            client: Arc::new(UnusableClient),
            shape: ClientShape::Raw,
        }
    });
    debug!(shape = ?resolved.shape, "Selected quote client");

    resolved.client.set_global_config(&ClientConfig {
        validation_warnings: false,
    });
    resolved.client.suppress_notices(SUPPRESSED_NOTICES);
    resolved
}

struct UnusableClient;

#[async_trait]
impl QuoteClient for UnusableClient {
    async fn quote(&self, symbol: &str) -> Result<Quote> {
        Err(anyhow!(
            "Quote client is not initialized, cannot quote {}",
            symbol
        ))
    }

    async fn search(&self, query: &str) -> Result<SearchResults> {
        Err(anyhow!(
            "Quote client is not initialized, cannot search for {}",
            query
        ))
    }
}
