use thiserror::Error;

/// Failures raised while resolving a price.
#[derive(Debug, Error)]
pub enum PriceError {
    /// Transport, auth or rate-limit failure talking to an upstream.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The upstream answered but without the expected field.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),

    /// The persisted price cache could not be read or written.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),
}

impl PriceError {
    /// Provider-side failures that the resolution service absorbs with a
    /// stale or zero price. Storage failures are never absorbed.
    pub fn is_provider_failure(&self) -> bool {
        !matches!(self, PriceError::CacheUnavailable(_))
    }

    /// The message without the kind prefix.
    pub fn detail(&self) -> &str {
        match self {
            PriceError::ProviderUnavailable(detail)
            | PriceError::SymbolNotFound(detail)
            | PriceError::MalformedUpstreamResponse(detail)
            | PriceError::CacheUnavailable(detail) => detail,
        }
    }
}

pub type Result<T, E = PriceError> = std::result::Result<T, E>;
