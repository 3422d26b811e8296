use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::core::error::PriceError;

const LOG_HINT: &str = "Check server logs for details.";

/// Failures surfaced by the HTTP edge. Upstream messages are logged, never
/// sent to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing query parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("Failed to fetch quote")]
    Quote {
        symbol: String,
        #[source]
        source: PriceError,
    },

    #[error("Failed to search symbols")]
    Search {
        query: String,
        #[source]
        source: PriceError,
    },

    #[error("Failed to resolve price")]
    Price {
        symbol: String,
        #[source]
        source: PriceError,
    },

    #[error("Failed to fetch crypto price")]
    Crypto {
        symbol: String,
        #[source]
        source: PriceError,
    },

    #[error("Failed to fetch exchange rate")]
    Rate {
        pair: String,
        #[source]
        source: PriceError,
    },
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    details: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingParameter(_) | ApiError::InvalidCurrency(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Crypto {
                source: PriceError::SymbolNotFound(_),
                ..
            }
            | ApiError::Rate {
                source: PriceError::SymbolNotFound(_),
                ..
            } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> String {
        match self {
            ApiError::MissingParameter(name) => format!("Provide the '{name}' query parameter."),
            ApiError::InvalidCurrency(code) => {
                format!("'{code}' is not an alphabetic currency code.")
            }
            ApiError::Quote { symbol, .. } => format!("Symbol: {symbol}. {LOG_HINT}"),
            ApiError::Search { query, .. } => format!("Query: {query}. {LOG_HINT}"),
            ApiError::Price { symbol, .. } | ApiError::Crypto { symbol, .. } => {
                format!("Symbol: {symbol}. {LOG_HINT}")
            }
            ApiError::Rate { pair, .. } => format!("Pair: {pair}. {LOG_HINT}"),
        }
    }

    fn upstream(&self) -> Option<&PriceError> {
        match self {
            ApiError::Quote { source, .. }
            | ApiError::Search { source, .. }
            | ApiError::Price { source, .. }
            | ApiError::Crypto { source, .. }
            | ApiError::Rate { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self.upstream() {
            Some(source) => tracing::error!(error = %source, "{}", self),
            None => tracing::debug!("Rejected request: {}", self),
        }

        let body = Json(ErrorBody {
            error: self.to_string(),
            details: self.details(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
