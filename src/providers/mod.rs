pub mod coingecko;
pub mod quote_client;
pub mod yahoo_finance;
pub mod yahoo_rss;

pub use coingecko::CoinGeckoProvider;
pub use quote_client::{QuoteClient, ResolvedClient, resolve_client};
pub use yahoo_finance::{YahooFxProvider, YahooQuoteAdapter, YahooQuoteClient};
pub use yahoo_rss::YahooNewsProvider;
