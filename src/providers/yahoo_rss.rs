//! Yahoo Finance headline feed.
//!
//! The feed is parsed with a handful of patterns rather than an XML parser:
//! only four fields per item are read and the upstream markup is loose.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, warn};

pub const MAX_ITEMS: usize = 10;
pub const MAX_DESCRIPTION_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    #[serde(rename = "pubDate")]
    pub pub_date: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsSource {
    YahooRss,
    Unavailable,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsFeed {
    pub news: Vec<NewsItem>,
    pub source: NewsSource,
}

impl NewsFeed {
    fn empty(source: NewsSource) -> Self {
        NewsFeed {
            news: Vec::new(),
            source,
        }
    }
}

struct FieldPattern {
    cdata: Regex,
    plain: Regex,
}

impl FieldPattern {
    fn new(tag: &str) -> Self {
        FieldPattern {
            cdata: Regex::new(&format!(r"(?s)<{tag}>\s*<!\[CDATA\[(.*?)\]\]>\s*</{tag}>"))
                .expect("valid CDATA pattern"),
            plain: Regex::new(&format!(r"(?s)<{tag}>(.*?)</{tag}>")).expect("valid tag pattern"),
        }
    }

    /// CDATA content wins over the plain tag body.
    fn extract(&self, block: &str) -> String {
        self.cdata
            .captures(block)
            .or_else(|| self.plain.captures(block))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    }
}

static ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<item>(.*?)</item>").expect("valid item pattern"));
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid html pattern"));
static TITLE: LazyLock<FieldPattern> = LazyLock::new(|| FieldPattern::new("title"));
static LINK: LazyLock<FieldPattern> = LazyLock::new(|| FieldPattern::new("link"));
static PUB_DATE: LazyLock<FieldPattern> = LazyLock::new(|| FieldPattern::new("pubDate"));
static DESCRIPTION: LazyLock<FieldPattern> = LazyLock::new(|| FieldPattern::new("description"));

fn clean_description(raw: &str) -> String {
    let text = HTML_TAG.replace_all(raw, "");
    text.trim().chars().take(MAX_DESCRIPTION_CHARS).collect()
}

/// Extracts up to [`MAX_ITEMS`] items in document order.
pub fn parse_feed(xml: &str) -> Vec<NewsItem> {
    ITEM.captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .take(MAX_ITEMS)
        .map(|block| {
            let block = block.as_str();
            NewsItem {
                title: TITLE.extract(block),
                link: LINK.extract(block),
                pub_date: PUB_DATE.extract(block),
                description: clean_description(&DESCRIPTION.extract(block)),
            }
        })
        .collect()
}

pub struct YahooNewsProvider {
    base_url: String,
    client: reqwest::Client,
}

impl YahooNewsProvider {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; quotevault/0.1)")
            .build()?;
        Ok(YahooNewsProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Fetches headlines for `symbol`. Failures degrade to an empty feed
    /// tagged with why it is empty.
    pub async fn fetch_news(&self, symbol: &str) -> NewsFeed {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return NewsFeed::empty(NewsSource::Unavailable);
        }

        let url = match reqwest::Url::parse_with_params(
            &format!("{}/rss/2.0/headline", self.base_url),
            &[("s", symbol)],
        ) {
            Ok(url) => url,
            Err(e) => {
                warn!("Invalid news feed URL for {}: {}", symbol, e);
                return NewsFeed::empty(NewsSource::Error);
            }
        };

        debug!("Requesting news feed from {}", url);
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("News feed request failed for {}: {}", symbol, e);
                return NewsFeed::empty(NewsSource::Error);
            }
        };

        if !response.status().is_success() {
            debug!(
                "News feed returned {} for {}",
                response.status(),
                symbol
            );
            return NewsFeed::empty(NewsSource::Unavailable);
        }

        match response.text().await {
            Ok(body) => NewsFeed {
                news: parse_feed(&body),
                source: NewsSource::YahooRss,
            },
            Err(e) => {
                warn!("Failed to read news feed for {}: {}", symbol, e);
                NewsFeed::empty(NewsSource::Error)
            }
        }
    }
}
