use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;

use super::AppState;
use crate::providers::yahoo_rss::NewsFeed;

#[derive(Debug, Deserialize)]
struct NewsQuery {
    symbol: Option<String>,
}

/// Always answers 200; an empty feed carries the reason in `source`.
async fn get_news(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NewsQuery>,
) -> Json<NewsFeed> {
    let symbol = params.symbol.unwrap_or_default();
    Json(state.news.fetch_news(&symbol).await)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/news", get(get_news))
}
