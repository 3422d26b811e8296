use super::ui;
use crate::core::connector::FxConnector;
use crate::core::model::CurrencyCode;
use crate::providers::quote_client::SearchResults;
use crate::providers::yahoo_finance::YahooQuoteAdapter;
use crate::providers::yahoo_rss::{NewsFeed, NewsSource, YahooNewsProvider};
use anyhow::Result;
use comfy_table::{Cell, Table};

pub async fn search(quotes: &YahooQuoteAdapter, query: &str) -> Result<()> {
    let results = quotes.search(query).await?;
    if results.quotes.is_empty() {
        println!("No matches for '{query}'.");
        return Ok(());
    }
    println!("{}", search_table(&results));
    Ok(())
}

fn search_table(results: &SearchResults) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Name"),
        ui::header_cell("Type"),
        ui::header_cell("Exchange"),
    ]);
    for quote in &results.quotes {
        let name = quote
            .longname
            .as_deref()
            .or(quote.shortname.as_deref())
            .unwrap_or("");
        let exchange = quote
            .exch_disp
            .as_deref()
            .or(quote.exchange.as_deref())
            .unwrap_or("");
        table.add_row(vec![
            Cell::new(&quote.symbol),
            Cell::new(name),
            Cell::new(quote.quote_type.as_deref().unwrap_or("")),
            Cell::new(exchange),
        ]);
    }
    table
}

pub async fn news(provider: &YahooNewsProvider, symbol: &str) -> Result<()> {
    let feed = provider.fetch_news(symbol).await;
    print!("{}", render_news(symbol, &feed));
    Ok(())
}

fn render_news(symbol: &str, feed: &NewsFeed) -> String {
    match feed.source {
        NewsSource::Unavailable => {
            return format!("No news feed available for {symbol}.\n");
        }
        NewsSource::Error => {
            return format!(
                "{}\n",
                ui::style_text(
                    &format!("Failed to fetch news for {symbol}."),
                    ui::StyleType::Error
                )
            );
        }
        NewsSource::YahooRss => {}
    }

    let mut out = format!(
        "{}\n",
        ui::style_text(&format!("News for {symbol}"), ui::StyleType::Title)
    );
    if feed.news.is_empty() {
        out.push_str("No recent headlines.\n");
    }
    for item in &feed.news {
        out.push_str(&format!(
            "\n{}\n{}\n",
            item.title,
            ui::style_text(&item.pub_date, ui::StyleType::Subtle)
        ));
        if !item.description.is_empty() {
            out.push_str(&format!("{}\n", item.description));
        }
        out.push_str(&format!("{}\n", item.link));
    }
    out
}

pub async fn rate(fx: &dyn FxConnector, base: &CurrencyCode, target: &CurrencyCode) -> Result<()> {
    let rate = fx.fetch_rate(base, target).await?;

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Pair"), ui::header_cell("Rate")]);
    table.add_row(vec![
        Cell::new(format!("{base}/{target}")),
        ui::decimal_cell(rate, 4),
    ]);
    println!("{table}");
    Ok(())
}
