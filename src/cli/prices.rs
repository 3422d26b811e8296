use super::ui;
use crate::core::model::{CurrencyCode, normalize_symbol};
use crate::price_service::{PriceResolution, PriceService};
use anyhow::Result;
use comfy_table::{Cell, Table};
use futures::future::join_all;

struct PriceRow {
    symbol: String,
    resolution: Result<PriceResolution, String>,
}

/// Resolves every symbol concurrently and prints one table.
pub async fn run(service: &PriceService, symbols: &[String], currency: &CurrencyCode) -> Result<()> {
    if symbols.is_empty() {
        println!("No symbols given.");
        return Ok(());
    }

    let pb = ui::new_progress_bar(symbols.len() as u64);
    let futures = symbols.iter().map(|symbol| {
        let pb = pb.clone();
        async move {
            let resolution = service
                .resolve(symbol, currency)
                .await
                .map_err(|e| e.to_string());
            pb.inc(1);
            PriceRow {
                symbol: normalize_symbol(symbol),
                resolution,
            }
        }
    });
    let rows = join_all(futures).await;
    pb.finish_and_clear();

    service.store().flush().await?;

    println!("{}", build_table(&rows));
    for row in &rows {
        if let Err(e) = &row.resolution {
            println!(
                "{}",
                ui::style_text(&format!("{}: {}", row.symbol, e), ui::StyleType::Error)
            );
        }
    }
    Ok(())
}

/// Each row carries the currency its price is quoted in, which can differ
/// from the requested one.
fn build_table(rows: &[PriceRow]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Price"),
        ui::header_cell("Currency"),
        ui::header_cell("Status"),
        ui::header_cell("Fetched"),
    ]);

    for row in rows {
        match &row.resolution {
            Ok(resolution) => table.add_row(vec![
                Cell::new(&row.symbol),
                match resolution {
                    PriceResolution::Unavailable => ui::na_cell(false),
                    _ => ui::decimal_cell(resolution.price(), 2),
                },
                ui::format_optional_cell(resolution.currency(), |c| c.to_string()),
                ui::status_cell(resolution),
                ui::format_optional_cell(resolution.fetched_at(), |at| {
                    at.format("%Y-%m-%d %H:%M").to_string()
                }),
            ]),
            Err(_) => table.add_row(vec![
                Cell::new(&row.symbol),
                ui::na_cell(true),
                ui::na_cell(true),
                ui::na_cell(true),
                ui::na_cell(true),
            ]),
        };
    }
    table
}
