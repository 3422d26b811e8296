//! Terminal front end for the price, search, news and rate operations.

pub mod lookup;
pub mod prices;
pub mod setup;
pub mod ui;
