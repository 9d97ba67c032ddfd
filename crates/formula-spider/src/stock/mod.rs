/// Statement rows scraped from the page markup.
pub mod extract;

/// Scraped rows reshaped into period-indexed tables.
pub mod normalize;

/// Company name & market cap, from the quote summary page.
pub mod summary;

/// Statements collected from the Yahoo Finance quote pages; one merged table per ticker.
///
/// [Yahoo Finance](https://au.finance.yahoo.com)
pub mod yahoo_finance;
