//! The formula spider: scrapes financial statements per ticker, merges them into one table, and
//! ranks the tickers on earnings yield & return on capital.

pub mod error;
pub mod formula;
pub mod frame;
pub mod fs;
pub mod http;
pub mod stock;
pub mod tui;

pub use error::{Result, SpiderError};

/// Format the time elapsed since `time`, for log lines.
pub fn time_elapsed(time: std::time::Instant) -> String {
    format!("time elapsed: {:.2?}", time.elapsed())
}
