use thiserror::Error;

/// Failures of the spider pipeline, from the page fetch through to the statement tables.
///
/// Every variant is fatal for the statement it came from; the batch scraper catches them per
/// ticker, so one bad page never aborts the sibling tickers.
#[derive(Debug, Error)]
pub enum SpiderError {
    /// No statement rows were found; the layout changed, or the fetch returned an error/login
    /// page.
    #[error("no statement rows found in page {url}")]
    StructureNotFound { url: String },

    /// A cell that belongs to a numeric column did not parse as a number.
    #[error("malformed value \"{value}\" in column \"{column}\"")]
    MalformedValue { column: String, value: String },

    /// The summary page holds no "Market cap" pair.
    #[error("market cap not found")]
    MarketCapNotFound,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A table operation (join, concat, sort) failed.
    #[error("table error: {0}")]
    Frame(#[from] polars::prelude::PolarsError),
}

impl SpiderError {
    /// Attach the page `url` to a [`SpiderError::StructureNotFound`] raised before the url was
    /// known; other variants pass through unchanged.
    pub fn at(self, url: &str) -> Self {
        match self {
            Self::StructureNotFound { .. } => Self::StructureNotFound {
                url: url.to_string(),
            },
            err => err,
        }
    }
}

pub type Result<T> = std::result::Result<T, SpiderError>;
