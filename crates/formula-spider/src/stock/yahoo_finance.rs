use super::extract::extract;
use super::normalize::normalize;
use super::summary::{extract_name, extract_summary, SummaryRecord};
use crate::error::{Result, SpiderError};
use crate::frame::{Frame, SYMBOL};
use crate::http::Fetcher;
use chrono::NaiveDate;
use futures::{stream, StreamExt};
use indicatif::ProgressBar;
use rand::Rng;
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

pub const BASE_URL: &str = "https://au.finance.yahoo.com";

// statements
// ----------------------------------------------------------------------------

/// The statement pages scraped for every ticker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Statement {
    Income,
    BalanceSheet,
    CashFlow,
}

impl Statement {
    /// Order in which statements are joined onto the summary.
    pub const JOIN_ORDER: [Statement; 3] = [
        Statement::BalanceSheet,
        Statement::Income,
        Statement::CashFlow,
    ];

    /// Path segment of the statement page.
    pub fn key(&self) -> &'static str {
        match self {
            Statement::Income => "financials",
            Statement::BalanceSheet => "balance-sheet",
            Statement::CashFlow => "cash-flow",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Statement::Income => "Income Statement",
            Statement::BalanceSheet => "Balance Sheet",
            Statement::CashFlow => "Cash Flow",
        }
    }

    /// Appended to this statement's columns when their names are already taken.
    pub fn suffix(&self) -> String {
        format!(" - {}", self.title())
    }

    pub fn url(&self, base: &str, symbol: &str) -> String {
        format!("{base}/quote/{symbol}/{key}?p={symbol}", key = self.key())
    }
}

/// Url of the quote summary page.
pub fn summary_url(base: &str, symbol: &str) -> String {
    format!("{base}/quote/{symbol}?p={symbol}")
}

// options
// ----------------------------------------------------------------------------

/// Settings of a scrape.
#[derive(Clone, Debug)]
pub struct ScrapeOptions {
    pub base_url: String,

    /// Maximum number of tickers in flight.
    pub concurrency: usize,

    /// Each task sleeps a random duration from this range once it finishes.
    pub delay: RangeInclusive<Duration>,

    /// Date stamped on the summary row; normally today.
    pub today: NaiveDate,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            concurrency: 12,
            delay: Duration::from_secs(2)..=Duration::from_secs(6),
            today: chrono::Local::now().date_naive(),
        }
    }
}

impl ScrapeOptions {
    fn random_delay(&self) -> Duration {
        let (start, end) = (*self.delay.start(), *self.delay.end());
        if end <= start {
            return start;
        }
        rand::thread_rng().gen_range(start..=end)
    }
}

// aggregate
// ----------------------------------------------------------------------------

/// Every statement of one ticker, merged on the period key, with a `Symbol` column.
#[derive(Clone, Debug)]
pub struct TickerRecord {
    pub symbol: String,
    pub frame: Frame,
}

/// Fetch, extract and normalize the summary and the three statements of `symbol`, then outer join
/// them on the date key.
///
/// A statement that fails to fetch or extract fails the ticker. A summary without a usable market
/// cap (missing, or a figure such as `N/A`) does not; its record is emitted with the market cap
/// unset.
pub async fn aggregate<F: Fetcher + ?Sized>(
    fetcher: &F,
    symbol: &str,
    options: &ScrapeOptions,
) -> Result<TickerRecord> {
    let time = std::time::Instant::now();

    let url = summary_url(&options.base_url, symbol);
    trace!("fetching summary for [{symbol}]");
    let markup = fetcher.fetch(&url).await?;
    let summary = match extract_summary(&markup, options.today) {
        Ok(summary) => summary,
        Err(err @ (SpiderError::MarketCapNotFound | SpiderError::MalformedValue { .. })) => {
            warn!("no usable market cap for [{symbol}], error({err}), continuing without it");
            SummaryRecord {
                date: options.today,
                name: extract_name(&markup),
                market_cap: None,
            }
        }
        Err(err) => return Err(err),
    };

    let mut frame = summary.to_frame()?;
    for statement in Statement::JOIN_ORDER {
        let url = statement.url(&options.base_url, symbol);
        trace!("fetching {} for [{symbol}]", statement.title());
        let markup = fetcher.fetch(&url).await?;

        let rows = extract(&markup).map_err(|err| err.at(&url))?;
        let table = normalize(&rows).map_err(|err| err.at(&url))?;
        trace!(
            "{} for [{symbol}]: {} line items over {} periods",
            statement.title(),
            table.columns.len(),
            table.rows.len()
        );
        frame = frame.outer_join(&table.to_frame()?, &statement.suffix())?;
    }

    let mut frame = frame.drop_empty_columns()?;
    frame.insert_column(0, SYMBOL, symbol)?;

    debug!(
        "[{symbol}] aggregated {} periods, {} columns. {}",
        frame.len(),
        frame.columns().len(),
        crate::time_elapsed(time)
    );

    Ok(TickerRecord {
        symbol: symbol.to_string(),
        frame,
    })
}

// scrape
// ----------------------------------------------------------------------------

/// Outcome of a batch: the tickers that made it, and those that did not.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub records: Vec<TickerRecord>,
    pub failures: Vec<(String, SpiderError)>,
}

impl BatchReport {
    /// All successful records stacked into one table.
    pub fn combined(&self) -> Result<Frame> {
        Frame::concat(self.records.iter().map(|record| &record.frame))
    }
}

/// Progress bars of a batch; all hidden when not running interactively.
#[derive(Clone, Debug)]
pub struct Progress {
    pub total: ProgressBar,
    pub success: ProgressBar,
    pub fails: ProgressBar,
}

impl Progress {
    pub fn hidden() -> Self {
        Self {
            total: ProgressBar::hidden(),
            success: ProgressBar::hidden(),
            fails: ProgressBar::hidden(),
        }
    }
}

/// Aggregate every symbol, at most `options.concurrency` at a time.
///
/// Each task runs to completion, then sleeps a random politeness delay. Tasks finish in any order;
/// a slow ticker never holds back the ones queued behind it. Failures are logged against their
/// symbol and collected in the report, and the batch itself never fails. Records come back in the
/// order of `symbols`.
pub async fn scrape<F: Fetcher + ?Sized>(
    fetcher: &F,
    symbols: &[String],
    options: &ScrapeOptions,
    progress: &Progress,
) -> BatchReport {
    let time = std::time::Instant::now();
    info!("scraping {} tickers ...", symbols.len());

    let mut outcomes: Vec<(usize, Result<TickerRecord>)> = stream::iter(symbols.iter().enumerate())
        .map(|(index, symbol)| async move {
            let outcome = aggregate(fetcher, symbol, options).await;
            match &outcome {
                Ok(_) => {
                    trace!("[{symbol}] collected");
                    progress.success.inc(1);
                }
                Err(err) => {
                    error!("failed to collect [{symbol}], error({err})");
                    progress.fails.inc(1);
                }
            }
            progress.total.inc(1);

            let delay = options.random_delay();
            tokio::time::sleep(delay).await;
            (index, outcome)
        })
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;
    outcomes.sort_by_key(|(index, _)| *index);

    let mut report = BatchReport::default();
    for (index, outcome) in outcomes {
        match outcome {
            Ok(record) => report.records.push(record),
            Err(err) => report.failures.push((symbols[index].clone(), err)),
        }
    }

    info!(
        "scraped {} of {} tickers ({} failed). {}",
        report.records.len(),
        symbols.len(),
        report.failures.len(),
        crate::time_elapsed(time)
    );
    report
}
