use crate::formula::fundamentals::FundamentalsRecord;
use crate::formula::rank::RankedRecord;
use crate::frame::Frame;
use polars::prelude::{CsvWriter, SerWriter};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace};

/// Sheet of the combined statements of every ticker.
pub const DATA_SHEET: &str = "data.csv";

/// Sheet of the fundamentals per ticker.
pub const FUNDAMENTALS_SHEET: &str = "fundamentals.csv";

/// Sheet of the ranked tickers.
pub const RANKS_SHEET: &str = "ranks.csv";

/// Reads a ticker list from `path`: one symbol per line, whitespace trimmed.
///
/// Blank lines and `#` comments are skipped, and `suffix` (e.g. the exchange suffix `.AX`) is
/// appended to every symbol that does not already carry it.
pub async fn read_tickers(path: impl AsRef<Path>, suffix: &str) -> anyhow::Result<Vec<String>> {
    let path = path.as_ref();
    trace!("reading ticker list at {path:?}");
    let contents = tokio::fs::read_to_string(path).await.map_err(|err| {
        error!("failed to read ticker list at {path:?}, error({err})");
        err
    })?;

    let tickers = parse_tickers(&contents, suffix);
    debug!("{} tickers read from {path:?}", tickers.len());
    Ok(tickers)
}

pub fn parse_tickers(contents: &str, suffix: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|symbol| {
            let symbol = symbol.to_uppercase();
            if suffix.is_empty() || symbol.ends_with(&suffix.to_uppercase()) {
                symbol
            } else {
                format!("{symbol}{suffix}")
            }
        })
        .collect()
}

/// Write the three sheets of a run into `dir`, creating it as necessary.
///
/// Each sheet is written whole, replacing what a previous run left behind. Returns the path of
/// the directory.
pub async fn write_workbook(
    dir: impl AsRef<Path>,
    combined: &Frame,
    fundamentals: &[FundamentalsRecord],
    ranks: &[RankedRecord],
) -> anyhow::Result<PathBuf> {
    let dir = dir.as_ref().to_path_buf();
    tokio::fs::create_dir_all(&dir).await.map_err(|err| {
        error!("failed to create directory {dir:?}, error({err})");
        err
    })?;

    write_frame(dir.join(DATA_SHEET), combined).await?;
    write_records(dir.join(FUNDAMENTALS_SHEET), fundamentals).await?;
    write_records(
        dir.join(RANKS_SHEET),
        ranks.iter().map(RankRow::from),
    )
    .await?;

    info!("workbook written to {dir:?}");
    Ok(dir)
}

/// Write a [`Frame`] as CSV: the `Date` key first, then every column; absent cells stay empty.
pub async fn write_frame(path: impl AsRef<Path>, frame: &Frame) -> anyhow::Result<()> {
    let path = path.as_ref();
    trace!("writing {} rows to {path:?}", frame.len());

    let mut df = frame.data_frame().clone();
    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(&mut df)?;

    write_file(path, buffer).await
}

async fn write_records<T: Serialize>(
    path: impl AsRef<Path>,
    records: impl IntoIterator<Item = T>,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    trace!("writing records to {path:?}");

    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    let buffer = writer.into_inner().map_err(|err| err.into_error())?;

    write_file(path, buffer).await
}

async fn write_file(path: &Path, contents: Vec<u8>) -> anyhow::Result<()> {
    tokio::fs::write(path, contents).await.map_err(|err| {
        error!("failed to write {path:?}, error({err})");
        err
    })?;
    Ok(())
}

/// A [`RankedRecord`], flattened for the ranks sheet.
#[derive(Serialize)]
struct RankRow<'a> {
    #[serde(rename = "Symbol")]
    symbol: &'a str,
    #[serde(rename = "Name")]
    name: Option<&'a str>,
    #[serde(rename = "MarketCap")]
    market_cap: Option<f64>,
    #[serde(rename = "EBIT")]
    ebit: Option<f64>,
    #[serde(rename = "EV")]
    enterprise_value: Option<f64>,
    #[serde(rename = "EBIT/EV")]
    earnings_yield: Option<f64>,
    #[serde(rename = "RoC")]
    return_on_capital: Option<f64>,
    #[serde(rename = "EBIT/EV Rank")]
    earnings_yield_rank: usize,
    #[serde(rename = "RoC Rank")]
    return_on_capital_rank: usize,
    #[serde(rename = "Aggregate Rank")]
    aggregate_rank: usize,
}

impl<'a> From<&'a RankedRecord> for RankRow<'a> {
    fn from(ranked: &'a RankedRecord) -> Self {
        let f = &ranked.fundamentals;
        Self {
            symbol: &f.symbol,
            name: f.name.as_deref(),
            market_cap: f.market_cap,
            ebit: f.ebit,
            enterprise_value: f.enterprise_value,
            earnings_yield: f.earnings_yield,
            return_on_capital: f.return_on_capital,
            earnings_yield_rank: ranked.earnings_yield_rank,
            return_on_capital_rank: ranked.return_on_capital_rank,
            aggregate_rank: ranked.aggregate_rank,
        }
    }
}
