use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sets the level of tracing.
    ///
    /// Without one, progress bars are shown instead of logs.
    #[arg(short, long, global = true)]
    pub trace: Option<TraceLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scrape the statements of every ticker, rank them by the magic formula & write the
    /// spreadsheet.
    Scrape(ScrapeArgs),
}

#[derive(Args, Debug)]
pub struct ScrapeArgs {
    /// Ticker list, one symbol per line.
    #[arg(short, long, env = "FORMULA_INPUT", default_value = "tickers.txt")]
    pub input: PathBuf,

    /// Directory the dated output folder is created in.
    #[arg(short, long, env = "FORMULA_OUTPUT", default_value = "output")]
    pub output: PathBuf,

    /// Exchange suffix appended to bare symbols.
    #[arg(short, long, default_value = ".AX")]
    pub suffix: String,

    #[arg(
        long,
        env = "FORMULA_BASE_URL",
        default_value = formula_spider::stock::yahoo_finance::BASE_URL
    )]
    pub base_url: String,

    /// Maximum number of tickers scraped at once.
    #[arg(short, long, default_value_t = 12)]
    pub concurrency: usize,

    /// Lower bound of the pause after each ticker, in seconds.
    #[arg(long, default_value_t = 2.0)]
    pub min_delay: f64,

    /// Upper bound of the pause after each ticker, in seconds.
    #[arg(long, default_value_t = 6.0)]
    pub max_delay: f64,

    /// Which row of a ticker holds its most recent fiscal year.
    #[arg(short, long, value_enum, default_value_t = PeriodArg::Positional)]
    pub period: PeriodArg,

    /// Number of ranked tickers printed once the run is done.
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
#[clap(rename_all = "UPPERCASE")]
pub enum TraceLevel {
    DEBUG,
    ERROR,
    INFO,
    TRACE,
    WARN,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum PeriodArg {
    /// The row after the current one.
    Positional,

    /// The row with the latest period-end date.
    LatestFiscal,
}
