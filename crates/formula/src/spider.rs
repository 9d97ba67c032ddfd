use crate::cli::{PeriodArg, ScrapeArgs};
use colored::Colorize;
use formula_spider::formula::fundamentals::{compute, FundamentalsOptions, PeriodSelection};
use formula_spider::formula::rank::{rank, RankedRecord};
use formula_spider::http::HttpFetcher;
use formula_spider::stock::yahoo_finance::{scrape, Progress, ScrapeOptions};
use formula_spider::{fs, tui};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Run the whole pipeline: tickers in, ranked spreadsheet out.
pub(crate) async fn run(args: ScrapeArgs, tui: bool) -> anyhow::Result<()> {
    let time = std::time::Instant::now();
    anyhow::ensure!(
        0.0 <= args.min_delay && args.min_delay <= args.max_delay,
        "invalid delay range: {}s to {}s",
        args.min_delay,
        args.max_delay
    );

    // 1. read the ticker list
    let symbols = fs::read_tickers(&args.input, &args.suffix).await?;
    if symbols.is_empty() {
        warn!("no tickers found in {:?}", args.input);
        return Ok(());
    }

    // 2. scrape every ticker
    let fetcher = HttpFetcher::new()?;
    let options = ScrapeOptions {
        base_url: args.base_url.clone(),
        concurrency: args.concurrency,
        delay: Duration::from_secs_f64(args.min_delay)..=Duration::from_secs_f64(args.max_delay),
        today: chrono::Local::now().date_naive(),
    };
    trace!("scrape options: {options:?}");

    // the multi bar must outlive the batch
    let (_multi, progress) = match tui {
        true => {
            let (multi, progress) = tui::multi_progress(symbols.len())?;
            (Some(multi), progress)
        }
        false => (None, Progress::hidden()),
    };
    let report = scrape(&fetcher, &symbols, &options, &progress).await;
    if tui {
        tui::finish(&progress);
    }

    for (symbol, err) in &report.failures {
        println!("{} [{symbol}] {err}", "failed".red());
    }
    if report.records.is_empty() {
        error!("none of {} tickers were collected", symbols.len());
        anyhow::bail!("no tickers collected");
    }

    // 3. fundamentals & ranks
    let combined = report.combined()?;
    let fundamentals = compute(
        &combined,
        &FundamentalsOptions {
            period: match args.period {
                PeriodArg::Positional => PeriodSelection::Positional,
                PeriodArg::LatestFiscal => PeriodSelection::LatestFiscal,
            },
            ..Default::default()
        },
    );
    let ranked = rank(fundamentals)?;
    debug!("{} tickers ranked", ranked.len());

    // 4. write the dated workbook
    let dir = args
        .output
        .join(options.today.format("%Y-%m-%d").to_string());
    let fundamentals: Vec<_> = ranked.iter().map(|r| r.fundamentals.clone()).collect();
    let dir = fs::write_workbook(dir, &combined, &fundamentals, &ranked).await?;

    print_ranks(&ranked, args.top);
    println!(
        "{} {} of {} tickers ranked, written to {}",
        "done".green(),
        ranked.len(),
        symbols.len(),
        dir.display()
    );

    info!("formula finished. {}", formula_spider::time_elapsed(time));
    Ok(())
}

fn print_ranks(ranked: &[RankedRecord], top: usize) {
    if top == 0 {
        return;
    }

    println!(
        "{}",
        format!(
            "{:>4}  {:<10} {:<36} {:>9} {:>9} {:>4} {:>4}",
            "rank", "symbol", "name", "EBIT/EV", "RoC", "EY#", "RoC#"
        )
        .bold()
    );
    for (i, record) in ranked.iter().take(top).enumerate() {
        let f = &record.fundamentals;
        println!(
            "{:>4}  {:<10} {:<36} {:>9} {:>9} {:>4} {:>4}",
            (i + 1).to_string().cyan(),
            f.symbol,
            f.name.as_deref().unwrap_or("-"),
            percent(f.earnings_yield),
            percent(f.return_on_capital),
            record.earnings_yield_rank,
            record.return_on_capital_rank,
        );
    }
}

fn percent(ratio: Option<f64>) -> String {
    match ratio {
        Some(ratio) if ratio.is_finite() => format!("{:.2}%", ratio * 100.0),
        _ => "-".to_string(),
    }
}
