use async_trait::async_trait;
use chrono::NaiveDate;
use formula_spider::formula::fundamentals::{compute, FundamentalsOptions, PeriodSelection};
use formula_spider::formula::rank::rank;
use formula_spider::frame::{Value, SYMBOL};
use formula_spider::fs::{write_workbook, DATA_SHEET, FUNDAMENTALS_SHEET, RANKS_SHEET};
use formula_spider::http::Fetcher;
use formula_spider::stock::yahoo_finance::{
    aggregate, scrape, summary_url, Progress, ScrapeOptions, Statement,
};
use formula_spider::{Result, SpiderError};
use std::collections::HashMap as Map;
use std::time::Duration;

const BASE_URL: &str = "http://fixtures.test";

fn fixture(name: &str) -> String {
    let path = format!("{}/tests/files/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap_or_else(|err| panic!("unable to read {path}: {err}"))
}

/// Serves pages from memory; unknown urls have no page structure.
#[derive(Default)]
struct MemoryFetcher {
    pages: Map<String, String>,
    latency: Map<String, Duration>,
}

impl MemoryFetcher {
    fn with_ticker(mut self, symbol: &str, summary: String) -> Self {
        self.pages.insert(summary_url(BASE_URL, symbol), summary);
        for (statement, file) in [
            (Statement::BalanceSheet, "balance_sheet.html"),
            (Statement::Income, "income_statement.html"),
            (Statement::CashFlow, "cash_flow.html"),
        ] {
            self.pages.insert(statement.url(BASE_URL, symbol), fixture(file));
        }
        self
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        if let Some(latency) = self
            .latency
            .iter()
            .find_map(|(symbol, latency)| url.ends_with(symbol.as_str()).then_some(*latency))
        {
            tokio::time::sleep(latency).await;
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| SpiderError::StructureNotFound { url: url.to_string() })
    }
}

fn options() -> ScrapeOptions {
    ScrapeOptions {
        base_url: BASE_URL.to_string(),
        concurrency: 2,
        delay: Duration::ZERO..=Duration::ZERO,
        today: NaiveDate::from_ymd_opt(2020, 10, 1).unwrap(),
    }
}

fn fetcher() -> MemoryFetcher {
    let sul = fixture("summary.html")
        .replace("5.86B", "2500M")
        .replace("JB Hi-Fi Limited (JBH.AX)", "Super Retail Group Limited (SUL.AX)");

    MemoryFetcher::default()
        .with_ticker("JBH.AX", fixture("summary.html"))
        .with_ticker("SUL.AX", sul)
        .with_ticker("RMD.AX", fixture("summary_no_market_cap.html"))
}

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn statements_merge_on_the_period() {
    let record = aggregate(&fetcher(), "JBH.AX", &options()).await.unwrap();
    let frame = &record.frame;

    // summary first, then each statement's unseen periods in page order
    assert_eq!(
        frame.dates(),
        vec!["01/10/2020", "30/6/2020", "30/6/2019", "30/6/2018", "ttm", "30/6/2017"]
    );

    assert_eq!(&frame.columns()[..3], &[SYMBOL, "Name", "MarketCap"]);
    for row in 0..frame.len() {
        assert_eq!(frame.get(row, SYMBOL), Some(Value::Text("JBH.AX".into())));
    }

    // the later statement's repeat of a label is suffixed
    assert!(frame.columns().iter().any(|c| c == "Net income"));
    assert!(frame.columns().iter().any(|c| c == "Net income - Cash Flow"));
    assert!(frame.columns().iter().any(|c| c == "Deferred revenues (duplicate)"));

    // a line item with no value in any period is dropped
    assert!(!frame.columns().iter().any(|c| c == "Minority interest"));

    // periods a statement does not cover are absent
    assert_eq!(frame.get(0, "Total current assets"), None);
    assert_eq!(frame.get(4, "Goodwill"), None);
    assert_eq!(frame.get(5, "Free cash flow"), Some(Value::Number(200_000.0)));
    assert_eq!(frame.get(5, "Total revenue"), None);
    assert_eq!(frame.get(0, "MarketCap"), Some(Value::Integer(5_860_000)));
}

#[tokio::test]
async fn missing_market_cap_keeps_the_ticker() {
    let record = aggregate(&fetcher(), "RMD.AX", &options()).await.unwrap();
    assert_eq!(
        record.frame.get(0, "Name"),
        Some(Value::Text("ResMed Inc. (RMD.AX)".into()))
    );
    assert_eq!(record.frame.get(0, "MarketCap"), None);
}

#[tokio::test]
async fn unreachable_statement_fails_the_ticker() {
    let mut fetcher = fetcher();
    fetcher
        .pages
        .remove(&Statement::CashFlow.url(BASE_URL, "JBH.AX"));
    match aggregate(&fetcher, "JBH.AX", &options()).await {
        Err(SpiderError::StructureNotFound { url }) => assert!(url.ends_with("cash-flow?p=JBH.AX")),
        other => panic!("expected a missing page, got {other:?}"),
    }

    fetcher.pages.insert(
        Statement::CashFlow.url(BASE_URL, "JBH.AX"),
        fixture("blocked.html"),
    );
    match aggregate(&fetcher, "JBH.AX", &options()).await {
        Err(SpiderError::StructureNotFound { url }) => assert!(url.ends_with("cash-flow?p=JBH.AX")),
        other => panic!("expected a missing structure, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_tickers_do_not_stop_the_batch() {
    let symbols = symbols(&["JBH.AX", "BAD.AX", "SUL.AX", "RMD.AX"]);
    let report = scrape(&fetcher(), &symbols, &options(), &Progress::hidden()).await;

    let collected: Vec<&str> = report.records.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(collected, vec!["JBH.AX", "SUL.AX", "RMD.AX"]);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "BAD.AX");

    let combined = report.combined().unwrap();
    assert_eq!(combined.len(), 18);
    assert!((0..combined.len())
        .all(|row| combined.get(row, SYMBOL) != Some(Value::Text("BAD.AX".into()))));
}

#[tokio::test]
async fn slow_ticker_keeps_its_place() {
    let mut fetcher = fetcher();
    fetcher
        .latency
        .insert("JBH.AX".to_string(), Duration::from_millis(150));

    let symbols = symbols(&["JBH.AX", "SUL.AX", "RMD.AX"]);
    let report = scrape(&fetcher, &symbols, &options(), &Progress::hidden()).await;

    let collected: Vec<&str> = report.records.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(collected, vec!["JBH.AX", "SUL.AX", "RMD.AX"]);
}

#[tokio::test]
async fn unparseable_market_cap_keeps_the_ticker() {
    let summary = fixture("summary.html").replace("5.86B", "N/A");
    let fetcher = MemoryFetcher::default().with_ticker("JBH.AX", summary);

    let record = aggregate(&fetcher, "JBH.AX", &options()).await.unwrap();
    assert_eq!(
        record.frame.get(0, "Name"),
        Some(Value::Text("JB Hi-Fi Limited (JBH.AX)".into()))
    );
    assert_eq!(record.frame.get(0, "MarketCap"), None);

    let fundamentals = compute(&record.frame, &FundamentalsOptions::default());
    assert_eq!(fundamentals.len(), 1);
    assert_eq!(fundamentals[0].market_cap, None);
    assert_eq!(fundamentals[0].enterprise_value, None);
}

#[tokio::test]
async fn ranks_and_workbook() {
    let symbols = symbols(&["JBH.AX", "SUL.AX", "RMD.AX"]);
    let report = scrape(&fetcher(), &symbols, &options(), &Progress::hidden()).await;
    let combined = report.combined().unwrap();

    let fundamentals = compute(&combined, &FundamentalsOptions::default());
    assert_eq!(fundamentals.len(), 3);

    let jbh = &fundamentals[0];
    assert_eq!(jbh.market_cap, Some(5_860_000.0));
    assert_eq!(jbh.ebit, Some(560_000.0));
    assert_eq!(jbh.enterprise_value, Some(7_861_000.0));
    assert_eq!(jbh.net_working_capital, Some(260_000.0));
    assert_eq!(jbh.net_assets, Some(932_400.0));
    assert!((jbh.earnings_yield.unwrap() - 560_000.0 / 7_861_000.0).abs() < 1e-12);
    assert!((jbh.return_on_capital.unwrap() - 560_000.0 / 1_192_400.0).abs() < 1e-12);

    // the latest fiscal year is the same row here: 30/6/2020
    let latest = compute(
        &combined,
        &FundamentalsOptions {
            period: PeriodSelection::LatestFiscal,
            ..Default::default()
        },
    );
    assert_eq!(latest, fundamentals);

    let ranked = rank(fundamentals).unwrap();
    let order: Vec<(&str, usize, usize, usize)> = ranked
        .iter()
        .map(|r| {
            (
                r.fundamentals.symbol.as_str(),
                r.earnings_yield_rank,
                r.return_on_capital_rank,
                r.aggregate_rank,
            )
        })
        .collect();
    assert_eq!(
        order,
        vec![("JBH.AX", 2, 1, 3), ("SUL.AX", 1, 2, 3), ("RMD.AX", 3, 3, 6)]
    );

    let fundamentals: Vec<_> = ranked.iter().map(|r| r.fundamentals.clone()).collect();
    let tmp = tempfile::tempdir().unwrap();
    let dir = write_workbook(tmp.path().join("2020-10-01"), &combined, &fundamentals, &ranked)
        .await
        .unwrap();

    let data = std::fs::read_to_string(dir.join(DATA_SHEET)).unwrap();
    assert!(data.starts_with("Date,Symbol,Name,MarketCap,"));
    assert_eq!(data.lines().count(), 1 + combined.len());

    let fundamentals = std::fs::read_to_string(dir.join(FUNDAMENTALS_SHEET)).unwrap();
    assert!(fundamentals.starts_with("Symbol,Name,MarketCap,"));
    assert_eq!(fundamentals.lines().count(), 4);

    let ranks = std::fs::read_to_string(dir.join(RANKS_SHEET)).unwrap();
    let mut lines = ranks.lines();
    assert!(lines.next().unwrap().ends_with("EBIT/EV Rank,RoC Rank,Aggregate Rank"));
    assert!(lines.next().unwrap().starts_with("JBH.AX,"));
    assert!(lines.last().unwrap().starts_with("RMD.AX,ResMed Inc. (RMD.AX),,"));
}
