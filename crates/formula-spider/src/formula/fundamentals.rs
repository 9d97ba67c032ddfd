use crate::frame::{Frame, Value, SYMBOL};
use crate::stock::summary::DATE_FORMAT;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap as Map;
use tracing::{debug, trace, warn};

/// Statement labels the fundamentals are read from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineItems {
    pub ebit: String,
    pub current_assets: String,
    pub fixed_assets: String,
    pub current_liabilities: String,
    pub fixed_liabilities: String,
    pub cash: String,
    pub goodwill: String,
    pub intangibles: String,
}

impl Default for LineItems {
    fn default() -> Self {
        Self {
            ebit: "Operating income or loss".to_string(),
            current_assets: "Total current assets".to_string(),
            fixed_assets: "Total non-current assets".to_string(),
            current_liabilities: "Total current liabilities".to_string(),
            fixed_liabilities: "Total non-current liabilities".to_string(),
            cash: "Cash and cash equivalents".to_string(),
            goodwill: "Goodwill".to_string(),
            intangibles: "Intangible assets".to_string(),
        }
    }
}

/// How the "most recent fiscal year" row of a ticker is picked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PeriodSelection {
    /// The second row of the ticker, whatever its date.
    #[default]
    Positional,

    /// The row with the latest period-end date, skipping the first (current) row and `ttm`.
    LatestFiscal,
}

#[derive(Clone, Debug, Default)]
pub struct FundamentalsOptions {
    pub line_items: LineItems,
    pub period: PeriodSelection,
}

/// The figures of one ticker's most recent fiscal year, and what is derived from them.
///
/// Ratios are `None` when one of their inputs is missing, and non-finite when their denominator
/// is zero.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FundamentalsRecord {
    pub symbol: String,
    pub name: Option<String>,
    pub market_cap: Option<f64>,
    pub current_assets: Option<f64>,
    pub fixed_assets: Option<f64>,
    pub current_liabilities: Option<f64>,
    pub fixed_liabilities: Option<f64>,
    pub cash: Option<f64>,
    pub goodwill: f64,
    pub intangibles: f64,
    #[serde(rename = "EBIT")]
    pub ebit: Option<f64>,
    #[serde(rename = "EV")]
    pub enterprise_value: Option<f64>,
    #[serde(rename = "EBIT/EV")]
    pub earnings_yield: Option<f64>,
    #[serde(rename = "NWC")]
    pub net_working_capital: Option<f64>,
    #[serde(rename = "NA")]
    pub net_assets: Option<f64>,
    #[serde(rename = "RoC")]
    pub return_on_capital: Option<f64>,
}

/// Reduce the combined table to one [`FundamentalsRecord`] per ticker.
///
/// Rows are grouped by `Symbol`, keeping the order tickers first appear in. The first row of a
/// group is the current period, holding the name and market cap; the fiscal-year figures come from
/// the row chosen by [`FundamentalsOptions::period`]. Absent goodwill and intangibles count as
/// zero.
pub fn compute(combined: &Frame, options: &FundamentalsOptions) -> Vec<FundamentalsRecord> {
    let mut order: Vec<String> = vec![];
    let mut groups: Map<String, Vec<usize>> = Map::new();
    for i in 0..combined.len() {
        let Some(Value::Text(symbol)) = combined.get(i, SYMBOL) else {
            warn!("skipping row {i} without a symbol");
            continue;
        };
        if !groups.contains_key(&symbol) {
            order.push(symbol.clone());
        }
        groups.entry(symbol).or_default().push(i);
    }

    order
        .iter()
        .map(|symbol| reduce(combined, symbol, &groups[symbol], options))
        .collect()
}

fn reduce(
    combined: &Frame,
    symbol: &str,
    rows: &[usize],
    options: &FundamentalsOptions,
) -> FundamentalsRecord {
    let items = &options.line_items;
    let current = rows[0];
    let fiscal = match options.period {
        PeriodSelection::Positional => rows.get(1).copied(),
        PeriodSelection::LatestFiscal => latest_fiscal(combined, &rows[1..]),
    };
    match fiscal {
        Some(row) => trace!("[{symbol}] fiscal year: {:?}", combined.date(row)),
        None => warn!("[{symbol}] has no fiscal year row"),
    }

    let number = |label: &str| -> Option<f64> {
        fiscal
            .and_then(|row| combined.get(row, label))
            .and_then(|v| v.as_f64())
    };

    let name = match combined.get(current, "Name") {
        Some(Value::Text(name)) => Some(name),
        _ => None,
    };
    let market_cap = combined.get(current, "MarketCap").and_then(|v| v.as_f64());

    let current_assets = number(&items.current_assets);
    let fixed_assets = number(&items.fixed_assets);
    let current_liabilities = number(&items.current_liabilities);
    let fixed_liabilities = number(&items.fixed_liabilities);
    let cash = number(&items.cash);
    let goodwill = number(&items.goodwill).unwrap_or(0.0);
    let intangibles = number(&items.intangibles).unwrap_or(0.0);
    let ebit = number(&items.ebit);

    let enterprise_value =
        enterprise_value(market_cap, current_liabilities, fixed_liabilities, cash);
    let earnings_yield = ratio(ebit, enterprise_value);
    let net_working_capital = difference(current_assets, current_liabilities);
    let net_assets = fixed_assets.map(|assets| assets - goodwill - intangibles);
    let return_on_capital = ratio(ebit, sum(net_working_capital, net_assets));

    debug!("[{symbol}] EBIT/EV {earnings_yield:?}, RoC {return_on_capital:?}");

    FundamentalsRecord {
        symbol: symbol.to_string(),
        name,
        market_cap,
        current_assets,
        fixed_assets,
        current_liabilities,
        fixed_liabilities,
        cash,
        goodwill,
        intangibles,
        ebit,
        enterprise_value,
        earnings_yield,
        net_working_capital,
        net_assets,
        return_on_capital,
    }
}

/// EV = market cap + current liabilities + non-current liabilities - cash.
fn enterprise_value(
    market_cap: Option<f64>,
    current_liabilities: Option<f64>,
    fixed_liabilities: Option<f64>,
    cash: Option<f64>,
) -> Option<f64> {
    Some(market_cap? + current_liabilities? + fixed_liabilities? - cash?)
}

// a zero denominator is not an error: the ratio goes non-finite, and ranks last
fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    Some(numerator? / denominator?)
}

fn difference(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? - b?)
}

fn sum(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? + b?)
}

/// The row with the latest parseable period-end date; `ttm` and other keys never parse.
fn latest_fiscal(combined: &Frame, rows: &[usize]) -> Option<usize> {
    rows.iter()
        .filter_map(|&row| {
            let date = combined.date(row)?;
            NaiveDate::parse_from_str(&date, DATE_FORMAT)
                .ok()
                .map(|date| (date, row))
        })
        .fold(None, |latest: Option<(NaiveDate, usize)>, candidate| match latest {
            Some(best) if best.0 >= candidate.0 => Some(best),
            _ => Some(candidate),
        })
        .map(|(_, row)| row)
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: [&str; 11] = [
        SYMBOL,
        "Name",
        "MarketCap",
        "Total current assets",
        "Total non-current assets",
        "Total current liabilities",
        "Total non-current liabilities",
        "Cash and cash equivalents",
        "Goodwill",
        "Intangible assets",
        "Operating income or loss",
    ];

    type Rows = Vec<(String, Vec<Option<Value>>)>;

    /// An absent figure.
    const NA: f64 = f64::NAN;

    fn current(rows: &mut Rows, symbol: &str, name: &str, market_cap: i64) {
        rows.push((
            "14/05/2021".to_string(),
            vec![
                Some(Value::Text(symbol.into())),
                Some(Value::Text(name.into())),
                Some(Value::Integer(market_cap)),
            ],
        ));
    }

    /// A fiscal-year row; `figures` are CA, FA, CL, FL, cash, goodwill, intangibles and EBIT.
    fn fiscal(rows: &mut Rows, symbol: &str, date: &str, figures: [f64; 8]) {
        let mut cells = vec![Some(Value::Text(symbol.into())), None, None];
        cells.extend(
            figures
                .iter()
                .map(|&f| (!f.is_nan()).then_some(Value::Number(f))),
        );
        rows.push((date.to_string(), cells));
    }

    fn frame(rows: Rows) -> Frame {
        Frame::from_rows(&COLUMNS, rows).unwrap()
    }

    fn combined_rows() -> Rows {
        let mut rows = vec![];
        current(&mut rows, "JBH.AX", "JB Hi-Fi", 5_000);
        fiscal(
            &mut rows,
            "JBH.AX",
            "30/6/2020",
            [2_000.0, 1_500.0, 1_200.0, 300.0, 500.0, 200.0, NA, 600.0],
        );
        fiscal(
            &mut rows,
            "JBH.AX",
            "30/6/2019",
            [1.0, 1.0, 1.0, 1.0, 1.0, NA, NA, 1.0],
        );
        current(&mut rows, "SUL.AX", "Super Retail", 2_000);
        fiscal(
            &mut rows,
            "SUL.AX",
            "30/6/2020",
            [1_000.0, 1_000.0, 1_000.0, 1_000.0, 4_000.0, NA, NA, 100.0],
        );
        rows
    }

    #[test]
    fn derives_magic_formula_figures() {
        let records = compute(&frame(combined_rows()), &FundamentalsOptions::default());
        assert_eq!(records.len(), 2);

        let jbh = &records[0];
        assert_eq!(jbh.symbol, "JBH.AX");
        assert_eq!(jbh.name.as_deref(), Some("JB Hi-Fi"));
        assert_eq!(jbh.market_cap, Some(5_000.0));
        assert_eq!(jbh.intangibles, 0.0);
        // EV = 5000 + 1200 + 300 - 500
        assert_eq!(jbh.enterprise_value, Some(6_000.0));
        assert_eq!(jbh.earnings_yield, Some(0.1));
        assert_eq!(jbh.net_working_capital, Some(800.0));
        assert_eq!(jbh.net_assets, Some(1_300.0));
        assert_eq!(jbh.return_on_capital, Some(600.0 / 2_100.0));
    }

    #[test]
    fn zero_denominators_go_non_finite() {
        let records = compute(&frame(combined_rows()), &FundamentalsOptions::default());
        let sul = &records[1];
        // EV = 2000 + 1000 + 1000 - 4000
        assert_eq!(sul.enterprise_value, Some(0.0));
        assert!(sul.earnings_yield.is_some_and(|ey| !ey.is_finite()));
        assert!(sul.return_on_capital.is_some_and(f64::is_finite));
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let mut rows = combined_rows();
        current(&mut rows, "JBH.AX", "ignored", 1);
        let records = compute(&frame(rows), &FundamentalsOptions::default());
        let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["JBH.AX", "SUL.AX"]);
        assert_eq!(records[0].name.as_deref(), Some("JB Hi-Fi"));
    }

    #[test]
    fn lone_rows_have_no_fiscal_figures() {
        let mut rows = vec![];
        current(&mut rows, "RMD.AX", "ResMed", 40_000);
        let records = compute(&frame(rows), &FundamentalsOptions::default());
        assert_eq!(records[0].market_cap, Some(40_000.0));
        assert_eq!(records[0].ebit, None);
        assert_eq!(records[0].earnings_yield, None);
        assert_eq!(records[0].return_on_capital, None);
    }

    #[test]
    fn latest_fiscal_skips_ttm_and_older_years() {
        let mut rows = vec![];
        current(&mut rows, "DOW.AX", "Downer", 3_000);
        for (date, ebit) in [("30/6/2019", 10.0), ("ttm", 30.0), ("30/6/2020", 20.0)] {
            fiscal(
                &mut rows,
                "DOW.AX",
                date,
                [1.0, 1.0, 1.0, 1.0, 1.0, NA, NA, ebit],
            );
        }
        let frame = frame(rows);

        let positional = compute(&frame, &FundamentalsOptions::default());
        assert_eq!(positional[0].ebit, Some(10.0));

        let options = FundamentalsOptions {
            period: PeriodSelection::LatestFiscal,
            ..Default::default()
        };
        let latest = compute(&frame, &options);
        assert_eq!(latest[0].ebit, Some(20.0));
    }
}
