use crate::error::{Result, SpiderError};
use crate::frame::Frame;
use polars::prelude::{NamedFrom, Series};
use chrono::NaiveDate;
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};

/// Market caps are stored in thousands of the quote currency, the unit the statement pages report
/// every figure in; enterprise value can then be computed without rescaling.
pub const CANONICAL_UNIT: f64 = 1_000.0;

/// Date format of the period keys, shared with the statement pages.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Label of the market cap pair on the summary page.
const MARKET_CAP: &str = "Market cap";

lazy_static! {
    static ref NAME_REGION: Selector =
        Selector::parse(r#"div[class*="D(ib)"]"#).expect("name selector");
    static ref CAP_REGION: Selector =
        Selector::parse(r#"tr[class*="Bxz(bb)"]"#).expect("market cap selector");
    static ref HEADING: Selector = Selector::parse("h1").expect("heading selector");
    static ref SPAN: Selector = Selector::parse("span").expect("span selector");
}

/// The quote summary of one ticker, dated by the caller so it lines up with statement periods.
#[derive(Clone, Debug, PartialEq)]
pub struct SummaryRecord {
    pub date: NaiveDate,
    pub name: Option<String>,
    /// In thousands; see [`CANONICAL_UNIT`].
    pub market_cap: Option<i64>,
}

impl SummaryRecord {
    /// The record as a single-row [`Frame`] with `Name` and `MarketCap` columns.
    pub fn to_frame(&self) -> Result<Frame> {
        Frame::from_columns(
            vec![self.date.format(DATE_FORMAT).to_string()],
            vec![
                Series::new("Name".into(), vec![self.name.clone()]),
                Series::new("MarketCap".into(), vec![self.market_cap]),
            ],
        )
    }
}

/// Scrape the company name and market cap from a quote summary page.
///
/// The name is best effort; the market cap is not, and its absence fails with
/// [`SpiderError::MarketCapNotFound`].
pub fn extract_summary(markup: &str, date: NaiveDate) -> Result<SummaryRecord> {
    let document = Html::parse_document(markup);
    let name = name(&document);
    let market_cap = market_cap(&document)?;
    debug!("summary extracted: {name:?}, market cap {market_cap}");

    Ok(SummaryRecord {
        date,
        name,
        market_cap: Some(market_cap),
    })
}

/// Scrape only the company name, when the market cap is known to be missing.
pub fn extract_name(markup: &str) -> Option<String> {
    name(&Html::parse_document(markup))
}

fn name(document: &Html) -> Option<String> {
    for region in document.select(&NAME_REGION) {
        for child in region
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "div")
        {
            if let Some(heading) = child.select(&HEADING).find_map(first_text) {
                return Some(heading.replace(',', ""));
            }
        }
    }
    trace!("no name heading found");
    None
}

fn market_cap(document: &Html) -> Result<i64> {
    for row in document.select(&CAP_REGION) {
        let cells: Vec<ElementRef<'_>> = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "td")
            .collect();
        let [label, figure] = cells.as_slice() else {
            continue;
        };

        let is_market_cap = span_text(*label)
            .map(|text| text.replace(',', "") == MARKET_CAP)
            .unwrap_or(false);
        if is_market_cap {
            let figure = span_text(*figure).ok_or(SpiderError::MalformedValue {
                column: MARKET_CAP.to_string(),
                value: String::new(),
            })?;
            return parse_market_cap(&figure);
        }
    }
    Err(SpiderError::MarketCapNotFound)
}

/// Convert a market cap figure such as `"2.5B"` into [`CANONICAL_UNIT`]s.
///
/// `T`, `B`, `M` and `K` suffixes scale by their power of ten; an unsuffixed figure is read in
/// whole currency units. The result is rounded to the nearest unit.
///
/// ```rust
/// use formula_spider::stock::summary::parse_market_cap;
///
/// assert_eq!(parse_market_cap("2.5B").unwrap(), 2_500_000);
/// assert_eq!(parse_market_cap("2500M").unwrap(), 2_500_000);
/// ```
pub fn parse_market_cap(figure: &str) -> Result<i64> {
    let cleaned = figure.replace(',', "");
    let cleaned = cleaned.trim();
    let (number, scale) = match cleaned.chars().last() {
        Some('T') => (&cleaned[..cleaned.len() - 1], 1e12),
        Some('B') => (&cleaned[..cleaned.len() - 1], 1e9),
        Some('M') => (&cleaned[..cleaned.len() - 1], 1e6),
        Some('K') | Some('k') => (&cleaned[..cleaned.len() - 1], 1e3),
        _ => (cleaned, 1.0),
    };

    let value = number
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or(SpiderError::MalformedValue {
            column: MARKET_CAP.to_string(),
            value: figure.to_string(),
        })?;

    Ok((value * scale / CANONICAL_UNIT).round() as i64)
}

fn span_text(cell: ElementRef<'_>) -> Option<String> {
    cell.select(&SPAN).find_map(first_text)
}

fn first_text(el: ElementRef<'_>) -> Option<String> {
    el.children().find_map(|node| {
        node.value()
            .as_text()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    })
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////
