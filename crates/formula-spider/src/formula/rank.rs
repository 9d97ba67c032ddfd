use super::fundamentals::FundamentalsRecord;
use crate::error::Result;
use polars::prelude::{col, Column, DataFrame, IntoLazy, SortMultipleOptions};
use tracing::debug;

const INDEX: &str = "index";
const KEY: &str = "key";

/// A ticker's fundamentals with its place on each ranking.
#[derive(Clone, Debug, PartialEq)]
pub struct RankedRecord {
    pub fundamentals: FundamentalsRecord,

    /// 1 = highest EBIT/EV.
    pub earnings_yield_rank: usize,

    /// 1 = highest return on capital.
    pub return_on_capital_rank: usize,

    /// Sum of both ranks; lower is more attractive.
    pub aggregate_rank: usize,
}

/// Rank tickers by earnings yield and by return on capital, independently, and order them by the
/// sum of both ranks.
///
/// Both passes and the final ordering are stable sorts, so ties keep the input order. A missing or
/// non-finite ratio sorts to the end of its pass.
pub fn rank(fundamentals: Vec<FundamentalsRecord>) -> Result<Vec<RankedRecord>> {
    let earnings_yield: Vec<Option<f64>> = fundamentals.iter().map(|f| f.earnings_yield).collect();
    let return_on_capital: Vec<Option<f64>> =
        fundamentals.iter().map(|f| f.return_on_capital).collect();

    let earnings_yield = positions(&earnings_yield)?;
    let return_on_capital = positions(&return_on_capital)?;

    let mut ranked: Vec<RankedRecord> = fundamentals
        .into_iter()
        .zip(earnings_yield.into_iter().zip(return_on_capital))
        .map(|(fundamentals, (ey, roc))| RankedRecord {
            fundamentals,
            earnings_yield_rank: ey,
            return_on_capital_rank: roc,
            aggregate_rank: ey + roc,
        })
        .collect();

    ranked.sort_by_key(|record| record.aggregate_rank);
    debug!("ranked {} tickers", ranked.len());
    Ok(ranked)
}

/// The 1-based rank of every key, highest first; non-finite keys count as missing.
fn positions(keys: &[Option<f64>]) -> Result<Vec<usize>> {
    let defined: Vec<Option<f64>> = keys.iter().map(|k| k.filter(|v| v.is_finite())).collect();
    let index: Vec<u32> = (0..keys.len() as u32).collect();

    let frame = DataFrame::new(vec![
        Column::new(INDEX.into(), index),
        Column::new(KEY.into(), defined),
    ])?;
    let sorted = frame
        .lazy()
        .sort_by_exprs(
            [col(KEY)],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_nulls_last(true)
                .with_maintain_order(true),
        )
        .collect()?;

    let mut ranks = vec![0; keys.len()];
    for (position, index) in sorted.column(INDEX)?.u32()?.into_iter().enumerate() {
        if let Some(index) = index {
            ranks[index as usize] = position + 1;
        }
    }
    Ok(ranks)
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////
