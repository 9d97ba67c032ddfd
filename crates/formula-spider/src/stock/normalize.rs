use super::extract::RawRow;
use crate::error::{Result, SpiderError};
use crate::frame::{Frame, DATE};
use polars::prelude::{NamedFrom, Series};
use tracing::{trace, warn};

/// A statement reshaped into periods: each row is one period, each column one line item.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatementTable {
    pub columns: Vec<String>,
    pub rows: Vec<StatementRow>,
}

/// The line-item values of a single period; `None` where the page had no value.
#[derive(Clone, Debug, PartialEq)]
pub struct StatementRow {
    pub date: String,
    pub values: Vec<Option<f64>>,
}

/// Transpose scraped rows into a [`StatementTable`].
///
/// The first row is the header: its label (e.g. "Breakdown") becomes the `Date` key, and its
/// remaining cells the periods. Every other row's label becomes a column, its cells parsed as
/// numbers. A value that does not parse violates the shape of the table, and fails the whole
/// statement with [`SpiderError::MalformedValue`].
pub fn normalize(rows: &[RawRow]) -> Result<StatementTable> {
    let (header, body) = rows.split_first().ok_or(SpiderError::StructureNotFound {
        url: String::new(),
    })?;

    let width = rows.iter().map(|row| row.len()).max().unwrap_or(0);
    let periods: Vec<Option<&str>> = (1..width)
        .map(|i| header.get(i).and_then(|cell| cell.as_deref()))
        .collect();
    trace!("normalizing {} line items over {} periods", body.len(), periods.len());

    let mut columns: Vec<String> = vec![];
    let mut values: Vec<Vec<Option<f64>>> = vec![vec![]; periods.len()];
    for row in body {
        let Some(label) = row.first().and_then(|cell| cell.as_deref()) else {
            warn!("skipping unlabelled statement row: {row:?}");
            continue;
        };

        for (i, period) in values.iter_mut().enumerate() {
            let cell = row.get(i + 1).and_then(|cell| cell.as_deref());
            period.push(cell.map(|text| parse_number(label, text)).transpose()?);
        }
        columns.push(label.to_string());
    }

    let mut table = StatementTable {
        columns,
        rows: vec![],
    };
    for (date, values) in periods.into_iter().zip(values) {
        match date {
            Some(date) => table.rows.push(StatementRow {
                date: date.to_string(),
                values,
            }),
            None => warn!("skipping period without a date"),
        }
    }

    Ok(table)
}

/// Parse a localized figure, e.g. `"1,234.5"`.
pub(crate) fn parse_number(column: &str, text: &str) -> Result<f64> {
    text.replace(',', "")
        .trim()
        .parse::<f64>()
        .map_err(|_| SpiderError::MalformedValue {
            column: column.to_string(),
            value: text.to_string(),
        })
}

impl StatementTable {
    /// The values of line item `column`, one per period.
    pub fn column(&self, column: &str) -> Option<Vec<Option<f64>>> {
        let index = self.columns.iter().position(|c| c == column)?;
        Some(self.rows.iter().map(|row| row.values[index]).collect())
    }

    /// Transpose back into scraped rows: a `Date` header row, then one row per line item.
    pub fn to_raw_rows(&self) -> Vec<RawRow> {
        let mut header: RawRow = vec![Some(DATE.to_string())];
        header.extend(self.rows.iter().map(|row| Some(row.date.clone())));

        let mut rows = vec![header];
        for (i, column) in self.columns.iter().enumerate() {
            let mut raw: RawRow = vec![Some(column.clone())];
            raw.extend(
                self.rows
                    .iter()
                    .map(|row| row.values[i].map(|value| value.to_string())),
            );
            rows.push(raw);
        }
        rows
    }

    /// The table as a date-indexed [`Frame`], one float column per line item.
    pub fn to_frame(&self) -> Result<Frame> {
        let dates = self.rows.iter().map(|row| row.date.clone()).collect();
        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let values: Vec<Option<f64>> = self.rows.iter().map(|row| row.values[i]).collect();
                Series::new(column.as_str().into(), values)
            })
            .collect();
        Frame::from_columns(dates, columns)
    }
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////
