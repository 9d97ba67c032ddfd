use crate::error::Result;
use polars::prelude::{
    col, concat_lf_diagonal, AnyValue, Column, DataFrame, IntoLazy, JoinArgs, JoinCoalesce,
    JoinType, NamedFrom, PlSmallStr, Series, SortMultipleOptions, UnionArgs,
};
use std::fmt;

/// Name of the key column every [`Frame`] is indexed by.
pub const DATE: &str = "Date";

/// Name of the column holding the ticker symbol, once statements are merged.
pub const SYMBOL: &str = "Symbol";

// scratch columns restoring row order after a join
const LEFT_ORDER: &str = "__left_order";
const RIGHT_ORDER: &str = "__right_order";

/// A single cell value; absence is a null in the frame, never a sentinel.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Integer(i64),
    Text(String),
}

impl Value {
    /// Numeric view of the value; text is not numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Integer(i) => Some(*i as f64),
            Value::Text(_) => None,
        }
    }

    fn from_any(value: AnyValue<'_>) -> Option<Value> {
        match value {
            AnyValue::Null => None,
            AnyValue::String(text) => Some(Value::Text(text.to_string())),
            AnyValue::StringOwned(text) => Some(Value::Text(text.to_string())),
            AnyValue::Float64(n) => Some(Value::Number(n)),
            AnyValue::Float32(n) => Some(Value::Number(n as f64)),
            AnyValue::Int64(i) => Some(Value::Integer(i)),
            other => other.extract::<f64>().map(Value::Number),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Text(text) => f.write_str(text),
        }
    }
}

/// A date-indexed table of named columns, over a polars [`DataFrame`].
///
/// The first column is always the `Date` key; [`Frame::columns`] lists the others, i.e. the line
/// items (plus `Symbol`, once attached). Absent cells are nulls.
#[derive(Clone, Debug, Default)]
pub struct Frame {
    df: DataFrame,
}

impl Frame {
    /// A frame of `dates` and typed value columns, each as long as `dates`.
    pub fn from_columns(dates: Vec<String>, columns: Vec<Series>) -> Result<Self> {
        let mut all: Vec<Column> = vec![Column::new(DATE.into(), dates)];
        all.extend(columns.into_iter().map(Column::from));
        Ok(Self {
            df: DataFrame::new(all)?,
        })
    }

    /// A frame from loosely typed rows; short rows are padded with absent cells.
    ///
    /// A column holding any text is text, one holding only integers is integral, and anything
    /// else is floating point.
    pub fn from_rows(columns: &[&str], rows: Vec<(String, Vec<Option<Value>>)>) -> Result<Self> {
        let mut cells: Vec<Vec<Option<Value>>> = vec![vec![]; columns.len()];
        let mut dates = Vec::with_capacity(rows.len());
        for (date, mut row) in rows {
            row.resize(columns.len(), None);
            for (column, cell) in cells.iter_mut().zip(row) {
                column.push(cell);
            }
            dates.push(date);
        }

        let series = columns
            .iter()
            .zip(cells)
            .map(|(name, cells)| typed_series(name, cells))
            .collect();
        Self::from_columns(dates, series)
    }

    /// The value columns, `Date` excluded.
    pub fn columns(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.as_str())
            .filter(|name| *name != DATE)
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// The date key of every row, in order.
    pub fn dates(&self) -> Vec<String> {
        let Ok(dates) = self.df.column(DATE).and_then(|dates| dates.str()) else {
            return vec![];
        };
        dates
            .into_iter()
            .map(|date| date.unwrap_or_default().to_string())
            .collect()
    }

    pub fn date(&self, row: usize) -> Option<String> {
        match self.get(row, DATE)? {
            Value::Text(date) => Some(date),
            _ => None,
        }
    }

    /// The value at (`row`, `column`), or `None` when either is unknown or the cell is null.
    pub fn get(&self, row: usize, column: &str) -> Option<Value> {
        let series = self.df.column(column).ok()?.as_materialized_series();
        Value::from_any(series.get(row).ok()?)
    }

    pub fn data_frame(&self) -> &DataFrame {
        &self.df
    }

    /// Full outer join of `other` onto `self` on the date key.
    ///
    /// Dates are the union of both frames, `self`'s first and then `other`'s unseen ones, each in
    /// their original order. A column of `other` whose name already exists in `self` is renamed
    /// with `suffix` appended. Cells with no counterpart are null, not zero.
    pub fn outer_join(&self, other: &Frame, suffix: &str) -> Result<Frame> {
        let args = JoinArgs::new(JoinType::Full)
            .with_suffix(Some(suffix.into()))
            .with_coalesce(JoinCoalesce::CoalesceColumns);
        let order = SortMultipleOptions::default()
            .with_nulls_last(true)
            .with_maintain_order(true);

        let joined = self
            .df
            .clone()
            .lazy()
            .with_row_index(LEFT_ORDER, None)
            .join(
                other.df.clone().lazy().with_row_index(RIGHT_ORDER, None),
                [col(DATE)],
                [col(DATE)],
                args,
            )
            .sort_by_exprs([col(LEFT_ORDER), col(RIGHT_ORDER)], order)
            .collect()?;

        Ok(Frame {
            df: joined.drop(LEFT_ORDER)?.drop(RIGHT_ORDER)?,
        })
    }

    /// Remove every column that has no value in any row.
    pub fn drop_empty_columns(self) -> Result<Frame> {
        let height = self.df.height();
        let keep: Vec<PlSmallStr> = self
            .df
            .get_columns()
            .iter()
            .filter(|column| column.name().as_str() == DATE || column.null_count() < height)
            .map(|column| column.name().clone())
            .collect();
        Ok(Frame {
            df: self.df.select(keep)?,
        })
    }

    /// Insert a text column at value position `index`, holding `value` in every row.
    pub fn insert_column(&mut self, index: usize, name: &str, value: &str) -> Result<()> {
        let index = (index + 1).min(self.df.width());
        let column = Column::new(name.into(), vec![value; self.df.height()]);
        self.df.insert_column(index, column)?;
        Ok(())
    }

    /// Stack frames on top of each other; columns are the union, in order of first appearance,
    /// and missing ones are null. Clashing types widen to their common supertype.
    pub fn concat<'a>(frames: impl IntoIterator<Item = &'a Frame>) -> Result<Frame> {
        let frames: Vec<_> = frames.into_iter().map(|f| f.df.clone().lazy()).collect();
        if frames.is_empty() {
            return Ok(Frame::default());
        }

        let args = UnionArgs {
            to_supertypes: true,
            ..Default::default()
        };
        Ok(Frame {
            df: concat_lf_diagonal(frames, args)?.collect()?,
        })
    }
}

fn typed_series(name: &str, cells: Vec<Option<Value>>) -> Series {
    let any_text = cells.iter().flatten().any(|v| matches!(v, Value::Text(_)));
    let integral = cells.iter().flatten().next().is_some()
        && cells.iter().flatten().all(|v| matches!(v, Value::Integer(_)));

    if any_text {
        let text: Vec<Option<String>> = cells
            .iter()
            .map(|c| c.as_ref().map(|v| v.to_string()))
            .collect();
        Series::new(name.into(), text)
    } else if integral {
        let integers: Vec<Option<i64>> = cells
            .iter()
            .map(|c| match c {
                Some(Value::Integer(i)) => Some(*i),
                _ => None,
            })
            .collect();
        Series::new(name.into(), integers)
    } else {
        let numbers: Vec<Option<f64>> = cells
            .iter()
            .map(|c| c.as_ref().and_then(Value::as_f64))
            .collect();
        Series::new(name.into(), numbers)
    }
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////
