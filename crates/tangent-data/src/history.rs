//! Date alignment of per-instrument price frames.
//!
//! Each instrument arrives as its own frame (date, adjusted_close). Only dates
//! present for every instrument, and for the benchmark when one is given, are
//! kept; this is an inner join on `date`.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::debug;

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_FROM_CE: i32 = 719_163;
const BENCHMARK_COLUMN: &str = "benchmark";

/// Adjusted closes on the dates shared by all instruments.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedCloses {
    /// Shared dates, ascending
    pub dates: Vec<NaiveDate>,
    /// Instrument symbols in column order
    pub symbols: Vec<String>,
    /// Adjusted closes, dates × instruments
    pub closes: Array2<f64>,
    /// Benchmark adjusted closes on the same dates
    pub benchmark: Option<Array1<f64>>,
}

/// Inner-join instrument frames (and an optional benchmark frame) on date.
///
/// # Arguments
/// * `instruments` - `(symbol, frame)` pairs; frames need `date` and `adjusted_close`
/// * `benchmark` - Optional benchmark frame with the same columns
pub fn align_closes(
    instruments: &[(String, DataFrame)],
    benchmark: Option<&DataFrame>,
) -> Result<AlignedCloses> {
    let Some((_, first)) = instruments.first() else {
        return Err(DataError::Parse("no instruments to align".to_string()));
    };

    let column = |i: usize| format!("asset_{}", i);
    let select = |df: &DataFrame, name: &str| {
        df.clone()
            .lazy()
            .select([col("date"), col("adjusted_close").alias(name)])
    };

    let mut joined = select(first, &column(0));
    for (i, (_, df)) in instruments.iter().enumerate().skip(1) {
        joined = joined.join(
            select(df, &column(i)),
            [col("date")],
            [col("date")],
            JoinArgs::new(JoinType::Inner),
        );
    }
    if let Some(df) = benchmark {
        joined = joined.join(
            select(df, BENCHMARK_COLUMN),
            [col("date")],
            [col("date")],
            JoinArgs::new(JoinType::Inner),
        );
    }

    let df = joined
        .sort(["date"], SortMultipleOptions::default())
        .collect()?;

    let dates = extract_dates(&df)?;
    let mut closes = Array2::zeros((dates.len(), instruments.len()));
    for i in 0..instruments.len() {
        let values = extract_values(&df, &column(i))?;
        closes.column_mut(i).assign(&Array1::from(values));
    }
    let benchmark = match benchmark {
        Some(_) => Some(Array1::from(extract_values(&df, BENCHMARK_COLUMN)?)),
        None => None,
    };

    debug!(
        instruments = instruments.len(),
        dates = dates.len(),
        "aligned closes"
    );

    Ok(AlignedCloses {
        dates,
        symbols: instruments.iter().map(|(s, _)| s.clone()).collect(),
        closes,
        benchmark,
    })
}

fn extract_dates(df: &DataFrame) -> Result<Vec<NaiveDate>> {
    let days = df.column("date")?.cast(&DataType::Int32)?;
    days.i32()?
        .into_iter()
        .map(|day| {
            day.and_then(|d| NaiveDate::from_num_days_from_ce_opt(d + UNIX_EPOCH_FROM_CE))
                .ok_or_else(|| DataError::Parse("missing or invalid date".to_string()))
        })
        .collect()
}

fn extract_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    df.column(name)?
        .f64()?
        .into_iter()
        .map(|v| v.ok_or_else(|| DataError::Parse(format!("null value in {}", name))))
        .collect()
}
