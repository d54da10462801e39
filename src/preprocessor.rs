use crate::frame_ops::FrameOps;
use crate::merger::normalize_timestamps;
use crate::models::{PipelineConfig, TimestampStrictness};
use anyhow::Result;
use chrono::{DateTime, Datelike, Timelike, Utc};
use polars::prelude::*;
use std::f64::consts::TAU;

const DAYLIGHT_START_HOUR: u32 = 6;
const DAYLIGHT_END_HOUR: u32 = 20;
const HOURS_PER_DAY: f64 = 24.0;
const MONTHS_PER_YEAR: f64 = 12.0;

/// Fill nulls by linear interpolation over row order.
///
/// Interior gaps are interpolated between their valid neighbors; leading and
/// trailing nulls take the nearest valid value. A sequence with no valid
/// values is returned unchanged.
fn interpolate_linear(mut values: Vec<Option<f64>>) -> Vec<Option<f64>> {
    let Some(first) = values.iter().position(|v| v.is_some()) else {
        return values;
    };
    let last = values.iter().rposition(|v| v.is_some()).unwrap();

    let first_value = values[first].unwrap();
    for slot in values.iter_mut().take(first) {
        *slot = Some(first_value);
    }
    let last_value = values[last].unwrap();
    for slot in values.iter_mut().skip(last + 1) {
        *slot = Some(last_value);
    }

    let mut prev = first;
    for i in first + 1..=last {
        if values[i].is_some() {
            let gap = i - prev;
            if gap > 1 {
                let start = values[prev].unwrap();
                let end = values[i].unwrap();
                let step = (end - start) / gap as f64;
                for offset in 1..gap {
                    values[prev + offset] = Some(start + step * offset as f64);
                }
            }
            prev = i;
        }
    }

    values
}

pub struct Preprocessor {
    config: PipelineConfig,
}

impl Preprocessor {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the full cleaning chain and derive modeling features.
    pub fn process(&self, df: &DataFrame) -> Result<DataFrame> {
        let cleaned = self.clean_data(df)?;
        let valid = self.filter_valid_sites(&cleaned)?;
        let featured = self.feature_engineering(&valid)?;
        println!(
            "Preprocessing complete. Final shape: {}",
            featured.shape_display()
        );
        Ok(featured)
    }

    /// Drop rows without a target reading, gap-fill weather columns and clip
    /// negative sensor readings to zero.
    ///
    /// Gap filling runs over row order without grouping by site or campus, so
    /// rows must already be sorted by time per entity. At an entity boundary
    /// the interpolation can blend neighboring series.
    pub fn clean_data(&self, df: &DataFrame) -> Result<DataFrame> {
        let target = self.config.target_col.as_str();

        let initial_rows = df.height();
        let mut df = df.filter_not_null(target)?;
        println!(
            "Dropped {} rows with missing target.",
            initial_rows - df.height()
        );

        let present: Vec<String> = self
            .config
            .weather_cols
            .iter()
            .filter(|name| df.get_column_names().contains(&name.as_str()))
            .cloned()
            .collect();
        for name in &present {
            let values: Vec<Option<f64>> = df
                .column(name)?
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .collect();
            let filled = interpolate_linear(values);
            df.with_column(Series::new(name, filled))?;
        }

        let clipped = df
            .lazy()
            .with_column(
                when(col(target).lt(lit(0.0)))
                    .then(lit(0.0))
                    .otherwise(col(target))
                    .alias(target),
            )
            .collect()?;

        Ok(clipped)
    }

    /// Drop rows without capacity metadata.
    pub fn filter_valid_sites(&self, df: &DataFrame) -> Result<DataFrame> {
        let capacity = self.config.capacity_col.as_str();
        let missing = df.column(capacity)?.null_count();
        if missing > 0 {
            println!("Dropping {missing} rows with missing '{capacity}' capacity data.");
            return df.filter_not_null(capacity);
        }
        Ok(df.clone())
    }

    /// Derive calendar and cyclical features from the timestamp column.
    ///
    /// A string timestamp column is coerced first; values that fail to parse
    /// become null and so do their derived features.
    pub fn feature_engineering(&self, df: &DataFrame) -> Result<DataFrame> {
        let timestamp = self.config.timestamp_col.as_str();

        let mut df = if matches!(df.column(timestamp)?.dtype(), DataType::Datetime(_, _)) {
            df.clone()
        } else {
            normalize_timestamps(df, timestamp, TimestampStrictness::Coerce)?
        };

        let stamps: Vec<Option<i64>> = df.column(timestamp)?.datetime()?.into_iter().collect();

        let rows = stamps.len();
        let mut hours: Vec<Option<u32>> = Vec::with_capacity(rows);
        let mut months: Vec<Option<u32>> = Vec::with_capacity(rows);
        let mut days_of_year: Vec<Option<u32>> = Vec::with_capacity(rows);
        let mut years: Vec<Option<i32>> = Vec::with_capacity(rows);
        let mut daylight: Vec<Option<bool>> = Vec::with_capacity(rows);
        let mut hour_sin: Vec<Option<f64>> = Vec::with_capacity(rows);
        let mut hour_cos: Vec<Option<f64>> = Vec::with_capacity(rows);
        let mut month_sin: Vec<Option<f64>> = Vec::with_capacity(rows);
        let mut month_cos: Vec<Option<f64>> = Vec::with_capacity(rows);

        for stamp in stamps {
            match stamp.and_then(DateTime::<Utc>::from_timestamp_millis) {
                Some(dt) => {
                    let hour = dt.hour();
                    let month = dt.month();
                    hours.push(Some(hour));
                    months.push(Some(month));
                    days_of_year.push(Some(dt.ordinal()));
                    years.push(Some(dt.year()));
                    daylight.push(Some(
                        (DAYLIGHT_START_HOUR..=DAYLIGHT_END_HOUR).contains(&hour),
                    ));
                    let hour_angle = TAU * hour as f64 / HOURS_PER_DAY;
                    let month_angle = TAU * month as f64 / MONTHS_PER_YEAR;
                    hour_sin.push(Some(hour_angle.sin()));
                    hour_cos.push(Some(hour_angle.cos()));
                    month_sin.push(Some(month_angle.sin()));
                    month_cos.push(Some(month_angle.cos()));
                }
                None => {
                    hours.push(None);
                    months.push(None);
                    days_of_year.push(None);
                    years.push(None);
                    daylight.push(None);
                    hour_sin.push(None);
                    hour_cos.push(None);
                    month_sin.push(None);
                    month_cos.push(None);
                }
            }
        }

        df.with_column(Series::new("Hour", hours))?;
        df.with_column(Series::new("Month", months))?;
        df.with_column(Series::new("DayOfYear", days_of_year))?;
        df.with_column(Series::new("Year", years))?;
        df.with_column(Series::new("IsDaylight", daylight))?;
        df.with_column(Series::new("hour_sin", hour_sin))?;
        df.with_column(Series::new("hour_cos", hour_cos))?;
        df.with_column(Series::new("month_sin", month_sin))?;
        df.with_column(Series::new("month_cos", month_cos))?;

        Ok(df)
    }
}
