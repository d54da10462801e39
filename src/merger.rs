use crate::frame_ops::FrameOps;
use crate::models::{PipelineConfig, TimestampStrictness};
use anyhow::{bail, Result};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse a raw timestamp string to epoch milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            let dt = date.and_hms_opt(0, 0, 0).unwrap();
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    None
}

/// Rewrite a string timestamp column as `Datetime(Milliseconds)`.
///
/// A column that is already a datetime passes through untouched. In `Strict`
/// mode the first unparseable value aborts; in `Coerce` mode it becomes null.
pub fn normalize_timestamps(
    df: &DataFrame,
    column: &str,
    strictness: TimestampStrictness,
) -> Result<DataFrame> {
    let series = df.column(column)?;
    match series.dtype() {
        DataType::Datetime(_, _) => Ok(df.clone()),
        DataType::Utf8 => {
            let raw = series.utf8()?;
            let mut stamps: Vec<Option<i64>> = Vec::with_capacity(raw.len());
            for (idx, value) in raw.into_iter().enumerate() {
                match value.map(parse_timestamp) {
                    Some(Some(ms)) => stamps.push(Some(ms)),
                    Some(None) => match strictness {
                        TimestampStrictness::Strict => bail!(
                            "unparseable timestamp {:?} in column '{}' at row {}",
                            raw.get(idx).unwrap_or_default(),
                            column,
                            idx
                        ),
                        TimestampStrictness::Coerce => stamps.push(None),
                    },
                    None => stamps.push(None),
                }
            }

            let stamped = Series::new(column, stamps)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
            let mut out = df.clone();
            out.with_column(stamped)?;
            Ok(out)
        }
        other => bail!("column '{column}' has dtype {other}, expected strings or datetimes"),
    }
}

pub struct Merger {
    config: PipelineConfig,
}

impl Merger {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Four-table hierarchical merge of reading and metadata tables.
    ///
    /// The base table carries both keys and stays on the left throughout, so
    /// its rows are always retained.
    pub fn merge_hierarchical(
        &self,
        base: &DataFrame,
        secondary: &DataFrame,
        campus: &DataFrame,
        site_only: &DataFrame,
    ) -> Result<DataFrame> {
        let campus_key = self.config.campus_key.as_str();
        let site_key = self.config.site_key.as_str();

        println!("Starting merge. Base shape: {}", base.shape_display());

        let merged = base.left_join_keyed(secondary, &[campus_key, site_key], None)?;
        println!("After merging secondary readings: {}", merged.shape_display());

        let merged = merged.left_join_keyed(campus, &[campus_key], Some(("_main", "_campus")))?;
        println!("After merging campus data: {}", merged.shape_display());

        // Assumes SiteKey values are unique across all campuses in site_only.
        let merged = merged.left_join_keyed(site_only, &[site_key], Some(("_base", "_site")))?;
        println!("After merging site data: {}", merged.shape_display());

        Ok(merged.with_dense_rows())
    }

    /// Merge generation readings with weather and site details.
    ///
    /// Weather is matched on (CampusKey, Timestamp) exactly; readings sampled
    /// at an offset the weather table does not cover keep null weather
    /// columns rather than snapping to a nearby observation.
    pub fn merge_solar(
        &self,
        generation: &DataFrame,
        weather: &DataFrame,
        site_details: &DataFrame,
    ) -> Result<DataFrame> {
        let campus_key = self.config.campus_key.as_str();
        let site_key = self.config.site_key.as_str();
        let timestamp = self.config.timestamp_col.as_str();

        let generation = normalize_timestamps(generation, timestamp, self.config.strictness)?;
        let weather = normalize_timestamps(weather, timestamp, self.config.strictness)?;

        println!("Merge starting. Base shape: {}", generation.shape_display());

        let merged = generation.left_join_keyed(&weather, &[campus_key, timestamp], None)?;
        println!("After merging weather data: {}", merged.shape_display());

        let merged = merged.left_join_keyed(
            site_details,
            &[campus_key, site_key],
            Some(("_base", "_site_details")),
        )?;
        println!("After merging site details: {}", merged.shape_display());

        Ok(merged.with_dense_rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merger() -> Merger {
        Merger::new(PipelineConfig::default())
    }

    #[test]
    fn parses_common_timestamp_shapes() {
        assert!(parse_timestamp("2024-06-01 12:30:00").is_some());
        assert!(parse_timestamp("2024-06-01T12:30:00").is_some());
        assert!(parse_timestamp("06/01/2024 12:30").is_some());
        assert!(parse_timestamp("2024-06-01").is_some());
        assert!(parse_timestamp("not a time").is_none());
    }

    #[test]
    fn coerce_turns_bad_values_into_nulls() {
        let frame = df!(
            "Timestamp" => &["2024-06-01 10:00:00", "garbage", "2024-06-01 12:00:00"],
        )
        .unwrap();

        let normalized =
            normalize_timestamps(&frame, "Timestamp", TimestampStrictness::Coerce).unwrap();
        let column = normalized.column("Timestamp").unwrap();
        assert!(matches!(column.dtype(), DataType::Datetime(_, _)));
        assert_eq!(column.null_count(), 1);
    }

    #[test]
    fn strict_fails_on_bad_values() {
        let frame = df!("Timestamp" => &["garbage"]).unwrap();
        let result = normalize_timestamps(&frame, "Timestamp", TimestampStrictness::Strict);
        assert!(result.is_err());
    }

    #[test]
    fn hierarchical_merge_keeps_base_rows_and_suffixes_overlap() {
        let base = df!(
            "CampusKey" => &[1i64, 1, 2],
            "SiteKey" => &[10i64, 11, 20],
            "Name" => &["reading-a", "reading-b", "reading-c"],
            "SolarGeneration" => &[1.0, 2.0, 3.0],
        )
        .unwrap();
        let secondary = df!(
            "CampusKey" => &[1i64, 2],
            "SiteKey" => &[10i64, 20],
            "InverterTemp" => &[40.0, 45.0],
        )
        .unwrap();
        let campus = df!(
            "CampusKey" => &[1i64, 2],
            "Name" => &["North", "South"],
        )
        .unwrap();
        let site_only = df!(
            "SiteKey" => &[10i64, 11, 20],
            "Name" => &["A", "B", "C"],
            "kWp" => &[5.0, 7.5, 10.0],
        )
        .unwrap();

        let merged = merger()
            .merge_hierarchical(&base, &secondary, &campus, &site_only)
            .unwrap();

        assert_eq!(merged.height(), 3);
        // One secondary row per base key, so the unmatched site keeps nulls.
        assert_eq!(merged.column("InverterTemp").unwrap().null_count(), 1);
        let names = merged.get_column_names();
        // Campus overlap is resolved at step 2, so step 3 sees no clash and
        // the site table's Name column arrives unsuffixed.
        assert!(names.contains(&"Name_main"));
        assert!(names.contains(&"Name_campus"));
        assert!(names.contains(&"Name"));
        assert_eq!(merged.column("kWp").unwrap().null_count(), 0);
    }

    #[test]
    fn solar_merge_leaves_unmatched_weather_null() {
        let generation = df!(
            "CampusKey" => &[1i64, 1, 2],
            "SiteKey" => &[10i64, 10, 20],
            "Timestamp" => &[
                "2024-06-01 10:00:00",
                "2024-06-01 11:00:00",
                "2024-06-01 10:00:00",
            ],
            "SolarGeneration" => &[4.0, 5.0, 6.0],
        )
        .unwrap();
        // No 11:00 observation for campus 1; exact matching only.
        let weather = df!(
            "CampusKey" => &[1i64, 2],
            "Timestamp" => &["2024-06-01 10:00:00", "2024-06-01 10:00:00"],
            "AirTemperature" => &[21.0, 24.0],
        )
        .unwrap();
        let site_details = df!(
            "CampusKey" => &[1i64, 2],
            "SiteKey" => &[10i64, 20],
            "kWp" => &[5.0, 10.0],
        )
        .unwrap();

        let merged = merger()
            .merge_solar(&generation, &weather, &site_details)
            .unwrap();

        assert_eq!(merged.height(), 3);
        assert_eq!(merged.column("AirTemperature").unwrap().null_count(), 1);
        assert_eq!(merged.column("kWp").unwrap().null_count(), 0);
    }
}
