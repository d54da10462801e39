use anyhow::Result;
use polars::prelude::*;
use std::collections::HashSet;

/// The relational operations the pipeline needs from its table backend.
///
/// Merge and cleaning logic only go through these methods, so the backing
/// representation can change without touching them.
pub trait FrameOps: Sized {
    /// Left-outer join on one or more key columns.
    ///
    /// With `suffixes`, overlapping non-key column names are disambiguated on
    /// both sides before joining (left suffix first, right suffix second).
    /// Key columns are never renamed.
    fn left_join_keyed(
        &self,
        right: &DataFrame,
        keys: &[&str],
        suffixes: Option<(&str, &str)>,
    ) -> Result<DataFrame>;

    /// Keep only rows where `column` is non-null.
    fn filter_not_null(&self, column: &str) -> Result<DataFrame>;

    /// Finalize a merge result into a dense, contiguous row layout.
    fn with_dense_rows(self) -> DataFrame;

    /// `(rows, cols)` for progress diagnostics.
    fn shape_display(&self) -> String;
}

impl FrameOps for DataFrame {
    fn left_join_keyed(
        &self,
        right: &DataFrame,
        keys: &[&str],
        suffixes: Option<(&str, &str)>,
    ) -> Result<DataFrame> {
        let Some((left_suffix, right_suffix)) = suffixes else {
            return Ok(self.join(right, keys, keys, JoinArgs::new(JoinType::Left))?);
        };

        let key_set: HashSet<&str> = keys.iter().copied().collect();
        let right_names: HashSet<&str> = right.get_column_names().into_iter().collect();
        let overlap: Vec<String> = self
            .get_column_names()
            .into_iter()
            .filter(|name| !key_set.contains(name) && right_names.contains(name))
            .map(|name| name.to_string())
            .collect();

        let mut left = self.clone();
        let mut right = right.clone();
        for name in &overlap {
            left.rename(name, &format!("{name}{left_suffix}"))?;
            right.rename(name, &format!("{name}{right_suffix}"))?;
        }

        Ok(left.join(&right, keys, keys, JoinArgs::new(JoinType::Left))?)
    }

    fn filter_not_null(&self, column: &str) -> Result<DataFrame> {
        Ok(self
            .clone()
            .lazy()
            .filter(col(column).is_not_null())
            .collect()?)
    }

    fn with_dense_rows(mut self) -> DataFrame {
        self.as_single_chunk_par();
        self
    }

    fn shape_display(&self) -> String {
        format!("({}, {})", self.height(), self.width())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_frame() -> DataFrame {
        df!(
            "CampusKey" => &[1i64, 1, 2],
            "SiteKey" => &[10i64, 11, 20],
            "Reading" => &[5.0, 6.0, 7.0],
        )
        .unwrap()
    }

    #[test]
    fn left_join_keeps_all_left_rows() {
        let left = base_frame();
        let right = df!(
            "CampusKey" => &[1i64],
            "SiteKey" => &[10i64],
            "Extra" => &[99.0],
        )
        .unwrap();

        let joined = left
            .left_join_keyed(&right, &["CampusKey", "SiteKey"], None)
            .unwrap();

        assert_eq!(joined.height(), left.height());
        assert_eq!(joined.column("Extra").unwrap().null_count(), 2);
    }

    #[test]
    fn duplicate_right_keys_fan_out() {
        let left = base_frame();
        // One left key matched twice on the right.
        let right = df!(
            "CampusKey" => &[1i64, 1],
            "SiteKey" => &[10i64, 10],
            "Extra" => &[1.0, 2.0],
        )
        .unwrap();

        let joined = left
            .left_join_keyed(&right, &["CampusKey", "SiteKey"], None)
            .unwrap();

        assert_eq!(joined.height(), 4);
    }

    #[test]
    fn overlapping_columns_are_suffixed_on_both_sides() {
        let left = base_frame();
        let right = df!(
            "SiteKey" => &[10i64, 11, 20],
            "Reading" => &[1.0, 2.0, 3.0],
        )
        .unwrap();

        let joined = left
            .left_join_keyed(&right, &["SiteKey"], Some(("_base", "_site")))
            .unwrap();

        let names = joined.get_column_names();
        assert!(names.contains(&"Reading_base"));
        assert!(names.contains(&"Reading_site"));
        assert!(!names.contains(&"Reading"));
        // The key itself is never renamed.
        assert!(names.contains(&"SiteKey"));
    }

    #[test]
    fn filter_not_null_drops_null_rows_only() {
        let frame = df!(
            "kWp" => &[Some(5.0), None, Some(3.0)],
            "SiteKey" => &[1i64, 2, 3],
        )
        .unwrap();

        let filtered = frame.filter_not_null("kWp").unwrap();
        assert_eq!(filtered.height(), 2);
        assert_eq!(filtered.column("kWp").unwrap().null_count(), 0);
    }

    #[test]
    fn filter_not_null_missing_column_is_an_error() {
        let frame = base_frame();
        assert!(frame.filter_not_null("DoesNotExist").is_err());
    }
}
