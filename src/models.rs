use serde::{Deserialize, Serialize};

/// How unparseable timestamp values are treated during merge normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampStrictness {
    /// Abort the run on the first value that fails to parse.
    Strict,
    /// Replace values that fail to parse with null.
    Coerce,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub campus_key: String,
    pub site_key: String,
    pub timestamp_col: String,
    pub target_col: String,
    pub capacity_col: String,
    pub weather_cols: Vec<String>,
    pub strictness: TimestampStrictness,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            campus_key: "CampusKey".to_string(),
            site_key: "SiteKey".to_string(),
            timestamp_col: "Timestamp".to_string(),
            target_col: "SolarGeneration".to_string(),
            capacity_col: "kWp".to_string(),
            weather_cols: vec![
                "ApparentTemperature".to_string(),
                "AirTemperature".to_string(),
                "DewPointTemperature".to_string(),
                "RelativeHumidity".to_string(),
                "WindSpeed".to_string(),
                "WindDirection".to_string(),
            ],
            strictness: TimestampStrictness::Coerce,
        }
    }
}

impl PipelineConfig {
    pub fn with_strictness(mut self, strictness: TimestampStrictness) -> Self {
        self.strictness = strictness;
        self
    }
}
