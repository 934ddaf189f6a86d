use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Market platform an instrument listing was observed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Platform A: `<asset>-<YYMM>` names, "Yield Exposure" vocabulary
    Ratex,
    /// Platform B: `YT-<asset>-<DDMMMYY>` names, "Effective Exposure" vocabulary
    Exponent,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Ratex, Source::Exponent];

    /// Take rate the platform charges on recovered yield
    pub fn fee_rate(&self) -> f64 {
        match self {
            Source::Ratex => 0.05,
            Source::Exponent => 0.055,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Ratex => "ratex",
            Source::Exponent => "exponent",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ratex" | "a" | "platforma" => Ok(Source::Ratex),
            "exponent" | "b" | "platformb" => Ok(Source::Exponent),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

/// Canonical record for one yield-token instrument in one batch pass.
///
/// Every optional field is `None` when it could not be extracted or its
/// preconditions were unmet; zero only appears where zero is the real value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub asset: String,
    pub base_asset: String,
    pub source: Source,

    pub leverage: Option<f64>,
    pub apy: Option<f64>,
    pub implied_yield: Option<f64>,
    pub range_lower: Option<f64>,
    pub range_upper: Option<f64>,

    pub maturity: Option<DateTime<Utc>>,
    pub maturity_days: Option<f64>,

    pub asset_boost: Option<f64>,
    pub ratex_boost: Option<f64>,

    pub project_background_image: Option<String>,
    pub project_name: Option<String>,
    pub asset_symbol_image: Option<String>,

    // Derived analytics
    pub yt_price_current: Option<f64>,
    pub yt_price_lower: Option<f64>,
    pub yt_price_upper: Option<f64>,
    pub upside_potential: Option<f64>,
    pub downside_risk: Option<f64>,
    pub end_day_current_yield: Option<f64>,
    pub end_day_lower_yield: Option<f64>,
    pub daily_decay_rate: Option<f64>,
    pub expected_recovery_yield: Option<f64>,
    pub expected_points_per_day: Option<f64>,
    pub total_expected_points: Option<f64>,
}

impl AssetRecord {
    /// Empty record: identity only, every value field `None`
    pub fn new(asset: impl Into<String>, base_asset: impl Into<String>, source: Source) -> Self {
        Self {
            asset: asset.into(),
            base_asset: base_asset.into(),
            source,
            leverage: None,
            apy: None,
            implied_yield: None,
            range_lower: None,
            range_upper: None,
            maturity: None,
            maturity_days: None,
            asset_boost: None,
            ratex_boost: None,
            project_background_image: None,
            project_name: None,
            asset_symbol_image: None,
            yt_price_current: None,
            yt_price_lower: None,
            yt_price_upper: None,
            upside_potential: None,
            downside_risk: None,
            end_day_current_yield: None,
            end_day_lower_yield: None,
            daily_decay_rate: None,
            expected_recovery_yield: None,
            expected_points_per_day: None,
            total_expected_points: None,
        }
    }

    /// Minimum fields for a record to be published
    pub fn has_required_fields(&self) -> bool {
        self.leverage.is_some() && self.maturity_days.is_some()
    }
}

/// Document handed to publishers once per pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub last_updated: DateTime<Utc>,
    pub assets_count: usize,
    pub assets: Vec<AssetRecord>,
}

impl BatchResult {
    pub fn new(last_updated: DateTime<Utc>, assets: Vec<AssetRecord>) -> Self {
        Self {
            last_updated,
            assets_count: assets.len(),
            assets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_serializes_camel_case_with_nulls() {
        let mut record = AssetRecord::new("xSOL-2511", "xSOL", Source::Ratex);
        record.leverage = Some(133.0);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["asset"], "xSOL-2511");
        assert_eq!(json["baseAsset"], "xSOL");
        assert_eq!(json["source"], "ratex");
        assert_eq!(json["leverage"], 133.0);
        assert!(json["impliedYield"].is_null());
        assert!(json["ytPriceCurrent"].is_null());
        assert!(json.get("expectedPointsPerDay").is_some());
    }

    #[test]
    fn test_required_fields() {
        let mut record = AssetRecord::new("xSOL-2511", "xSOL", Source::Ratex);
        assert!(!record.has_required_fields());
        record.leverage = Some(10.0);
        assert!(!record.has_required_fields());
        record.maturity_days = Some(0.0);
        assert!(record.has_required_fields());
    }

    #[test]
    fn test_batch_result_shape() {
        let ts = Utc.with_ymd_and_hms(2025, 11, 5, 0, 0, 0).unwrap();
        let batch = BatchResult::new(ts, vec![AssetRecord::new("a-2511", "a", Source::Ratex)]);
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["assetsCount"], 1);
        assert_eq!(json["lastUpdated"], "2025-11-05T00:00:00Z");
        assert_eq!(json["assets"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_source_parse_and_fee() {
        assert_eq!("RateX".parse::<Source>().unwrap(), Source::Ratex);
        assert_eq!("exponent".parse::<Source>().unwrap(), Source::Exponent);
        assert!("pendle".parse::<Source>().is_err());
        assert!(Source::Exponent.fee_rate() > Source::Ratex.fee_rate());
    }
}
