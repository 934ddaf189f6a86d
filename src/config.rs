use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::domain::Source;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub xsol: XsolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Seconds between passes in `run` mode
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    300
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// DOM dump written by the browser driver
    pub snapshot_path: String,
    /// Listing page the driver captures (informational)
    #[serde(default)]
    pub page_url: Option<String>,
    /// Overrides the platform's take rate on recovered yield
    #[serde(default)]
    pub fee_rate: Option<f64>,
}

fn default_true() -> bool {
    true
}

impl SourceConfig {
    fn for_source(source: Source, page_url: &str) -> Self {
        Self {
            enabled: true,
            snapshot_path: format!("data/snapshots/{}.json", source.as_str()),
            page_url: Some(page_url.to_string()),
            fee_rate: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_ratex")]
    pub ratex: SourceConfig,
    #[serde(default = "default_exponent")]
    pub exponent: SourceConfig,
}

fn default_ratex() -> SourceConfig {
    SourceConfig::for_source(Source::Ratex, "https://app.rate-x.io/")
}

fn default_exponent() -> SourceConfig {
    SourceConfig::for_source(Source::Exponent, "https://www.exponent.finance/farm")
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            ratex: default_ratex(),
            exponent: default_exponent(),
        }
    }
}

impl SourcesConfig {
    pub fn get(&self, source: Source) -> &SourceConfig {
        match source {
            Source::Ratex => &self.ratex,
            Source::Exponent => &self.exponent,
        }
    }

    /// Enabled sources in publishing order
    pub fn enabled(&self) -> impl Iterator<Item = (Source, &SourceConfig)> {
        Source::ALL
            .into_iter()
            .map(|s| (s, self.get(s)))
            .filter(|(_, c)| c.enabled)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_output_path")]
    pub output_path: String,
    /// Gist to mirror the document into; token comes from `GITHUB_TOKEN`
    #[serde(default)]
    pub gist_id: Option<String>,
    #[serde(default = "default_gist_filename")]
    pub gist_filename: String,
    /// Where `xsol` writes its document, if anywhere
    #[serde(default)]
    pub xsol_output_path: Option<String>,
}

fn default_output_path() -> String {
    "data/assets.json".to_string()
}

fn default_gist_filename() -> String {
    "assets.json".to_string()
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            gist_id: None,
            gist_filename: default_gist_filename(),
            xsol_output_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct XsolConfig {
    #[serde(default = "default_hylo_api")]
    pub hylo_api: String,
    #[serde(default = "default_jupiter_price_api")]
    pub jupiter_price_api: String,
    #[serde(default = "default_rpc_endpoints")]
    pub rpc_endpoints: Vec<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Stablecoin supply used when the stats API is down
    #[serde(default = "default_fallback_stablecoin_supply")]
    pub fallback_stablecoin_supply: f64,
}

fn default_hylo_api() -> String {
    "https://api.hylo.so/stats".to_string()
}

fn default_jupiter_price_api() -> String {
    "https://lite-api.jup.ag/price/v3".to_string()
}

fn default_rpc_endpoints() -> Vec<String> {
    vec![
        "https://api.mainnet-beta.solana.com".to_string(),
        "https://rpc.ankr.com/solana".to_string(),
    ]
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_fallback_stablecoin_supply() -> f64 {
    18_000_000.0
}

impl Default for XsolConfig {
    fn default() -> Self {
        Self {
            hylo_api: default_hylo_api(),
            jupiter_price_api: default_jupiter_price_api(),
            rpc_endpoints: default_rpc_endpoints(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            fallback_stablecoin_supply: default_fallback_stablecoin_supply(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("pipeline.interval_secs", default_interval_secs())?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific overrides (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("YT_SCOUT_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // YT_SCOUT_PUBLISH__OUTPUT_PATH, YT_SCOUT_SOURCES__RATEX__SNAPSHOT_PATH, ...
            .add_source(
                Environment::with_prefix("YT_SCOUT")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.pipeline.interval_secs == 0 {
            errors.push("pipeline.interval_secs must be positive".to_string());
        }

        if self.sources.enabled().next().is_none() {
            errors.push("at least one source must be enabled".to_string());
        }

        for (source, cfg) in self.sources.enabled() {
            if cfg.snapshot_path.trim().is_empty() {
                errors.push(format!("sources.{source}.snapshot_path is empty"));
            }
            if let Some(fee) = cfg.fee_rate {
                if !(0.0..1.0).contains(&fee) {
                    errors.push(format!("sources.{source}.fee_rate must be in [0, 1): {fee}"));
                }
            }
        }

        if self.publish.output_path.trim().is_empty() {
            errors.push("publish.output_path is empty".to_string());
        }

        if self.xsol.rpc_endpoints.is_empty() {
            errors.push("xsol.rpc_endpoints must not be empty".to_string());
        }
        if self.xsol.max_retries == 0 {
            errors.push("xsol.max_retries must be at least 1".to_string());
        }
        if self.xsol.fallback_stablecoin_supply < 0.0 {
            errors.push("xsol.fallback_stablecoin_supply must not be negative".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Fee on recovered yield for `source`, config override first
    pub fn fee_rate(&self, source: Source) -> f64 {
        self.sources.get(source).fee_rate.unwrap_or_else(|| source.fee_rate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.interval_secs, 300);
        assert_eq!(config.publish.output_path, "data/assets.json");
        assert_eq!(config.xsol.rpc_endpoints.len(), 2);
    }

    #[test]
    fn test_validate_collects_every_error() {
        let mut config = AppConfig::default();
        config.pipeline.interval_secs = 0;
        config.sources.ratex.fee_rate = Some(1.5);
        config.xsol.rpc_endpoints.clear();

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("sources.ratex.fee_rate")));
    }

    #[test]
    fn test_no_enabled_source() {
        let mut config = AppConfig::default();
        config.sources.ratex.enabled = false;
        config.sources.exponent.enabled = false;
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("at least one source")));
    }

    #[test]
    fn test_fee_rate_override() {
        let mut config = AppConfig::default();
        assert_eq!(config.fee_rate(Source::Exponent), 0.055);
        config.sources.exponent.fee_rate = Some(0.0);
        assert_eq!(config.fee_rate(Source::Exponent), 0.0);
    }

    #[test]
    fn test_load_from_empty_dir_uses_defaults() {
        let dir = std::env::temp_dir().join(format!("yt-scout-config-{}", std::process::id()));
        let config = AppConfig::load_from(&dir).unwrap();
        assert_eq!(config.pipeline.interval_secs, 300);
        assert!(config.sources.ratex.enabled);
        assert_eq!(config.sources.exponent.snapshot_path, "data/snapshots/exponent.json");
    }
}
