//! xSOL protocol metrics with an on-chain fallback
//!
//! Hylo's stats API is the primary source. When it fails (usually rate
//! limiting) supply comes from Solana RPC, prices from Jupiter, and the
//! stablecoin supply from configuration.

use chrono::Utc;
use tracing::{info, warn};

use crate::adapters::{XsolClient, SOL_MINT, XSOL_MINT};
use crate::analytics::{MetricsSource, ProtocolInputs, XsolMetrics};
use crate::config::XsolConfig;
use crate::error::{Result, ScoutError};

const FALLBACK_NOTE: &str = "CollateralRatio unavailable - using blockchain approximation";

pub struct XsolMetricsService {
    client: XsolClient,
    fallback_stablecoin_supply: f64,
}

impl XsolMetricsService {
    pub fn new(config: &XsolConfig) -> Result<Self> {
        Ok(Self {
            client: XsolClient::new(config)?,
            fallback_stablecoin_supply: config.fallback_stablecoin_supply,
        })
    }

    /// Primary path, then fallback; errors only if both fail
    pub async fn fetch(&self) -> Result<XsolMetrics> {
        match self.fetch_primary().await {
            Ok(m) => Ok(m),
            Err(primary) => {
                warn!("xSOL: stats API failed, using blockchain fallback: {primary}");
                self.fetch_fallback().await
            }
        }
    }

    pub async fn fetch_primary(&self) -> Result<XsolMetrics> {
        let stats = self.client.exchange_stats().await?;
        let sol_price = self
            .client
            .usd_price(SOL_MINT)
            .await?
            .ok_or_else(|| ScoutError::MarketDataUnavailable("SOL price".to_string()))?;

        let inputs = ProtocolInputs {
            stablecoin_supply: stats.stablecoin_supply,
            xsol_price: stats.levercoin_nav,
            xsol_supply: stats.levercoin_supply,
            sol_price,
        };

        info!(
            "xSOL: stats API ok (price={}, supply={})",
            inputs.xsol_price, inputs.xsol_supply
        );
        Ok(XsolMetrics::build(
            inputs,
            stats.collateral_ratio,
            stats.stability_mode,
            MetricsSource::HyloApi,
            Utc::now(),
        ))
    }

    pub async fn fetch_fallback(&self) -> Result<XsolMetrics> {
        let xsol_supply = self
            .client
            .token_supply(XSOL_MINT)
            .await
            .filter(|s| *s > 0.0)
            .ok_or_else(|| ScoutError::MarketDataUnavailable("xSOL supply from RPC".to_string()))?;

        let sol_price = self.client.usd_price(SOL_MINT).await?;
        let xsol_price = self.client.usd_price(XSOL_MINT).await?;
        let (Some(sol_price), Some(xsol_price)) = (sol_price, xsol_price) else {
            return Err(ScoutError::MarketDataUnavailable("prices from Jupiter".to_string()));
        };

        let inputs = ProtocolInputs {
            stablecoin_supply: self.fallback_stablecoin_supply,
            xsol_price,
            xsol_supply,
            sol_price,
        };
        Ok(XsolMetrics::build(
            inputs,
            None,
            serde_json::Value::Object(Default::default()),
            MetricsSource::BlockchainFallback,
            Utc::now(),
        )
        .with_note(FALLBACK_NOTE))
    }
}
