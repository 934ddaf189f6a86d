//! Protocol-level metrics for the xSOL leveraged token
//!
//! Collateral TVL is the stablecoin supply plus the market value of the
//! levercoin; effective leverage is that TVL over the levercoin's value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a metrics snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricsSource {
    #[serde(rename = "hylo-api")]
    HyloApi,
    #[serde(rename = "blockchain-fallback")]
    BlockchainFallback,
}

/// Raw protocol inputs, however they were obtained
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtocolInputs {
    pub stablecoin_supply: f64,
    pub xsol_price: f64,
    pub xsol_supply: f64,
    pub sol_price: f64,
}

/// Collateral TVL (USD), TVL in SOL, effective leverage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtocolDerived {
    pub collateral_tvl: Option<f64>,
    pub collateral_tvl_sol: Option<f64>,
    pub effective_leverage: Option<f64>,
}

fn ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        return None;
    }
    let v = num / den;
    v.is_finite().then_some(v)
}

impl ProtocolInputs {
    pub fn derive(&self) -> ProtocolDerived {
        let levercoin_value = self.xsol_price * self.xsol_supply;
        let tvl = self.stablecoin_supply + levercoin_value;
        let tvl = tvl.is_finite().then_some(tvl);

        ProtocolDerived {
            collateral_tvl: tvl,
            collateral_tvl_sol: tvl.and_then(|t| ratio(t, self.sol_price)),
            effective_leverage: tvl.and_then(|t| ratio(t, levercoin_value)),
        }
    }
}

/// Published xSOL metrics document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XsolMetrics {
    #[serde(rename = "HYusd_supply")]
    pub hyusd_supply: f64,
    #[serde(rename = "xSOL_price")]
    pub xsol_price: f64,
    #[serde(rename = "xSOL_supply")]
    pub xsol_supply: f64,
    #[serde(rename = "CollateralRatio")]
    pub collateral_ratio: Option<f64>,
    #[serde(rename = "SOL_price")]
    pub sol_price: f64,
    #[serde(rename = "StabilityMode")]
    pub stability_mode: serde_json::Value,
    #[serde(rename = "Collateral_TVL")]
    pub collateral_tvl: Option<f64>,
    #[serde(rename = "Collateral_TVL_SOL")]
    pub collateral_tvl_sol: Option<f64>,
    #[serde(rename = "Effective_Leverage")]
    pub effective_leverage: Option<f64>,
    #[serde(rename = "xSOL_icon_url")]
    pub xsol_icon_url: Option<String>,
    #[serde(rename = "lastFetched")]
    pub last_fetched: DateTime<Utc>,
    pub source: MetricsSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl XsolMetrics {
    pub fn build(
        inputs: ProtocolInputs,
        collateral_ratio: Option<f64>,
        stability_mode: serde_json::Value,
        source: MetricsSource,
        last_fetched: DateTime<Utc>,
    ) -> Self {
        let derived = inputs.derive();
        Self {
            hyusd_supply: inputs.stablecoin_supply,
            xsol_price: inputs.xsol_price,
            xsol_supply: inputs.xsol_supply,
            collateral_ratio,
            sol_price: inputs.sol_price,
            stability_mode,
            collateral_tvl: derived.collateral_tvl,
            collateral_tvl_sol: derived.collateral_tvl_sol,
            effective_leverage: derived.effective_leverage,
            xsol_icon_url: None,
            last_fetched,
            source,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}
