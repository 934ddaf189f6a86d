//! HTTP clients for xSOL protocol data
//!
//! Hylo stats API for the protocol's own figures, Jupiter for USD prices and
//! Solana JSON-RPC for on-chain token supply.

use std::time::Duration;

use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::XsolConfig;
use crate::error::{Result, ScoutError};

pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const XSOL_MINT: &str = "4sWNB8zGWHkh6UnmwiEtzNxL4XrN7uK9tosbESbJFfVs";

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// `exchangeStats` block of the Hylo stats response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeStats {
    pub stablecoin_supply: f64,
    pub levercoin_nav: f64,
    pub levercoin_supply: f64,
    pub collateral_ratio: Option<f64>,
    /// `{}` when the field is absent; an explicit `null` is kept
    #[serde(default = "empty_object")]
    pub stability_mode: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HyloStats {
    exchange_stats: ExchangeStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JupiterPrice {
    usd_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<RpcResult>,
}

#[derive(Debug, Deserialize)]
struct RpcResult {
    value: TokenAmount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenAmount {
    ui_amount: Option<f64>,
}

/// Backoff before the next attempt after a 429
pub fn rate_limit_backoff(attempt: u32) -> Duration {
    let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
    Duration::from_secs_f64(2f64.powi(attempt as i32) + jitter)
}

/// Pause between attempts for any other failure
const RETRY_PAUSE: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct XsolClient {
    client: Client,
    hylo_api: String,
    jupiter_price_api: String,
    rpc_endpoints: Vec<String>,
    max_retries: u32,
}

impl XsolClient {
    pub fn new(config: &XsolConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            hylo_api: config.hylo_api.clone(),
            jupiter_price_api: config.jupiter_price_api.clone(),
            rpc_endpoints: config.rpc_endpoints.clone(),
            max_retries: config.max_retries.max(1),
        })
    }

    /// GET `url` as JSON with bounded retries
    async fn get_json_with_retry<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        browser_headers: bool,
    ) -> Result<T> {
        let mut attempt = 0u32;
        loop {
            match self.get_json_once(url, browser_headers).await {
                Ok(v) => return Ok(v),
                Err(e) if attempt + 1 >= self.max_retries => return Err(e),
                Err(ScoutError::RateLimited(msg)) => {
                    let wait = rate_limit_backoff(attempt);
                    warn!(url, attempt, wait_ms = wait.as_millis() as u64, "rate limited: {}", msg);
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    debug!(url, attempt, error = %e, "request failed, retrying");
                    tokio::time::sleep(RETRY_PAUSE).await;
                }
            }
            attempt += 1;
        }
    }

    async fn get_json_once<T: serde::de::DeserializeOwned>(&self, url: &str, browser_headers: bool) -> Result<T> {
        let mut req = self.client.get(url).header("Accept", "application/json");
        if browser_headers {
            req = req
                .header("User-Agent", BROWSER_UA)
                .header("Accept-Language", "en-US,en;q=0.9");
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ScoutError::RateLimited(url.to_string()));
        }
        if !status.is_success() {
            return Err(ScoutError::MarketDataUnavailable(format!("{url}: HTTP {status}")));
        }
        Ok(resp.json::<T>().await?)
    }

    /// Protocol stats from the Hylo API
    pub async fn exchange_stats(&self) -> Result<ExchangeStats> {
        let stats: HyloStats = self.get_json_with_retry(&self.hylo_api, true).await?;
        Ok(stats.exchange_stats)
    }

    /// USD price of `mint` from Jupiter; `None` when Jupiter has no quote
    pub async fn usd_price(&self, mint: &str) -> Result<Option<f64>> {
        let url = format!("{}?ids={}&vsToken={}", self.jupiter_price_api, mint, USDC_MINT);
        let prices: std::collections::HashMap<String, JupiterPrice> = self.get_json_with_retry(&url, false).await?;
        Ok(prices.get(mint).and_then(|p| p.usd_price).filter(|p| *p > 0.0))
    }

    /// Token supply via `getTokenSupply`, first endpoint that answers wins
    pub async fn token_supply(&self, mint: &str) -> Option<f64> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getTokenSupply",
            "params": [mint],
        });

        for rpc in &self.rpc_endpoints {
            let resp = match self.client.post(rpc).json(&payload).send().await {
                Ok(r) => r,
                Err(e) => {
                    debug!(rpc = %rpc, error = %e, "rpc request failed");
                    continue;
                }
            };
            match resp.json::<RpcResponse>().await {
                Ok(RpcResponse { result: Some(r) }) => {
                    if let Some(amount) = r.value.ui_amount {
                        return Some(amount);
                    }
                }
                Ok(_) => debug!(rpc = %rpc, "rpc returned no result"),
                Err(e) => debug!(rpc = %rpc, error = %e, "rpc response unreadable"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hylo_stats() {
        let body = r#"{"exchangeStats":{
            "stablecoinSupply": 18500000.5,
            "levercoinNav": 0.42,
            "levercoinSupply": 12000000,
            "collateralRatio": 1.65,
            "stabilityMode": {"normal": {}}
        }}"#;
        let stats: HyloStats = serde_json::from_str(body).unwrap();
        assert_eq!(stats.exchange_stats.levercoin_nav, 0.42);
        assert_eq!(stats.exchange_stats.collateral_ratio, Some(1.65));
        assert_eq!(stats.exchange_stats.stability_mode["normal"], serde_json::json!({}));
    }

    #[test]
    fn test_stability_mode_null_and_absent() {
        let null = r#"{"exchangeStats":{"stablecoinSupply":1,"levercoinNav":1,"levercoinSupply":1,
            "collateralRatio":null,"stabilityMode":null}}"#;
        let stats: HyloStats = serde_json::from_str(null).unwrap();
        assert!(stats.exchange_stats.stability_mode.is_null());

        let absent = r#"{"exchangeStats":{"stablecoinSupply":1,"levercoinNav":1,"levercoinSupply":1,
            "collateralRatio":null}}"#;
        let stats: HyloStats = serde_json::from_str(absent).unwrap();
        assert_eq!(stats.exchange_stats.stability_mode, serde_json::json!({}));
    }

    #[test]
    fn test_parse_token_supply() {
        let body = r#"{"jsonrpc":"2.0","result":{"context":{"slot":1},"value":{"amount":"1","decimals":6,"uiAmount":12000000.25}},"id":1}"#;
        let resp: RpcResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.result.unwrap().value.ui_amount, Some(12_000_000.25));
    }

    #[test]
    fn test_parse_jupiter_price() {
        let body = format!(r#"{{"{SOL_MINT}":{{"usdPrice":187.5,"decimals":9}}}}"#);
        let prices: std::collections::HashMap<String, JupiterPrice> = serde_json::from_str(&body).unwrap();
        assert_eq!(prices[SOL_MINT].usd_price, Some(187.5));
    }

    #[test]
    fn test_backoff_grows() {
        let first = rate_limit_backoff(0);
        let third = rate_limit_backoff(2);
        assert!(first >= Duration::from_secs(1) && first < Duration::from_secs(2));
        assert!(third >= Duration::from_secs(4) && third < Duration::from_secs(5));
    }
}
