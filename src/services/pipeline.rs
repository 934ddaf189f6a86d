//! Periodic extraction pass: snapshots in, one published document out.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::adapters::{load_snapshot, Publisher};
use crate::config::{PipelineConfig, SourcesConfig};
use crate::domain::{AssetRecord, BatchResult};
use crate::error::{Result, ScoutError};
use crate::extract::BatchExtractor;

pub struct PipelineService {
    sources: SourcesConfig,
    cfg: PipelineConfig,
    publishers: Vec<Arc<dyn Publisher>>,
}

impl PipelineService {
    pub fn new(sources: SourcesConfig, cfg: PipelineConfig, publishers: Vec<Arc<dyn Publisher>>) -> Self {
        Self {
            sources,
            cfg,
            publishers,
        }
    }

    /// Run passes forever at the configured interval (call from a spawned task).
    pub async fn run_forever(&self) {
        let interval = Duration::from_secs(self.cfg.interval_secs);
        info!(
            "PipelineService: starting (interval={}s, sources={:?})",
            self.cfg.interval_secs,
            self.sources.enabled().map(|(s, _)| s.as_str()).collect::<Vec<_>>()
        );

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                warn!("PipelineService: pass failed: {e}");
            }
        }
    }

    /// One pass stamped with the current time
    pub async fn run_once(&self) -> Result<BatchResult> {
        self.run_once_at(Utc::now()).await
    }

    /// One pass with every record computed against `last_updated`
    pub async fn run_once_at(&self, last_updated: DateTime<Utc>) -> Result<BatchResult> {
        let assets = self.extract_all(last_updated).await;
        let result = BatchResult::new(last_updated, assets);
        self.publish(&result).await?;
        Ok(result)
    }

    /// Extract every enabled source; sources whose snapshot cannot be read are skipped
    pub async fn extract_all(&self, last_updated: DateTime<Utc>) -> Vec<AssetRecord> {
        let mut assets = Vec::new();

        for (source, cfg) in self.sources.enabled() {
            let loaded = match load_snapshot(&cfg.snapshot_path).await {
                Ok(l) => l,
                Err(e) => {
                    warn!("PipelineService: {source} skipped: {e}");
                    continue;
                }
            };
            if let Some(captured_at) = loaded.captured_at {
                let age = last_updated - captured_at;
                debug!(%source, age_secs = age.num_seconds(), "snapshot age");
            }

            let extractor = BatchExtractor::new(source, last_updated)
                .with_fee_rate(cfg.fee_rate.unwrap_or_else(|| source.fee_rate()));
            let report = extractor.run(&loaded.dom);
            assets.extend(report.records);
        }

        assets
    }

    async fn publish(&self, result: &BatchResult) -> Result<()> {
        if self.publishers.is_empty() {
            debug!("PipelineService: no publishers configured");
            return Ok(());
        }

        let mut delivered = 0usize;
        for publisher in &self.publishers {
            match publisher.publish(result).await {
                Ok(()) => delivered += 1,
                Err(e) => error!("PipelineService: publish to {} failed: {e}", publisher.name()),
            }
        }

        info!(
            "PipelineService: published {} assets to {}/{} targets",
            result.assets_count,
            delivered,
            self.publishers.len()
        );

        if delivered == 0 {
            return Err(ScoutError::Publish("every publisher failed".to_string()));
        }
        Ok(())
    }
}
