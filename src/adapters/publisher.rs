//! Batch publishers
//!
//! Each pass hands its `BatchResult` to every configured publisher. The
//! last completed pass wins; publishers never merge with earlier output.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info};

use crate::domain::BatchResult;
use crate::error::{Result, ScoutError};

/// Destination for a finished batch
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Short label for logs
    fn name(&self) -> String;

    async fn publish(&self, result: &BatchResult) -> Result<()>;
}

// =============================================================================
// File
// =============================================================================

/// Write `value` as pretty JSON next to `path`, then rename it into place
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }

    let body = serde_json::to_vec_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.tmp", std::process::id()));
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &body).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Writes the batch document to a local JSON file
#[derive(Debug, Clone)]
pub struct FilePublisher {
    path: PathBuf,
}

impl FilePublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Publisher for FilePublisher {
    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn publish(&self, result: &BatchResult) -> Result<()> {
        write_json_atomic(&self.path, result).await?;
        info!(path = %self.path.display(), assets = result.assets_count, "batch written");
        Ok(())
    }
}

// =============================================================================
// Gist
// =============================================================================

const GITHUB_API: &str = "https://api.github.com";

/// Replaces one file of a GitHub gist with the batch document
#[derive(Clone)]
pub struct GistPublisher {
    client: Client,
    api_base: String,
    gist_id: String,
    filename: String,
    token: String,
}

impl GistPublisher {
    pub fn new(gist_id: String, filename: String, token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("yt-scout/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_base: GITHUB_API.to_string(),
            gist_id,
            filename,
            token,
        })
    }

    /// Build from config values plus `GITHUB_TOKEN`; `None` if either is missing
    pub fn from_env(gist_id: Option<&str>, filename: &str) -> Option<Self> {
        let gist_id = gist_id.filter(|id| !id.is_empty())?;
        let token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty())?;
        match Self::new(gist_id.to_string(), filename.to_string(), token) {
            Ok(p) => {
                info!(gist_id, "gist publishing enabled");
                Some(p)
            }
            Err(e) => {
                error!("Failed to build gist client: {}", e);
                None
            }
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn request_body(&self, content: String) -> serde_json::Value {
        let mut files = serde_json::Map::new();
        files.insert(self.filename.clone(), json!({ "content": content }));
        json!({ "files": files })
    }
}

#[async_trait]
impl Publisher for GistPublisher {
    fn name(&self) -> String {
        format!("gist:{}", self.gist_id)
    }

    async fn publish(&self, result: &BatchResult) -> Result<()> {
        let content = serde_json::to_string_pretty(result)?;
        let url = format!("{}/gists/{}", self.api_base, self.gist_id);

        let resp = self
            .client
            .patch(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&self.request_body(content))
            .send()
            .await?;

        if resp.status().is_success() {
            debug!(gist_id = %self.gist_id, "gist updated");
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!("Gist update failed: {} - {}", status, body);
            Err(ScoutError::Publish(format!("HTTP {}: {}", status, body)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetRecord, Source};
    use chrono::{TimeZone, Utc};

    fn batch() -> BatchResult {
        let ts = Utc.with_ymd_and_hms(2025, 11, 5, 0, 0, 0).unwrap();
        let mut record = AssetRecord::new("xSOL-2511", "xSOL", Source::Ratex);
        record.leverage = Some(133.0);
        BatchResult::new(ts, vec![record])
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("yt-scout-test-{}", std::process::id()))
            .join(name)
    }

    #[tokio::test]
    async fn test_file_publisher_writes_document() {
        let path = temp_path("assets.json");
        let publisher = FilePublisher::new(&path);
        publisher.publish(&batch()).await.unwrap();

        let body = tokio::fs::read_to_string(&path).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["assetsCount"], 1);
        assert_eq!(json["assets"][0]["asset"], "xSOL-2511");
        assert_eq!(json["lastUpdated"], "2025-11-05T00:00:00Z");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_file_publisher_last_writer_wins() {
        let path = temp_path("overwrite.json");
        let publisher = FilePublisher::new(&path);
        publisher.publish(&batch()).await.unwrap();

        let empty = BatchResult::new(Utc::now(), Vec::new());
        publisher.publish(&empty).await.unwrap();

        let body = tokio::fs::read_to_string(&path).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["assetsCount"], 0);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[test]
    fn test_gist_request_body() {
        let publisher = GistPublisher::new("abc".into(), "assets.json".into(), "t".into()).unwrap();
        let body = publisher.request_body("{}".into());
        assert_eq!(body["files"]["assets.json"]["content"], "{}");
        assert_eq!(publisher.name(), "gist:abc");
    }
}
