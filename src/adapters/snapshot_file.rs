//! DOM snapshots written to disk by the external browser driver
//!
//! The driver dumps either the bare root node or an envelope carrying the
//! capture time and page URL alongside it.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::domain::{DomSnapshot, RawNode};
use crate::error::{Result, ScoutError};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Envelope {
        #[serde(rename = "capturedAt")]
        captured_at: Option<DateTime<Utc>>,
        url: Option<String>,
        root: RawNode,
    },
    Bare(RawNode),
}

/// A loaded snapshot plus whatever metadata the driver recorded
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub dom: DomSnapshot,
    pub captured_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
}

pub fn parse_snapshot(json: &str) -> serde_json::Result<LoadedSnapshot> {
    let file: SnapshotFile = serde_json::from_str(json)?;
    Ok(match file {
        SnapshotFile::Envelope {
            captured_at,
            url,
            root,
        } => LoadedSnapshot {
            dom: DomSnapshot::from_raw(root),
            captured_at,
            url,
        },
        SnapshotFile::Bare(root) => LoadedSnapshot {
            dom: DomSnapshot::from_raw(root),
            captured_at: None,
            url: None,
        },
    })
}

/// Read and parse a snapshot file
pub async fn load_snapshot(path: impl AsRef<Path>) -> Result<LoadedSnapshot> {
    let path = path.as_ref();
    let snapshot_err = |reason: String| ScoutError::SnapshotLoad {
        path: path.display().to_string(),
        reason,
    };

    let body = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| snapshot_err(e.to_string()))?;
    let loaded = parse_snapshot(&body).map_err(|e| snapshot_err(e.to_string()))?;

    debug!(path = %path.display(), nodes = loaded.dom.len(), "snapshot loaded");
    Ok(loaded)
}
