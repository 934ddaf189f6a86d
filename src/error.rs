use thiserror::Error;

/// Main error type for the extraction pipeline
#[derive(Error, Debug)]
pub enum ScoutError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Snapshot errors
    #[error("Snapshot load failed: {path} - {reason}")]
    SnapshotLoad { path: String, reason: String },

    // Market data errors
    #[error("Market data unavailable: {0}")]
    MarketDataUnavailable(String),

    // Publish errors
    #[error("Publish failed: {0}")]
    Publish(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ScoutError
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Reasons a single instrument is dropped from a batch.
///
/// These never escape `extract_batch`; they are logged and counted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InstrumentError {
    #[error("Card not found within {depth} ancestors")]
    CardNotFound { depth: usize },

    #[error("Non-finite value in {field}")]
    NonFinite { field: &'static str },
}
