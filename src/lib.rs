pub mod adapters;
pub mod analytics;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod services;

pub use config::AppConfig;
pub use domain::{AssetRecord, BatchResult, DomSnapshot, DomTree, RawNode, Source};
pub use error::{Result, ScoutError};
pub use extract::{extract_batch, BatchExtractor, BatchReport};
