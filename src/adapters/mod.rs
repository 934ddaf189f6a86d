pub mod publisher;
pub mod snapshot_file;
pub mod xsol;

pub use publisher::{write_json_atomic, FilePublisher, GistPublisher, Publisher};
pub use snapshot_file::{load_snapshot, parse_snapshot, LoadedSnapshot};
pub use xsol::{ExchangeStats, XsolClient, SOL_MINT, USDC_MINT, XSOL_MINT};
