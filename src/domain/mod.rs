pub mod asset;
pub mod snapshot;

pub use asset::*;
pub use snapshot::*;
