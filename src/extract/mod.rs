//! DOM snapshot to canonical asset records

pub mod batch;
pub mod fields;
pub mod format;
pub mod locator;
pub mod normalizer;

pub use batch::{extract_batch, BatchExtractor, BatchReport};
pub use format::{format_percentage, format_yt_price};
pub use locator::{Card, CardLocator, MAX_CARD_DEPTH};
pub use normalizer::{find_instruments, normalize_card, vocabulary, InstrumentName, Vocabulary};
