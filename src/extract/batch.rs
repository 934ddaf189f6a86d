//! Whole-page extraction for one platform snapshot

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::locator::{CardLocator, MAX_CARD_DEPTH};
use super::normalizer::{find_instruments, normalize_card, vocabulary, InstrumentName};
use crate::analytics::apply_analytics;
use crate::domain::{AssetRecord, DomTree, Source};
use crate::error::InstrumentError;

/// Counts from one extraction pass, plus the surviving records
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Distinct instrument names seen in the page
    pub matches: usize,
    /// Instruments whose card was located
    pub located: usize,
    /// Instruments seen in the page but without a usable card
    pub cards_missing: usize,
    /// Records kept after the minimum-field filter
    pub kept: usize,
    /// Records dropped for missing leverage or maturity
    pub dropped_incomplete: usize,
    /// Instruments dropped by a computation fault
    pub faults: usize,
    pub records: Vec<AssetRecord>,
}

/// Runs locate, normalize, analytics and rounding over every instrument
/// in one snapshot.
#[derive(Debug, Clone)]
pub struct BatchExtractor {
    source: Source,
    last_updated: DateTime<Utc>,
    fee_rate: f64,
    max_depth: usize,
}

impl BatchExtractor {
    pub fn new(source: Source, last_updated: DateTime<Utc>) -> Self {
        Self {
            source,
            last_updated,
            fee_rate: source.fee_rate(),
            max_depth: MAX_CARD_DEPTH,
        }
    }

    /// Override the platform fee on recovered yield
    pub fn with_fee_rate(mut self, fee_rate: f64) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn run<T: DomTree>(&self, tree: &T) -> BatchReport {
        let mut report = BatchReport::default();
        let occurrences = self.collect_occurrences(tree);
        report.matches = occurrences.len();

        for (name, nodes) in occurrences {
            match self.extract_one(tree, &name, &nodes) {
                Ok(record) if record.has_required_fields() => {
                    report.located += 1;
                    report.records.push(record);
                }
                Ok(record) => {
                    report.located += 1;
                    report.dropped_incomplete += 1;
                    debug!(
                        asset = %record.asset,
                        leverage = ?record.leverage,
                        maturity_days = ?record.maturity_days,
                        "dropping incomplete record"
                    );
                }
                Err(InstrumentError::CardNotFound { depth }) => {
                    report.cards_missing += 1;
                    debug!(asset = %name.asset, depth, "card not found");
                }
                Err(e) => {
                    report.faults += 1;
                    warn!(asset = %name.asset, error = %e, "instrument skipped");
                }
            }
        }

        report.kept = report.records.len();
        info!(
            source = %self.source,
            matches = report.matches,
            located = report.located,
            cards_missing = report.cards_missing,
            kept = report.kept,
            dropped = report.dropped_incomplete,
            faults = report.faults,
            "batch extracted"
        );
        report
    }

    /// Instrument names in first-seen order, each with every text node that
    /// mentions it
    fn collect_occurrences<T: DomTree>(&self, tree: &T) -> Vec<(InstrumentName, Vec<T::Node>)> {
        let mut order: Vec<(InstrumentName, Vec<T::Node>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for node in tree.text_nodes() {
            let Some(text) = tree.own_text(node) else {
                continue;
            };
            for name in find_instruments(self.source, text) {
                match index.get(&name.asset) {
                    Some(&i) => {
                        if !order[i].1.contains(&node) {
                            order[i].1.push(node);
                        }
                    }
                    None => {
                        index.insert(name.asset.clone(), order.len());
                        order.push((name, vec![node]));
                    }
                }
            }
        }
        order
    }

    fn extract_one<T: DomTree>(
        &self,
        tree: &T,
        name: &InstrumentName,
        nodes: &[T::Node],
    ) -> Result<AssetRecord, InstrumentError> {
        let locator = CardLocator::new(vocabulary(self.source)).with_max_depth(self.max_depth);
        let card = nodes
            .iter()
            .find_map(|n| locator.locate(tree, *n, &name.asset))
            .ok_or(InstrumentError::CardNotFound { depth: self.max_depth })?;

        let record = normalize_card(tree, card.node, &card.text, name, self.source, self.last_updated);
        check_finite(&record)?;
        Ok(apply_analytics(record, self.last_updated, self.fee_rate))
    }
}

fn check_finite(record: &AssetRecord) -> Result<(), InstrumentError> {
    let fields = [
        ("leverage", record.leverage),
        ("apy", record.apy),
        ("impliedYield", record.implied_yield),
        ("rangeLower", record.range_lower),
        ("rangeUpper", record.range_upper),
        ("assetBoost", record.asset_boost),
        ("ratexBoost", record.ratex_boost),
    ];
    for (field, value) in fields {
        if value.is_some_and(|v| !v.is_finite()) {
            return Err(InstrumentError::NonFinite { field });
        }
    }
    Ok(())
}

/// Extract every complete record from one snapshot.
///
/// Never fails: instruments that cannot be read are left out.
pub fn extract_batch<T: DomTree>(tree: &T, source: Source, last_updated: DateTime<Utc>) -> Vec<AssetRecord> {
    BatchExtractor::new(source, last_updated).run(tree).records
}
