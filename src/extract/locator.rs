//! Card location: from an instrument-name text node up to the smallest
//! ancestor that holds that instrument's fields and no other instrument.

use std::collections::BTreeSet;

use super::normalizer::{find_instruments, Vocabulary};
use crate::domain::DomTree;

/// Nodes examined on the walk up, the matched node included
pub const MAX_CARD_DEPTH: usize = 15;

/// A located card
#[derive(Debug, Clone)]
pub struct Card<N> {
    pub node: N,
    /// Levels above the matched node (0 = the node itself)
    pub depth: usize,
    /// Flattened text of the card
    pub text: String,
}

/// Why one ancestor was passed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    MissingName,
    MissingLabels,
    Ambiguous,
}

/// Finds card subtrees for one platform's vocabulary
pub struct CardLocator<'a> {
    vocab: &'a Vocabulary,
    max_depth: usize,
}

impl<'a> CardLocator<'a> {
    pub fn new(vocab: &'a Vocabulary) -> Self {
        Self {
            vocab,
            max_depth: MAX_CARD_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Walk up from `start` and return the first ancestor that contains
    /// `asset`, both field labels, and no other instrument name.
    ///
    /// Examines at most `max_depth` nodes, `start` included. `None` when
    /// the bound is exhausted.
    pub fn locate<T: DomTree>(&self, tree: &T, start: T::Node, asset: &str) -> Option<Card<T::Node>> {
        let mut current = Some(start);
        let mut depth = 0usize;

        while let Some(node) = current {
            if depth >= self.max_depth {
                break;
            }
            let text = tree.text(node);
            match self.check(&text, asset) {
                Ok(()) => return Some(Card { node, depth, text }),
                // Ancestors only add text, so every one above is ambiguous too
                Err(Rejection::Ambiguous) => {
                    tracing::trace!(asset, depth, "ancestor holds several instruments");
                    return None;
                }
                Err(_) => {}
            }
            current = tree.parent(node);
            depth += 1;
        }
        None
    }

    fn check(&self, text: &str, asset: &str) -> Result<(), Rejection> {
        let names: BTreeSet<String> = find_instruments(self.vocab.source, text)
            .into_iter()
            .map(|n| n.asset)
            .collect();

        if !names.contains(asset) {
            return Err(Rejection::MissingName);
        }
        if names.len() > 1 {
            return Err(Rejection::Ambiguous);
        }
        if !contains_ci(text, self.vocab.card_leverage_token) || !contains_ci(text, self.vocab.card_apy_token) {
            return Err(Rejection::MissingLabels);
        }
        Ok(())
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
