//! Global table aggregation
//!
//! The [`Aggregator`] is the coordinator's authoritative state. It only grows
//! through [`Aggregator::merge_deltas`], once per gather, and is consumed by
//! [`Aggregator::finish`], which applies the minimum-count filter and extracts
//! the most frequent entry.
//!
//! # Example
//!
//! ```
//! use gramsync::counter::{FrequencyTable, NGram};
//! use gramsync::stats::aggregator::Aggregator;
//!
//! let mut a = FrequencyTable::new();
//! a.add(NGram::from_tokens(["x"]), 3);
//! let mut b = FrequencyTable::new();
//! b.add(NGram::from_tokens(["x"]), 2);
//! b.add(NGram::from_tokens(["y"]), 1);
//!
//! let mut aggregator = Aggregator::new(5);
//! aggregator.merge_deltas(vec![a, b]);
//!
//! let result = aggregator.finish();
//! assert_eq!(result.table.len(), 1);
//! assert_eq!(result.most_frequent_count, 5);
//! ```

use crate::counter::{FrequencyTable, NGram};
use log::trace;

/// Default minimum count for a key to survive the final filter
pub const DEFAULT_MIN_COUNT: u64 = 5;

/// Coordinator-side accumulator
#[derive(Debug)]
pub struct Aggregator {
    /// Authoritative global table
    global: FrequencyTable,

    /// Keys below this count are dropped by `finish`
    min_count: u64,

    /// Number of gathers merged so far
    merges: u64,
}

/// Final result of a run
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    /// Global table after the minimum-count filter
    pub table: FrequencyTable,

    /// Highest-count key of the filtered table, if any
    pub most_frequent: Option<NGram>,

    /// Count of `most_frequent` (0 when the table is empty)
    pub most_frequent_count: u64,

    /// Distinct keys before filtering
    pub keys_before_filter: usize,
}

impl Aggregator {
    pub fn new(min_count: u64) -> Self {
        Self {
            global: FrequencyTable::new(),
            min_count,
            merges: 0,
        }
    }

    /// Sum gathered deltas into the global table
    pub fn merge_deltas(&mut self, deltas: Vec<FrequencyTable>) {
        for (rank, delta) in deltas.into_iter().enumerate() {
            trace!("merging {} keys from rank {}", delta.len(), rank);
            self.global.absorb(delta);
        }
        self.merges += 1;
    }

    /// Current global table
    pub fn global(&self) -> &FrequencyTable {
        &self.global
    }

    /// Number of gathers merged so far
    pub fn merges(&self) -> u64 {
        self.merges
    }

    pub fn min_count(&self) -> u64 {
        self.min_count
    }

    /// Filter the global table and extract the most frequent entry
    pub fn finish(self) -> AggregateResult {
        let keys_before_filter = self.global.len();
        let mut table = self.global;
        table.retain_min_count(self.min_count);

        let (most_frequent, most_frequent_count) = match table.most_frequent() {
            Some((key, count)) => (Some(key.clone()), count),
            None => (None, 0),
        };

        AggregateResult {
            table,
            most_frequent,
            most_frequent_count,
            keys_before_filter,
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, u64)]) -> FrequencyTable {
        entries
            .iter()
            .map(|&(k, c)| (NGram::from_tokens(k.split(' ')), c))
            .collect()
    }

    #[test]
    fn test_aggregator_new() {
        let aggregator = Aggregator::default();
        assert!(aggregator.global().is_empty());
        assert_eq!(aggregator.merges(), 0);
        assert_eq!(aggregator.min_count(), DEFAULT_MIN_COUNT);
    }

    #[test]
    fn test_merge_order_does_not_matter() {
        let deltas = vec![
            table(&[("a b", 2), ("c d", 1)]),
            table(&[("a b", 3)]),
            table(&[("c d", 4), ("e f", 6)]),
        ];

        let mut forward = Aggregator::new(1);
        forward.merge_deltas(deltas.clone());

        let mut reversed = Aggregator::new(1);
        reversed.merge_deltas(deltas.into_iter().rev().collect());

        assert_eq!(forward.global(), reversed.global());
        assert_eq!(forward.global().get(&NGram::from_tokens(["a", "b"])), 5);
    }

    #[test]
    fn test_merge_empty_deltas_is_noop() {
        let mut aggregator = Aggregator::new(1);
        aggregator.merge_deltas(vec![table(&[("x", 2)])]);
        let before = aggregator.global().clone();

        aggregator.merge_deltas(vec![FrequencyTable::new(), FrequencyTable::new()]);
        assert_eq!(aggregator.global(), &before);
        assert_eq!(aggregator.merges(), 2);
    }

    #[test]
    fn test_finish_filters_and_summarizes() {
        let mut aggregator = Aggregator::new(5);
        aggregator.merge_deltas(vec![table(&[("keep", 5), ("drop", 4), ("top", 3)])]);
        aggregator.merge_deltas(vec![table(&[("top", 9)])]);

        let result = aggregator.finish();
        assert_eq!(result.keys_before_filter, 3);
        assert_eq!(result.table.len(), 2);
        assert_eq!(result.table.get(&NGram::from_tokens(["drop"])), 0);
        assert_eq!(result.most_frequent, Some(NGram::from_tokens(["top"])));
        assert_eq!(result.most_frequent_count, 12);
    }

    #[test]
    fn test_finish_everything_filtered() {
        let mut aggregator = Aggregator::new(2);
        aggregator.merge_deltas(vec![table(&[("the cat", 1), ("cat sat", 1)])]);

        let result = aggregator.finish();
        assert!(result.table.is_empty());
        assert_eq!(result.most_frequent, None);
        assert_eq!(result.most_frequent_count, 0);
    }
}
