//! Frequency counting
//!
//! This module provides the n-gram key type, the frequency table that every
//! worker and the coordinator accumulate into, and the per-worker
//! [`LocalCounter`] that turns documents into table deltas.
//!
//! # Example
//!
//! ```
//! use gramsync::counter::{FrequencyTable, NGram, tokenize::Tokenizer};
//!
//! let mut table = FrequencyTable::new();
//! Tokenizer::NGram { size: 2 }.count_text("the cat sat on the mat", &mut table);
//!
//! assert_eq!(table.len(), 5);
//! assert_eq!(table.get(&NGram::from_tokens(["the", "cat"])), 1);
//! ```

pub mod local;
pub mod tokenize;

pub use local::{DocumentFailure, LocalCounter};

use serde::{Deserialize, Serialize};
use std::collections::hash_map::{self, HashMap};
use std::fmt;

/// Ordered sequence of lowercased tokens taken from one line
///
/// Equality and hashing are structural over the whole sequence, so
/// `["the", "cat"]` and `["cat", "the"]` are different keys. Word mode uses
/// single-token keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NGram(Box<[String]>);

impl NGram {
    /// Build a key from tokens, keeping them as given
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    /// Tokens in order
    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    /// Number of tokens in the key
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NGram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// Mapping from key to occurrence count
///
/// Tables are the unit exchanged by the collective operations: workers gather
/// their deltas to the coordinator, and the coordinator broadcasts its global
/// table back. Merging sums counts per key, which makes it commutative and
/// associative, with the empty table as identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: HashMap<NGram, u64>,
}

impl FrequencyTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Count for `key`, zero if absent
    pub fn get(&self, key: &NGram) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Add one occurrence of `key`
    #[inline]
    pub fn increment(&mut self, key: NGram) {
        self.add(key, 1);
    }

    /// Add `count` occurrences of `key`
    #[inline]
    pub fn add(&mut self, key: NGram, count: u64) {
        *self.counts.entry(key).or_insert(0) += count;
    }

    /// Sum every count of `other` into this table
    pub fn merge(&mut self, other: &FrequencyTable) {
        for (key, &count) in &other.counts {
            match self.counts.get_mut(key) {
                Some(existing) => *existing += count,
                None => {
                    self.counts.insert(key.clone(), count);
                }
            }
        }
    }

    /// Sum every count of `other` into this table, consuming it
    ///
    /// Avoids cloning keys when the other table is no longer needed, which is
    /// the common case for gathered deltas.
    pub fn absorb(&mut self, other: FrequencyTable) {
        if self.counts.is_empty() {
            self.counts = other.counts;
            return;
        }
        for (key, count) in other.counts {
            self.add(key, count);
        }
    }

    /// Move the contents out, leaving this table empty
    pub fn take(&mut self) -> FrequencyTable {
        std::mem::take(self)
    }

    /// Drop every key whose count is below `min_count`
    pub fn retain_min_count(&mut self, min_count: u64) {
        self.counts.retain(|_, count| *count >= min_count);
    }

    /// Entry with the highest count
    ///
    /// Among equal maxima the first one met in iteration order wins, so the
    /// choice is not reproducible across runs.
    pub fn most_frequent(&self) -> Option<(&NGram, u64)> {
        let mut best: Option<(&NGram, u64)> = None;
        for (key, &count) in &self.counts {
            match best {
                Some((_, best_count)) if best_count >= count => {}
                _ => best = Some((key, count)),
            }
        }
        best
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, NGram, u64> {
        self.counts.iter()
    }

    /// Entries sorted by descending count, then by key
    pub fn sorted_by_count(&self) -> Vec<(&NGram, u64)> {
        let mut entries: Vec<(&NGram, u64)> = self.counts.iter().map(|(k, &c)| (k, c)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

impl FromIterator<(NGram, u64)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (NGram, u64)>>(iter: I) -> Self {
        let mut table = FrequencyTable::new();
        for (key, count) in iter {
            table.add(key, count);
        }
        table
    }
}

impl<'a> IntoIterator for &'a FrequencyTable {
    type Item = (&'a NGram, &'a u64);
    type IntoIter = hash_map::Iter<'a, NGram, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gram(tokens: &[&str]) -> NGram {
        NGram::from_tokens(tokens.iter().copied())
    }

    fn table(entries: &[(&str, u64)]) -> FrequencyTable {
        entries
            .iter()
            .map(|&(k, c)| (NGram::from_tokens(k.split(' ')), c))
            .collect()
    }

    #[test]
    fn test_ngram_structural_equality() {
        assert_eq!(gram(&["the", "cat"]), gram(&["the", "cat"]));
        assert_ne!(gram(&["the", "cat"]), gram(&["cat", "the"]));
        assert_ne!(gram(&["the"]), gram(&["the", "cat"]));
    }

    #[test]
    fn test_ngram_display() {
        assert_eq!(gram(&["on", "the", "mat"]).to_string(), "on the mat");
    }

    #[test]
    fn test_ngram_serializes_as_array() {
        let json = serde_json::to_string(&gram(&["a", "b"])).unwrap();
        assert_eq!(json, r#"["a","b"]"#);

        let back: NGram = serde_json::from_str(&json).unwrap();
        assert_eq!(back, gram(&["a", "b"]));
    }

    #[test]
    fn test_increment_and_get() {
        let mut t = FrequencyTable::new();
        t.increment(gram(&["x"]));
        t.increment(gram(&["x"]));
        t.add(gram(&["y"]), 3);

        assert_eq!(t.get(&gram(&["x"])), 2);
        assert_eq!(t.get(&gram(&["y"])), 3);
        assert_eq!(t.get(&gram(&["z"])), 0);
        assert_eq!(t.total(), 5);
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let original = table(&[("a", 2), ("b", 7)]);

        let mut left = original.clone();
        left.merge(&FrequencyTable::new());
        assert_eq!(left, original);

        let mut right = FrequencyTable::new();
        right.merge(&original);
        assert_eq!(right, original);
    }

    #[test]
    fn test_merge_is_commutative() {
        let a = table(&[("a", 2), ("b", 1)]);
        let b = table(&[("b", 4), ("c", 5)]);

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);

        assert_eq!(ab, ba);
        assert_eq!(ab.get(&gram(&["b"])), 5);
    }

    #[test]
    fn test_merge_is_associative() {
        let a = table(&[("a", 1)]);
        let b = table(&[("a", 2), ("b", 3)]);
        let c = table(&[("b", 4), ("c", 5)]);

        let mut left = a.clone();
        left.merge(&b);
        left.merge(&c);

        let mut bc = b.clone();
        bc.merge(&c);
        let mut right = a.clone();
        right.merge(&bc);

        assert_eq!(left, right);
    }

    #[test]
    fn test_absorb_matches_merge() {
        let a = table(&[("a", 1), ("b", 2)]);
        let b = table(&[("b", 3), ("c", 4)]);

        let mut merged = a.clone();
        merged.merge(&b);
        let mut absorbed = a.clone();
        absorbed.absorb(b.clone());
        assert_eq!(merged, absorbed);

        let mut from_empty = FrequencyTable::new();
        from_empty.absorb(b.clone());
        assert_eq!(from_empty, b);
    }

    #[test]
    fn test_take_leaves_empty() {
        let mut t = table(&[("a", 1)]);
        let taken = t.take();
        assert!(t.is_empty());
        assert_eq!(taken.len(), 1);
    }

    #[test]
    fn test_filter_keeps_exactly_threshold_and_above() {
        let mut t = table(&[("low", 4), ("edge", 5), ("high", 9)]);
        t.retain_min_count(5);

        assert_eq!(t.len(), 2);
        assert_eq!(t.get(&gram(&["edge"])), 5);
        assert_eq!(t.get(&gram(&["high"])), 9);
        assert_eq!(t.get(&gram(&["low"])), 0);
    }

    #[test]
    fn test_most_frequent() {
        let t = table(&[("a", 3), ("b", 8), ("c", 1)]);
        let (key, count) = t.most_frequent().unwrap();
        assert_eq!(key, &gram(&["b"]));
        assert_eq!(count, 8);

        assert!(FrequencyTable::new().most_frequent().is_none());
    }

    #[test]
    fn test_most_frequent_tie_returns_one_of_maxima() {
        let t = table(&[("a", 4), ("b", 4), ("c", 1)]);
        let (key, count) = t.most_frequent().unwrap();
        assert_eq!(count, 4);
        assert!(key == &gram(&["a"]) || key == &gram(&["b"]));
    }

    #[test]
    fn test_sorted_by_count() {
        let t = table(&[("b", 2), ("a", 2), ("c", 9)]);
        let sorted: Vec<(String, u64)> = t
            .sorted_by_count()
            .into_iter()
            .map(|(k, c)| (k.to_string(), c))
            .collect();
        assert_eq!(
            sorted,
            vec![("c".to_string(), 9), ("a".to_string(), 2), ("b".to_string(), 2)]
        );
    }
}
