//! Synchronization schedule
//!
//! A sync round fires on a worker once the number of documents it processed
//! since the last round *exceeds* the granularity, i.e. every
//! `granularity + 1` documents. Rounds are numbered from zero, and round `r`
//! ends with a broadcast of the global table when `r % broadcast_rate == 0`.
//!
//! Because rounds are collective, every worker must join the same number of
//! them. That number depends only on the shard sizes (failed documents count
//! like processed ones), so each worker can compute it up front with
//! [`SyncPolicy::total_rounds`] and pad with idle rounds once its own shard
//! is exhausted.

use serde::{Deserialize, Serialize};

/// The two synchronization knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPolicy {
    /// Documents processed locally before a round fires (exclusive bound)
    pub granularity: u64,

    /// Rounds between broadcasts of the global table (at least 1)
    pub broadcast_rate: u64,
}

impl SyncPolicy {
    pub fn new(granularity: u64, broadcast_rate: u64) -> crate::Result<Self> {
        if broadcast_rate == 0 {
            anyhow::bail!("broadcast_rate must be at least 1");
        }
        Ok(Self {
            granularity,
            broadcast_rate,
        })
    }

    /// Documents consumed by one round
    #[inline]
    pub fn documents_per_round(&self) -> u64 {
        self.granularity.saturating_add(1)
    }

    /// Rounds a shard of `shard_len` documents fires on its own
    pub fn rounds_for(&self, shard_len: usize) -> u64 {
        shard_len as u64 / self.documents_per_round()
    }

    /// Rounds every worker of the group must join
    pub fn total_rounds<I>(&self, shard_lens: I) -> u64
    where
        I: IntoIterator<Item = usize>,
    {
        shard_lens
            .into_iter()
            .map(|len| self.rounds_for(len))
            .max()
            .unwrap_or(0)
    }

    /// Whether round `round` ends with a broadcast
    #[inline]
    pub fn broadcasts_in(&self, round: u64) -> bool {
        round % self.broadcast_rate.max(1) == 0
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            granularity: 1,
            broadcast_rate: 1,
        }
    }
}

/// Per-worker round bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    processed_since_sync: u64,
    round: u64,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one document (counted or skipped)
    #[inline]
    pub fn record_document(&mut self) {
        self.processed_since_sync += 1;
    }

    /// Whether a round is due under `policy`
    #[inline]
    pub fn is_due(&self, policy: &SyncPolicy) -> bool {
        self.processed_since_sync > policy.granularity
    }

    /// Reset the document counter and advance to the next round
    pub fn complete_round(&mut self) {
        self.processed_since_sync = 0;
        self.round += 1;
    }

    /// Index of the next round to run
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn processed_since_sync(&self) -> u64 {
        self.processed_since_sync
    }
}
