//! Worker statistics
//!
//! Each worker fills a [`WorkerReport`] while it walks its shard and hands it
//! to the coordinator in the last gather of the run. The coordinator folds the
//! reports into [`RunStats`]; the run's elapsed time is the slowest worker's.

pub mod aggregator;

use crate::counter::DocumentFailure;
use std::time::Duration;

/// What one worker did during a run
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport {
    /// Rank of the worker
    pub rank: usize,

    /// Documents in the worker's shard
    pub documents_assigned: usize,

    /// Documents counted successfully
    pub documents_counted: u64,

    /// Documents skipped on read/decode errors
    pub failures: Vec<DocumentFailure>,

    /// Synchronization rounds the worker took part in
    pub sync_rounds: u64,

    /// Rounds in which the worker's local view was replaced by a broadcast
    pub broadcasts_received: u64,

    /// Rounds joined after the shard was exhausted, with empty deltas
    pub idle_rounds: u64,

    /// Wall time from shard receipt to completion of the final gather
    pub elapsed: Duration,
}

impl WorkerReport {
    pub fn new(rank: usize, documents_assigned: usize) -> Self {
        Self {
            rank,
            documents_assigned,
            documents_counted: 0,
            failures: Vec::new(),
            sync_rounds: 0,
            broadcasts_received: 0,
            idle_rounds: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Documents skipped on errors
    pub fn documents_failed(&self) -> usize {
        self.failures.len()
    }
}

/// Statistics of one complete run, summed over workers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    /// Per-worker reports in rank order
    pub workers: Vec<WorkerReport>,
}

impl RunStats {
    pub fn new(mut workers: Vec<WorkerReport>) -> Self {
        workers.sort_by_key(|r| r.rank);
        Self { workers }
    }

    /// Run elapsed time: the maximum of the workers' local times
    pub fn elapsed(&self) -> Duration {
        self.workers
            .iter()
            .map(|r| r.elapsed)
            .max()
            .unwrap_or(Duration::ZERO)
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn documents_assigned(&self) -> usize {
        self.workers.iter().map(|r| r.documents_assigned).sum()
    }

    pub fn documents_counted(&self) -> u64 {
        self.workers.iter().map(|r| r.documents_counted).sum()
    }

    pub fn documents_failed(&self) -> usize {
        self.workers.iter().map(WorkerReport::documents_failed).sum()
    }

    /// Sync rounds of the run (every worker joins the same number)
    pub fn sync_rounds(&self) -> u64 {
        self.workers.iter().map(|r| r.sync_rounds).max().unwrap_or(0)
    }

    /// Rounds that ended with a broadcast
    pub fn broadcasts(&self) -> u64 {
        self.workers
            .iter()
            .map(|r| r.broadcasts_received)
            .max()
            .unwrap_or(0)
    }
}
