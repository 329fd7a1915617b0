//! Worker implementation
//!
//! This module implements the Worker, the unit that walks one shard of the
//! corpus and takes part in the bulk-synchronous counting protocol. Every
//! worker, the coordinator (rank 0) included, runs the same loop:
//!
//! 1. Count a document into both the delta (counts since the last gather)
//!    and the local view.
//! 2. When the sync schedule says a round is due, gather deltas to the
//!    coordinator, which merges them into the global table. Deltas are
//!    cleared at the gather. On broadcast rounds the coordinator pushes the
//!    global table and every worker replaces its local view with it.
//! 3. After the shard is exhausted, join the remaining rounds of the group
//!    with empty deltas, then the unconditional final gather, then the
//!    report gather.
//!
//! # Lifecycle
//!
//! ```text
//! Worker::new() -> run() -> WorkerOutcome
//!                    |
//!                    +-- coordinator: Some(AggregateResult + RunStats)
//!                    +-- others:      None
//! ```

pub mod sync;

use crate::counter::tokenize::Tokenizer;
use crate::counter::{FrequencyTable, LocalCounter};
use crate::distributed::collective::Communicator;
use crate::distributed::protocol::Message;
use crate::stats::aggregator::{AggregateResult, Aggregator};
use crate::stats::{RunStats, WorkerReport};
use crate::util::time::Timestamp;
use crate::Result;
use anyhow::Context;
use log::{debug, trace};
use std::path::PathBuf;
use sync::{SyncPolicy, SyncState};

/// Snapshot handed to a round hook at the end of every sync round
#[derive(Debug)]
pub struct RoundEvent<'a> {
    pub rank: usize,
    pub round: u64,
    /// Whether this round ended with a broadcast
    pub broadcast: bool,
    /// The worker's local view after the round
    pub view: &'a FrequencyTable,
}

/// Callback invoked after every sync round
pub type RoundHook = Box<dyn FnMut(&RoundEvent<'_>) + Send>;

/// Per-run settings shared by every worker
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub tokenizer: Tokenizer,
    pub policy: SyncPolicy,
    pub min_count: u64,
    /// Rounds every worker joins, computed from all shard sizes
    pub total_rounds: u64,
}

/// Result of a finished worker
#[derive(Debug)]
pub struct WorkerOutcome {
    pub rank: usize,
    /// Filtered table and run statistics, only on the coordinator
    pub aggregate: Option<(AggregateResult, RunStats)>,
}

/// One participant of a counting run
pub struct Worker {
    comm: Communicator<Message>,

    shard: Vec<PathBuf>,

    settings: WorkerSettings,

    counter: LocalCounter,

    state: SyncState,

    /// Counts since the last gather
    delta: FrequencyTable,

    /// Local view: last broadcast global table plus own counts since
    view: FrequencyTable,

    /// Global state, only on the coordinator
    aggregator: Option<Aggregator>,

    report: WorkerReport,

    round_hook: Option<RoundHook>,
}

impl Worker {
    /// Create a worker for the shard assigned to `comm.rank()`
    pub fn new(comm: Communicator<Message>, shard: Vec<PathBuf>, settings: WorkerSettings) -> Self {
        let rank = comm.rank();
        let aggregator = comm
            .is_coordinator()
            .then(|| Aggregator::new(settings.min_count));
        Self {
            report: WorkerReport::new(rank, shard.len()),
            counter: LocalCounter::new(rank, settings.tokenizer),
            comm,
            shard,
            settings,
            state: SyncState::new(),
            delta: FrequencyTable::new(),
            view: FrequencyTable::new(),
            aggregator,
            round_hook: None,
        }
    }

    /// Install a callback observing the local view after every round
    pub fn with_round_hook(mut self, hook: RoundHook) -> Self {
        self.round_hook = Some(hook);
        self
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    /// Run the shard to completion
    pub fn run(mut self) -> Result<WorkerOutcome> {
        let rank = self.rank();
        let start = Timestamp::now();
        debug!(
            "rank {}: {} documents assigned, {} sync rounds scheduled",
            rank,
            self.shard.len(),
            self.settings.total_rounds
        );

        let shard = std::mem::take(&mut self.shard);
        for path in &shard {
            if let Some(table) = self.counter.count_document(path) {
                self.view.merge(&table);
                self.delta.absorb(table);
            }
            self.state.record_document();

            if self.state.is_due(&self.settings.policy) {
                self.sync_round()
                    .with_context(|| format!("rank {}: sync round {} failed", rank, self.state.round()))?;
            }
        }

        while self.state.round() < self.settings.total_rounds {
            self.report.idle_rounds += 1;
            self.sync_round()
                .with_context(|| format!("rank {}: sync round {} failed", rank, self.state.round()))?;
        }

        self.gather_delta().with_context(|| format!("rank {}: final gather failed", rank))?;

        self.report.documents_counted = self.counter.counted();
        self.report.failures = self.counter.take_failures();
        self.report.elapsed = start.elapsed();
        debug!(
            "rank {}: finished in {:.3}s ({} counted, {} skipped)",
            rank,
            self.report.elapsed.as_secs_f64(),
            self.report.documents_counted,
            self.report.documents_failed()
        );

        let gathered = self
            .comm
            .gather(Message::Report(self.report))
            .with_context(|| format!("rank {}: report gather failed", rank))?;

        let aggregate = match (gathered, self.aggregator) {
            (Some(messages), Some(aggregator)) => {
                let reports = messages
                    .into_iter()
                    .map(|m| m.into_report(rank))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Some((aggregator.finish(), RunStats::new(reports)))
            }
            _ => None,
        };

        Ok(WorkerOutcome { rank, aggregate })
    }

    /// One full sync round: gather, merge, and broadcast when scheduled
    fn sync_round(&mut self) -> Result<()> {
        let round = self.state.round();
        self.gather_delta()?;

        let broadcast = self.settings.policy.broadcasts_in(round);
        if broadcast {
            let outgoing = match &self.aggregator {
                Some(aggregator) => aggregator.global().clone(),
                None => std::mem::take(&mut self.view),
            };
            let incoming = self.comm.broadcast(Message::Global(outgoing))?;
            self.view = incoming.into_global(self.rank())?;
            self.report.broadcasts_received += 1;
        }

        trace!(
            "rank {}: round {} done (broadcast: {}, view: {} keys)",
            self.rank(),
            round,
            broadcast,
            self.view.len()
        );

        self.state.complete_round();
        self.report.sync_rounds += 1;

        if let Some(hook) = self.round_hook.as_mut() {
            hook(&RoundEvent {
                rank: self.comm.rank(),
                round,
                broadcast,
                view: &self.view,
            });
        }
        Ok(())
    }

    /// Gather the delta to the coordinator and merge it there
    ///
    /// The delta is emptied as it is handed to the gather, so no count is
    /// ever sent twice.
    fn gather_delta(&mut self) -> Result<()> {
        let delta = self.delta.take();
        let gathered = self.comm.gather(Message::Delta(delta))?;

        if let (Some(messages), Some(aggregator)) = (gathered, self.aggregator.as_mut()) {
            let rank = self.comm.rank();
            let deltas = messages
                .into_iter()
                .map(|m| m.into_delta(rank))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            aggregator.merge_deltas(deltas);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::partition;
    use crate::counter::NGram;
    use crate::distributed::collective::Group;
    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use tempfile::TempDir;

    type Observed = Arc<Mutex<Vec<(usize, u64, bool, FrequencyTable)>>>;

    /// Each document holds a word unique to its worker plus a shared word
    fn corpus(dir: &TempDir, docs: usize, workers: usize) -> Vec<PathBuf> {
        (0..docs)
            .map(|i| {
                let path = dir.path().join(format!("doc_{:03}.txt", i));
                fs::write(&path, format!("shared owner{}\n", i % workers)).unwrap();
                path
            })
            .collect()
    }

    fn run_group(
        documents: &[PathBuf],
        workers: usize,
        policy: SyncPolicy,
        observed: Option<Observed>,
    ) -> (AggregateResult, RunStats) {
        let shards = partition(documents, workers).unwrap();
        let settings = WorkerSettings {
            tokenizer: Tokenizer::Word,
            policy,
            min_count: 1,
            total_rounds: policy.total_rounds(shards.iter().map(Vec::len)),
        };

        let comms = Group::create::<Message>(workers).unwrap();
        let handles: Vec<_> = comms
            .into_iter()
            .zip(shards)
            .map(|(comm, shard)| {
                let mut worker = Worker::new(comm, shard, settings);
                if let Some(observed) = observed.clone() {
                    let hook: RoundHook = Box::new(move |e: &RoundEvent<'_>| {
                        observed
                            .lock()
                            .unwrap()
                            .push((e.rank, e.round, e.broadcast, e.view.clone()));
                    });
                    worker = worker.with_round_hook(hook);
                }
                thread::spawn(move || worker.run())
            })
            .collect();

        let mut aggregate = None;
        for handle in handles {
            let outcome = handle.join().unwrap().unwrap();
            if outcome.rank == 0 {
                aggregate = outcome.aggregate;
            } else {
                assert!(outcome.aggregate.is_none());
            }
        }
        aggregate.unwrap()
    }

    fn rounds_by_index(observed: &Observed) -> BTreeMap<u64, Vec<(usize, bool, FrequencyTable)>> {
        let mut rounds: BTreeMap<u64, Vec<_>> = BTreeMap::new();
        for (rank, round, broadcast, view) in observed.lock().unwrap().iter().cloned() {
            rounds.entry(round).or_default().push((rank, broadcast, view));
        }
        rounds
    }

    #[test]
    fn test_every_document_counted_exactly_once() {
        let dir = TempDir::new().unwrap();
        let docs = corpus(&dir, 23, 4);

        for (granularity, rate) in [(0, 1), (1, 1), (2, 3), (100, 1), (3, 2)] {
            let policy = SyncPolicy::new(granularity, rate).unwrap();
            let (result, stats) = run_group(&docs, 4, policy, None);

            assert_eq!(result.table.get(&NGram::from_tokens(["shared"])), 23);
            assert_eq!(result.table.total(), 46, "granularity={} rate={}", granularity, rate);
            assert_eq!(stats.documents_counted(), 23);
            assert_eq!(stats.num_workers(), 4);
        }
    }

    #[test]
    fn test_all_workers_join_the_same_rounds() {
        let dir = TempDir::new().unwrap();
        // 7 docs over 3 workers: shards of 3, 2, 2
        let docs = corpus(&dir, 7, 3);
        let policy = SyncPolicy::new(0, 1).unwrap();
        let (_, stats) = run_group(&docs, 3, policy, None);

        for report in &stats.workers {
            assert_eq!(report.sync_rounds, 3, "rank {}", report.rank);
        }
        assert_eq!(stats.workers[0].idle_rounds, 0);
        assert_eq!(stats.workers[1].idle_rounds, 1);
        assert_eq!(stats.workers[2].idle_rounds, 1);
    }

    #[test]
    fn test_broadcast_every_round_gives_identical_views() {
        let dir = TempDir::new().unwrap();
        let docs = corpus(&dir, 12, 3);
        let observed: Observed = Arc::default();
        run_group(&docs, 3, SyncPolicy::new(0, 1).unwrap(), Some(observed.clone()));

        let rounds = rounds_by_index(&observed);
        assert_eq!(rounds.len(), 4);
        for (round, views) in rounds {
            assert_eq!(views.len(), 3);
            assert!(views.iter().all(|(_, broadcast, _)| *broadcast));
            let first = &views[0].2;
            assert!(views.iter().all(|(_, _, v)| v == first), "round {}", round);
            // After round r every worker has seen (r + 1) documents from each of 3 shards
            assert_eq!(first.get(&NGram::from_tokens(["shared"])), 3 * (round + 1));
        }
    }

    #[test]
    fn test_views_diverge_between_broadcasts() {
        let dir = TempDir::new().unwrap();
        let docs = corpus(&dir, 12, 3);
        let observed: Observed = Arc::default();
        run_group(&docs, 3, SyncPolicy::new(0, 2).unwrap(), Some(observed.clone()));

        let rounds = rounds_by_index(&observed);
        assert_eq!(rounds.len(), 4);
        for (round, views) in rounds {
            let broadcast = round % 2 == 0;
            assert!(views.iter().all(|(_, b, _)| *b == broadcast), "round {}", round);

            let first = &views[0].2;
            let identical = views.iter().all(|(_, _, v)| v == first);
            assert_eq!(identical, broadcast, "round {}", round);

            if !broadcast {
                // Last broadcast (round - 1) plus one own document since
                for (rank, _, view) in &views {
                    assert_eq!(view.get(&NGram::from_tokens(["shared"])), 3 * round + 1);
                    let own = NGram::from_tokens([format!("owner{}", rank)]);
                    assert_eq!(view.get(&own), round + 1);
                }
            }
        }
    }

    #[test]
    fn test_single_worker_run() {
        let dir = TempDir::new().unwrap();
        let docs = corpus(&dir, 5, 1);
        let (result, stats) = run_group(&docs, 1, SyncPolicy::new(1, 1).unwrap(), None);

        assert_eq!(result.table.get(&NGram::from_tokens(["shared"])), 5);
        assert_eq!(stats.sync_rounds(), 2);
        assert!(stats.workers[0].elapsed > std::time::Duration::ZERO);
        assert_eq!(stats.elapsed(), stats.workers[0].elapsed);
    }

    #[test]
    fn test_more_workers_than_documents() {
        let dir = TempDir::new().unwrap();
        let docs = corpus(&dir, 2, 2);
        let (result, stats) = run_group(&docs, 5, SyncPolicy::new(0, 1).unwrap(), None);

        assert_eq!(result.table.get(&NGram::from_tokens(["shared"])), 2);
        assert_eq!(stats.workers[4].documents_assigned, 0);
        assert_eq!(stats.workers[4].sync_rounds, 1);
    }

    #[test]
    fn test_failed_document_is_reported_and_skipped() {
        let dir = TempDir::new().unwrap();
        let mut docs = corpus(&dir, 4, 2);
        docs.push(dir.path().join("missing.txt"));

        let (result, stats) = run_group(&docs, 2, SyncPolicy::new(0, 1).unwrap(), None);
        assert_eq!(result.table.get(&NGram::from_tokens(["shared"])), 4);
        assert_eq!(stats.documents_failed(), 1);
        assert_eq!(stats.workers[0].failures[0].path, dir.path().join("missing.txt"));
        // The skipped document still drives the schedule: rank 0 holds 3 documents
        assert_eq!(stats.sync_rounds(), 3);
    }
}
