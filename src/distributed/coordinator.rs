//! Pipeline driver
//!
//! Wires one complete counting run together: partition the document list,
//! create the worker group, run every worker on its own thread and collect
//! the coordinator's aggregate. The group is created per run and never
//! resized.

use crate::config::{CountingConfig, RunParameters};
use crate::corpus::{self, Shard};
use crate::distributed::collective::{CollectiveError, Group};
use crate::distributed::protocol::Message;
use crate::stats::aggregator::AggregateResult;
use crate::stats::RunStats;
use crate::worker::{RoundHook, Worker, WorkerOutcome, WorkerSettings};
use crate::Result;
use anyhow::Context;
use log::{debug, info};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// Everything the coordinator knows after a run
#[derive(Debug)]
pub struct RunOutcome {
    pub params: RunParameters,

    /// Filtered global table and its most frequent entry
    pub result: AggregateResult,

    /// Per-worker reports, rank ordered
    pub stats: RunStats,
}

impl RunOutcome {
    /// Run time: the slowest worker's elapsed time
    pub fn elapsed(&self) -> Duration {
        self.stats.elapsed()
    }
}

/// Run the full pipeline over `documents` with the given parameters
pub fn run_pipeline(
    documents: &[PathBuf],
    counting: &CountingConfig,
    params: RunParameters,
) -> Result<RunOutcome> {
    run_observed(documents, counting, params, |_| None)
}

/// [`run_pipeline`] with an optional round hook installed per rank
fn run_observed(
    documents: &[PathBuf],
    counting: &CountingConfig,
    params: RunParameters,
    hooks: impl FnMut(usize) -> Option<RoundHook>,
) -> Result<RunOutcome> {
    let policy = params.sync_policy()?;
    let shards = corpus::partition(documents, params.workers)?;
    let total_rounds = policy.total_rounds(shards.iter().map(Vec::len));

    let settings = WorkerSettings {
        tokenizer: counting.tokenizer(),
        policy,
        min_count: counting.min_count,
        total_rounds,
    };

    info!(
        "Starting run: {} documents, {} ({} sync rounds)",
        documents.len(),
        params,
        total_rounds
    );

    let outcomes = spawn_workers(shards, settings, hooks)?;
    let (result, stats) = outcomes
        .into_iter()
        .find_map(|outcome| outcome.aggregate)
        .context("Coordinator finished without an aggregate")?;

    info!(
        "Run finished in {:.3}s: {} keys kept of {}",
        stats.elapsed().as_secs_f64(),
        result.table.len(),
        result.keys_before_filter
    );

    Ok(RunOutcome {
        params,
        result,
        stats,
    })
}

/// Spawn one thread per shard and wait for all of them
fn spawn_workers(
    shards: Vec<Shard>,
    settings: WorkerSettings,
    mut hooks: impl FnMut(usize) -> Option<RoundHook>,
) -> Result<Vec<WorkerOutcome>> {
    let comms = Group::create::<Message>(shards.len())?;

    let mut handles = Vec::with_capacity(shards.len());
    for (comm, shard) in comms.into_iter().zip(shards) {
        let rank = comm.rank();
        let mut worker = Worker::new(comm, shard, settings);
        if let Some(hook) = hooks(rank) {
            worker = worker.with_round_hook(hook);
        }
        let handle = thread::Builder::new()
            .name(format!("gramsync-worker-{}", rank))
            .spawn(move || worker.run())
            .with_context(|| format!("Failed to spawn worker thread {}", rank))?;
        handles.push((rank, handle));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    let mut errors = Vec::new();
    for (rank, handle) in handles {
        match handle.join() {
            Ok(Ok(outcome)) => outcomes.push(outcome),
            Ok(Err(e)) => errors.push(e),
            Err(_) => errors.push(anyhow::anyhow!("Worker thread {} panicked", rank)),
        }
    }

    match first_cause(errors) {
        Some(e) => Err(e.context("Run aborted")),
        None => Ok(outcomes),
    }
}

/// Pick the error that caused a failed run
///
/// When one worker fails, its peers see their channels disconnect. Those
/// secondary errors are only reported when nothing else failed.
fn first_cause(errors: Vec<anyhow::Error>) -> Option<anyhow::Error> {
    let is_disconnect = |e: &anyhow::Error| {
        matches!(
            e.root_cause().downcast_ref::<CollectiveError>(),
            Some(CollectiveError::Disconnected { .. })
        )
    };

    for e in &errors {
        debug!("worker error: {:#}", e);
    }

    let mut errors = errors.into_iter();
    let first = errors.next()?;
    if !is_disconnect(&first) {
        return Some(first);
    }
    Some(errors.find(|e| !is_disconnect(e)).unwrap_or(first))
}

/// Start a group of `size` workers and gather a greeting from every rank
///
/// Returns the greetings in rank order as received by the coordinator.
pub fn greet(size: usize) -> Result<Vec<String>> {
    let comms = Group::create::<String>(size)?;

    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            let rank = comm.rank();
            thread::Builder::new()
                .name(format!("gramsync-worker-{}", rank))
                .spawn(move || {
                    let greeting = format!("Hello from rank {} of {}", comm.rank(), comm.size());
                    comm.gather(greeting)
                })
                .with_context(|| format!("Failed to spawn worker thread {}", rank))
        })
        .collect::<Result<_>>()?;

    let mut greetings = None;
    for (rank, handle) in handles.into_iter().enumerate() {
        let gathered = handle
            .join()
            .map_err(|_| anyhow::anyhow!("Worker thread {} panicked", rank))??;
        if gathered.is_some() {
            greetings = gathered;
        }
    }

    greetings.context("Coordinator did not receive any greeting")
}
