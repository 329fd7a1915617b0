//! Benchmark harness
//!
//! Wraps one full pipeline run with its bookkeeping: the elapsed time of the
//! run, its speedup against the single-worker baseline and the record written
//! to the result store under the worker count.
//!
//! A run with one worker is the baseline (speedup 1). Any other worker count
//! needs the baseline record to be present already; without it the run is
//! refused with [`StoreError::MissingBaseline`] before any work starts.

use crate::config::{CountingConfig, RunParameters};
use crate::distributed::{run_pipeline, RunOutcome};
use crate::output::json::{BenchmarkRecord, ResultStore, StoreError};
use crate::Result;
use log::info;
use std::path::{Path, PathBuf};

/// Benchmark runs recorded into one result store
#[derive(Debug)]
pub struct BenchmarkHarness {
    store: ResultStore,
}

impl BenchmarkHarness {
    /// Open (or start) the result store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            store: ResultStore::load(path)?,
        })
    }

    pub fn with_store(store: ResultStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Run the pipeline once, then record and persist the result
    pub fn run(
        &mut self,
        documents: &[PathBuf],
        counting: &CountingConfig,
        params: RunParameters,
    ) -> Result<(RunOutcome, BenchmarkRecord)> {
        if params.workers != 1 && self.store.baseline().is_none() {
            return Err(StoreError::MissingBaseline.into());
        }

        let outcome = run_pipeline(documents, counting, params)?;
        let record = self.record_run(&outcome)?;
        Ok((outcome, record))
    }

    /// Store the record of a finished run under its worker count
    ///
    /// Any previous record with the same worker count is overwritten.
    pub fn record_run(&mut self, outcome: &RunOutcome) -> Result<BenchmarkRecord> {
        let workers = outcome.params.workers;
        let time = outcome.elapsed().as_secs_f64();
        let speedup = self.store.speedup_for(workers, time)?;

        let record = BenchmarkRecord::run(
            time,
            speedup,
            outcome.result.most_frequent.clone(),
            outcome.result.most_frequent_count,
        );
        self.store.upsert(workers.to_string(), record.clone());
        self.store.save()?;

        info!(
            "Recorded {} workers: {:.3}s, speedup {:.2} -> {}",
            workers,
            time,
            speedup,
            self.store.path().display()
        );
        Ok(record)
    }
}
