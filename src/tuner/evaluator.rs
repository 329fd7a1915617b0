//! Pipeline-backed evaluator
//!
//! Every evaluation is a complete counting run. Each run is stored as a
//! tuning trial under the next free trial index, and the store is saved after
//! every trial so an interrupted search keeps what it measured.

use super::Evaluator;
use crate::config::{CountingConfig, RunParameters};
use crate::distributed::run_pipeline;
use crate::output::json::{BenchmarkRecord, ResultStore};
use crate::Result;
use anyhow::Context;
use log::info;
use std::path::PathBuf;

pub struct PipelineEvaluator<'a> {
    documents: &'a [PathBuf],
    counting: &'a CountingConfig,
    store: ResultStore,
}

impl<'a> PipelineEvaluator<'a> {
    pub fn new(documents: &'a [PathBuf], counting: &'a CountingConfig, store: ResultStore) -> Self {
        Self {
            documents,
            counting,
            store,
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn into_store(self) -> ResultStore {
        self.store
    }
}

impl Evaluator for PipelineEvaluator<'_> {
    fn evaluate(&mut self, params: RunParameters) -> Result<f64> {
        let outcome = run_pipeline(self.documents, self.counting, params)
            .with_context(|| format!("Tuning run failed for {}", params))?;
        let time = outcome.elapsed().as_secs_f64();

        let index = self.store.next_trial_index();
        self.store.upsert(
            index.to_string(),
            BenchmarkRecord::trial(
                time,
                params,
                outcome.result.most_frequent,
                outcome.result.most_frequent_count,
            ),
        );
        self.store.save()?;

        info!("Trial {}: {} -> {:.3}s", index, params, time);
        Ok(time)
    }
}
