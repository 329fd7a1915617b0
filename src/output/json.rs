//! JSON run-result store
//!
//! The store is a single JSON object mapping a run key to a
//! [`BenchmarkRecord`]. Benchmark runs are keyed by worker count, tuning
//! trials by a monotonically increasing trial index. The whole file is
//! rewritten on every save.
//!
//! ```json
//! {
//!   "1": { "time": 10.0, "speedup": 1.0, "most_frequent_ngram": ["of", "the"], "ngram_count": 812 },
//!   "4": { "time": 2.5,  "speedup": 4.0, "most_frequent_ngram": ["of", "the"], "ngram_count": 812 }
//! }
//! ```
//!
//! Loading is lenient: a missing or empty file is an empty store, and a file
//! that does not parse is logged and replaced by an empty store on the next
//! save.

use crate::config::RunParameters;
use crate::counter::NGram;
use crate::Result;
use anyhow::Context;
use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key of the single-worker baseline record
pub const BASELINE_KEY: &str = "1";

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    /// Speedup needs the single-worker record, which has not been stored yet
    #[error("no baseline record under key \"1\"; run once with a single worker first")]
    MissingBaseline,

    #[error("elapsed time must be positive to compute a speedup, got {0}")]
    InvalidElapsed(f64),
}

/// One stored run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    /// Elapsed seconds (maximum over workers)
    pub time: f64,

    /// Baseline time divided by `time`, null for tuning trials
    pub speedup: Option<f64>,

    /// Highest-count key of the filtered table, null when the table is empty
    pub most_frequent_ngram: Option<NGram>,

    /// Count of `most_frequent_ngram`
    pub ngram_count: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processes: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast_rate: Option<u64>,

    /// RFC 3339 time the record was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<String>,
}

impl BenchmarkRecord {
    /// Record of a benchmark run
    pub fn run(time: f64, speedup: f64, most_frequent: Option<NGram>, count: u64) -> Self {
        Self {
            time,
            speedup: Some(speedup),
            most_frequent_ngram: most_frequent,
            ngram_count: count,
            processes: None,
            granularity: None,
            broadcast_rate: None,
            recorded_at: Some(Utc::now().to_rfc3339()),
        }
    }

    /// Record of a tuning trial, carrying the evaluated parameters
    pub fn trial(
        time: f64,
        params: RunParameters,
        most_frequent: Option<NGram>,
        count: u64,
    ) -> Self {
        Self {
            time,
            speedup: None,
            most_frequent_ngram: most_frequent,
            ngram_count: count,
            processes: Some(params.workers),
            granularity: Some(params.granularity),
            broadcast_rate: Some(params.broadcast_rate),
            recorded_at: Some(Utc::now().to_rfc3339()),
        }
    }

    /// Parameters of a tuning trial, `None` for plain benchmark records
    pub fn parameters(&self) -> Option<RunParameters> {
        Some(RunParameters {
            workers: self.processes?,
            granularity: self.granularity?,
            broadcast_rate: self.broadcast_rate?,
        })
    }
}

/// Speedup of a run against the single-worker baseline time
pub fn compute_speedup(baseline_time: f64, elapsed: f64) -> std::result::Result<f64, StoreError> {
    if elapsed <= 0.0 || !elapsed.is_finite() {
        return Err(StoreError::InvalidElapsed(elapsed));
    }
    Ok(baseline_time / elapsed)
}

/// Persistent map of run key to record
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
    records: BTreeMap<String, BenchmarkRecord>,
}

impl ResultStore {
    /// Empty store that will be written to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: BTreeMap::new(),
        }
    }

    /// Load the store at `path`
    ///
    /// Missing, empty and unparsable files all yield an empty store; only
    /// I/O errors other than "not found" are returned.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("result store {} does not exist yet", path.display());
                return Ok(Self::new(path));
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read result store: {}", path.display()))
            }
        };

        if contents.trim().is_empty() {
            return Ok(Self::new(path));
        }

        match serde_json::from_str::<BTreeMap<String, BenchmarkRecord>>(&contents) {
            Ok(records) => {
                debug!("loaded {} records from {}", records.len(), path.display());
                Ok(Self { path, records })
            }
            Err(e) => {
                warn!(
                    "result store {} is malformed ({}); starting from an empty store",
                    path.display(),
                    e
                );
                Ok(Self::new(path))
            }
        }
    }

    /// Rewrite the whole store file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let file = File::create(&self.path)
            .with_context(|| format!("Failed to create result store: {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.records)
            .with_context(|| format!("Failed to write result store: {}", self.path.display()))?;
        writeln!(writer)?;
        writer.flush()?;

        debug!("saved {} records to {}", self.records.len(), self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&BenchmarkRecord> {
        self.records.get(key)
    }

    /// Insert or overwrite the record under `key`
    pub fn upsert(&mut self, key: impl Into<String>, record: BenchmarkRecord) -> Option<BenchmarkRecord> {
        self.records.insert(key.into(), record)
    }

    /// The single-worker record
    pub fn baseline(&self) -> Option<&BenchmarkRecord> {
        self.get(BASELINE_KEY)
    }

    /// Speedup of a run with `workers` workers that took `elapsed` seconds
    ///
    /// A single-worker run is its own baseline.
    pub fn speedup_for(&self, workers: usize, elapsed: f64) -> std::result::Result<f64, StoreError> {
        if workers == 1 {
            return Ok(1.0);
        }
        let baseline = self.baseline().ok_or(StoreError::MissingBaseline)?;
        compute_speedup(baseline.time, elapsed)
    }

    /// Next unused trial index (one past the largest numeric key)
    pub fn next_trial_index(&self) -> u64 {
        self.records
            .keys()
            .filter_map(|k| k.parse::<u64>().ok())
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Records ordered by numeric key, non-numeric keys last
    pub fn sorted_by_key(&self) -> Vec<(&str, &BenchmarkRecord)> {
        let mut records: Vec<_> = self.records.iter().map(|(k, r)| (k.as_str(), r)).collect();
        records.sort_by_key(|(k, _)| (k.parse::<u64>().map_or(u64::MAX, |n| n), *k));
        records
    }

    /// Records ordered by elapsed time, fastest first
    pub fn sorted_by_time(&self) -> Vec<(&str, &BenchmarkRecord)> {
        let mut records: Vec<_> = self.records.iter().map(|(k, r)| (k.as_str(), r)).collect();
        records.sort_by(|a, b| a.1.time.total_cmp(&b.1.time));
        records
    }

    /// Fastest record
    pub fn best_by_time(&self) -> Option<(&str, &BenchmarkRecord)> {
        self.records
            .iter()
            .min_by(|a, b| a.1.time.total_cmp(&b.1.time))
            .map(|(k, r)| (k.as_str(), r))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BenchmarkRecord)> {
        self.records.iter().map(|(k, r)| (k.as_str(), r))
    }
}
