//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! Every section has defaults, so an empty TOML file is a valid configuration
//! once a corpus root is supplied.

pub mod cli;
pub mod toml;
pub mod validator;

use crate::counter::tokenize::Tokenizer;
use crate::stats::aggregator::DEFAULT_MIN_COUNT;
use crate::worker::sync::SyncPolicy;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Complete run configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub counting: CountingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub tuner: TunerConfig,
}

impl Config {
    /// Synchronization policy of a single run
    pub fn sync_policy(&self) -> crate::Result<SyncPolicy> {
        SyncPolicy::new(self.sync.granularity, self.sync.broadcast_rate)
    }

    /// The three tunable parameters of a single run
    pub fn run_parameters(&self) -> RunParameters {
        RunParameters {
            workers: self.workers.count,
            granularity: self.sync.granularity,
            broadcast_rate: self.sync.broadcast_rate,
        }
    }
}

/// Corpus location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Directories (or single files) enumerated recursively, in order
    #[serde(default)]
    pub roots: Vec<PathBuf>,
}

/// What is counted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountingConfig {
    /// N-gram or single-word counting
    #[serde(default)]
    pub mode: CountMode,
    /// Tokens per key in n-gram mode
    #[serde(default = "default_ngram_size")]
    pub ngram_size: usize,
    /// Keys below this count are dropped from the final table
    #[serde(default = "default_min_count")]
    pub min_count: u64,
}

fn default_ngram_size() -> usize {
    4
}

fn default_min_count() -> u64 {
    DEFAULT_MIN_COUNT
}

impl CountingConfig {
    /// Tokenizer for the configured mode
    pub fn tokenizer(&self) -> Tokenizer {
        match self.mode {
            CountMode::Ngram => Tokenizer::NGram {
                size: self.ngram_size,
            },
            CountMode::Word => Tokenizer::Word,
        }
    }
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            mode: CountMode::default(),
            ngram_size: default_ngram_size(),
            min_count: default_min_count(),
        }
    }
}

/// Counting mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CountMode {
    /// Windows of N whitespace-delimited tokens
    #[default]
    Ngram,
    /// Single words split on punctuation and digits
    Word,
}

/// Synchronization knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Documents processed locally before a sync round fires
    #[serde(default = "default_granularity")]
    pub granularity: u64,
    /// Sync rounds between broadcasts of the global table
    #[serde(default = "default_broadcast_rate")]
    pub broadcast_rate: u64,
}

fn default_granularity() -> u64 {
    1
}

fn default_broadcast_rate() -> u64 {
    1
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            granularity: default_granularity(),
            broadcast_rate: default_broadcast_rate(),
        }
    }
}

/// Worker group configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of workers in the group (the coordinator is one of them)
    #[serde(default = "default_workers")]
    pub count: usize,
}

fn default_workers() -> usize {
    num_cpus::get()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_workers(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Result store for benchmark runs, keyed by worker count
    #[serde(default = "default_results_file")]
    pub results_file: PathBuf,
    /// Result store for tuning trials, keyed by trial index
    #[serde(default = "default_tuning_results_file")]
    pub tuning_results_file: PathBuf,
    /// Dump the final filtered table here
    pub dictionary: Option<PathBuf>,
    /// Format of the dictionary dump
    #[serde(default)]
    pub dictionary_format: DictionaryFormat,
}

fn default_results_file() -> PathBuf {
    PathBuf::from("results.json")
}

fn default_tuning_results_file() -> PathBuf {
    PathBuf::from("tuning_results.json")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_file: default_results_file(),
            tuning_results_file: default_tuning_results_file(),
            dictionary: None,
            dictionary_format: DictionaryFormat::default(),
        }
    }
}

/// Dictionary dump format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DictionaryFormat {
    /// JSON object, key string to count
    Json,
    /// One `key: count` line per entry
    #[default]
    Readable,
    /// `Key,Value` header followed by one row per entry
    Csv,
}

impl fmt::Display for DictionaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DictionaryFormat::Json => "json",
            DictionaryFormat::Readable => "readable",
            DictionaryFormat::Csv => "csv",
        };
        f.write_str(name)
    }
}

/// Inclusive integer range of one search dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: u64,
    pub max: u64,
}

impl Bounds {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// Clamp `value` into the range
    #[inline]
    pub fn clamp(&self, value: i64) -> u64 {
        value.clamp(self.min as i64, self.max as i64) as u64
    }

    pub fn contains(&self, value: u64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Distance between the bounds
    pub fn width(&self) -> u64 {
        self.max.saturating_sub(self.min)
    }
}

/// Parameter search configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Random points evaluated in the exploration stage
    #[serde(default = "default_samples")]
    pub samples: usize,
    /// Total pipeline evaluations allowed across both stages
    #[serde(default = "default_max_evaluations")]
    pub max_evaluations: usize,
    /// RNG seed for reproducible sampling (random when absent)
    pub seed: Option<u64>,
    #[serde(default = "default_granularity_bounds")]
    pub granularity: Bounds,
    #[serde(default = "default_broadcast_rate_bounds")]
    pub broadcast_rate: Bounds,
    #[serde(default = "default_worker_bounds")]
    pub workers: Bounds,
}

fn default_samples() -> usize {
    10
}

fn default_max_evaluations() -> usize {
    40
}

fn default_granularity_bounds() -> Bounds {
    Bounds::new(1, 20)
}

fn default_broadcast_rate_bounds() -> Bounds {
    Bounds::new(1, 10)
}

fn default_worker_bounds() -> Bounds {
    Bounds::new(1, num_cpus::get() as u64)
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            samples: default_samples(),
            max_evaluations: default_max_evaluations(),
            seed: None,
            granularity: default_granularity_bounds(),
            broadcast_rate: default_broadcast_rate_bounds(),
            workers: default_worker_bounds(),
        }
    }
}

/// The three tunable parameters of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunParameters {
    pub workers: usize,
    pub granularity: u64,
    pub broadcast_rate: u64,
}

impl RunParameters {
    pub fn sync_policy(&self) -> crate::Result<SyncPolicy> {
        SyncPolicy::new(self.granularity, self.broadcast_rate)
    }
}

impl fmt::Display for RunParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processes = {}, granularity = {}, broadcast_rate = {}",
            self.workers, self.granularity, self.broadcast_rate
        )
    }
}
