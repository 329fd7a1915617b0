//! CLI argument parsing using clap
//!
//! Options that also exist in the TOML configuration are `Option`s here so a
//! flag only overrides the file when it was actually given.

use super::{CountMode, DictionaryFormat};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// gramsync - bulk-synchronous n-gram counting and scaling benchmark
#[derive(Parser, Debug)]
#[command(name = "gramsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file (CLI flags take precedence)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write log output to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

/// Execution mode
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the counting pipeline once and record its time and speedup
    Count(CountArgs),
    /// Search granularity, broadcast rate and worker count for the fastest run
    Tune(TuneArgs),
    /// Print the records of a result store
    Report(ReportArgs),
    /// Start a worker group and have every rank report in
    Hello {
        /// Number of workers in the group
        #[arg(short = 'p', long, default_value = "4")]
        workers: usize,
    },
}

/// Options shared by every command that runs the pipeline
#[derive(Args, Debug, Default)]
pub struct CorpusArgs {
    /// Corpus directories or files, enumerated recursively
    #[arg(value_name = "PATH")]
    pub roots: Vec<PathBuf>,

    /// Counting mode
    #[arg(long, value_enum)]
    pub mode: Option<CountMode>,

    /// Tokens per n-gram
    #[arg(short = 'n', long)]
    pub ngram_size: Option<usize>,

    /// Minimum count for a key to be kept in the final table
    #[arg(long)]
    pub min_count: Option<u64>,
}

/// Options of `count`
#[derive(Args, Debug, Default)]
pub struct CountArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Number of workers (processes) in the group
    #[arg(short = 'p', long)]
    pub workers: Option<usize>,

    /// Documents processed locally before a sync round fires
    #[arg(short = 'g', long = "gran")]
    pub granularity: Option<u64>,

    /// Sync rounds between broadcasts of the global table
    #[arg(short = 'b', long = "bcast-rate")]
    pub broadcast_rate: Option<u64>,

    /// Result store file
    #[arg(long)]
    pub results: Option<PathBuf>,

    /// Dump the final filtered table to this file
    #[arg(long)]
    pub dictionary: Option<PathBuf>,

    /// Format of the dictionary dump
    #[arg(long, value_enum)]
    pub dictionary_format: Option<DictionaryFormat>,
}

/// Options of `tune`
#[derive(Args, Debug, Default)]
pub struct TuneArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Random points evaluated before the local search
    #[arg(long)]
    pub samples: Option<usize>,

    /// Total pipeline evaluations allowed
    #[arg(long)]
    pub max_evaluations: Option<usize>,

    /// RNG seed for reproducible sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Granularity search range (e.g., 1..20)
    #[arg(long, value_parser = parse_range)]
    pub granularity: Option<(u64, u64)>,

    /// Broadcast rate search range (e.g., 1..10)
    #[arg(long, value_parser = parse_range)]
    pub broadcast_rate: Option<(u64, u64)>,

    /// Worker count search range (e.g., 1..8)
    #[arg(long, value_parser = parse_range)]
    pub workers: Option<(u64, u64)>,

    /// Result store for tuning trials
    #[arg(long)]
    pub results: Option<PathBuf>,
}

/// Options of `report`
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Result store file (defaults to the configured results file)
    #[arg(long)]
    pub results: Option<PathBuf>,

    /// Record ordering
    #[arg(long, value_enum, default_value = "workers")]
    pub sort: SortOrder,
}

/// Record ordering for `report`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    /// By run key (worker count or trial index)
    Workers,
    /// By elapsed time, fastest first
    Time,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log level filter for the verbosity flags
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

/// Parse an inclusive range written as `MIN..MAX` or `MIN-MAX`
pub fn parse_range(s: &str) -> Result<(u64, u64), String> {
    let s = s.trim();
    let (lo, hi) = s
        .split_once("..")
        .or_else(|| s.split_once('-'))
        .ok_or_else(|| format!("Invalid range '{}', expected MIN..MAX", s))?;

    let lo: u64 = lo
        .trim()
        .parse()
        .map_err(|_| format!("Invalid range start '{}'", lo))?;
    let hi: u64 = hi
        .trim()
        .trim_start_matches('=')
        .parse()
        .map_err(|_| format!("Invalid range end '{}'", hi))?;

    if lo > hi {
        return Err(format!("Range start {} is greater than end {}", lo, hi));
    }
    Ok((lo, hi))
}
