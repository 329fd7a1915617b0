//! gramsync - bulk-synchronous n-gram counting and scaling benchmark
//!
//! gramsync counts n-gram (or word) frequencies over a text corpus with a
//! fixed group of worker threads, and measures how two synchronization knobs
//! affect parallel scaling.
//!
//! # Architecture
//!
//! - **Partitioning**: round-robin split of the document list into shards
//! - **Local counting**: each worker tokenizes its shard into a delta table
//! - **Synchronization**: periodic gather/merge/broadcast rounds, gated by
//!   granularity (documents per round) and broadcast rate (rounds per broadcast)
//! - **Aggregation**: final merge, minimum-count filter, most frequent key
//! - **Benchmarking**: elapsed time, speedup against the single-worker run
//! - **Tuning**: sampling plus compass search over the three run parameters

pub mod bench;
pub mod config;
pub mod corpus;
pub mod counter;
pub mod distributed;
pub mod output;
pub mod stats;
pub mod tuner;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use counter::{FrequencyTable, NGram};

/// Result type used throughout gramsync
pub type Result<T> = anyhow::Result<T>;
