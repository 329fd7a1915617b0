//! Output formatting
//!
//! `json` holds the persistent run-result store, `text` prints reports to the
//! console and dumps the final table in the dictionary formats.

pub mod json;
pub mod text;

pub use json::{BenchmarkRecord, ResultStore, StoreError};
