//! Per-worker document counting
//!
//! A [`LocalCounter`] reads each assigned document in full and tokenizes it
//! into a fresh table. A document that cannot be read or decoded is logged,
//! recorded as a [`DocumentFailure`] and skipped; it never aborts the worker
//! and never contributes partial counts.

use super::tokenize::Tokenizer;
use super::FrequencyTable;
use anyhow::Context;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A document that was skipped because it could not be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Document counter owned by one worker
#[derive(Debug)]
pub struct LocalCounter {
    /// Rank of the owning worker (for log lines)
    rank: usize,

    tokenizer: Tokenizer,

    /// Documents that were counted successfully
    counted: u64,

    /// Documents skipped on read/decode errors
    failures: Vec<DocumentFailure>,
}

impl LocalCounter {
    pub fn new(rank: usize, tokenizer: Tokenizer) -> Self {
        Self {
            rank,
            tokenizer,
            counted: 0,
            failures: Vec::new(),
        }
    }

    /// Count one document into a fresh table
    ///
    /// Returns `None` when the document was skipped.
    pub fn count_document(&mut self, path: &Path) -> Option<FrequencyTable> {
        match read_document(path) {
            Ok(text) => {
                let mut table = FrequencyTable::new();
                self.tokenizer.count_text(&text, &mut table);
                self.counted += 1;
                debug!(
                    "rank {}: processed {} ({} distinct keys)",
                    self.rank,
                    path.display(),
                    table.len()
                );
                Some(table)
            }
            Err(e) => {
                warn!("rank {}: skipping {}: {:#}", self.rank, path.display(), e);
                self.failures.push(DocumentFailure {
                    path: path.to_path_buf(),
                    reason: format!("{:#}", e),
                });
                None
            }
        }
    }

    /// Number of documents counted successfully
    pub fn counted(&self) -> u64 {
        self.counted
    }

    pub fn failures(&self) -> &[DocumentFailure] {
        &self.failures
    }

    /// Hand the recorded failures over, leaving the list empty
    pub fn take_failures(&mut self) -> Vec<DocumentFailure> {
        std::mem::take(&mut self.failures)
    }
}

fn read_document(path: &Path) -> crate::Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    String::from_utf8(bytes).with_context(|| format!("{} is not valid UTF-8", path.display()))
}
