//! Corpus enumeration and partitioning
//!
//! Documents are enumerated recursively from one or more roots in whatever
//! order the filesystem returns them, then dealt out to workers round-robin:
//! document `i` goes to worker `i % W`. Partition assignment is therefore
//! only as deterministic as the traversal.
//!
//! # Example
//!
//! ```
//! use gramsync::corpus::partition;
//! use std::path::PathBuf;
//!
//! let docs: Vec<PathBuf> = (0..5).map(|i| PathBuf::from(format!("doc{}", i))).collect();
//! let shards = partition(&docs, 2)?;
//!
//! assert_eq!(shards[0].len(), 3);
//! assert_eq!(shards[1].len(), 2);
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::Result;
use anyhow::Context;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Ordered list of documents assigned to one worker
pub type Shard = Vec<PathBuf>;

/// Recursively list every regular file below `root`
///
/// A `root` that is itself a file is returned as the only document. Symbolic
/// links are followed. Entries that cannot be read, such as dangling links or
/// link loops, are logged and skipped. Only an unreadable `root` fails the
/// listing.
pub fn list_documents(root: &Path) -> Result<Vec<PathBuf>> {
    fs::metadata(root).with_context(|| format!("Failed to read corpus root {}", root.display()))?;

    let mut documents = Vec::new();
    let mut skipped = 0usize;
    for entry in WalkDir::new(root).follow_links(true) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => documents.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => {
                warn!("skipping corpus entry: {}", e);
                skipped += 1;
            }
        }
    }

    debug!(
        "found {} documents under {} ({} entries skipped)",
        documents.len(),
        root.display(),
        skipped
    );
    Ok(documents)
}

/// List documents below several roots, concatenated in root order
pub fn list_all_documents(roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();
    for root in roots {
        documents.extend(list_documents(root)?);
    }
    Ok(documents)
}

/// Split `documents` into `workers` disjoint shards by index modulo `workers`
///
/// Shard sizes differ by at most one and every document lands in exactly one
/// shard, in its original relative order.
pub fn partition(documents: &[PathBuf], workers: usize) -> Result<Vec<Shard>> {
    if workers == 0 {
        anyhow::bail!("cannot partition documents across 0 workers");
    }

    let mut shards: Vec<Shard> = (0..workers)
        .map(|w| Vec::with_capacity(shard_len(documents.len(), workers, w)))
        .collect();
    for (idx, doc) in documents.iter().enumerate() {
        shards[idx % workers].push(doc.clone());
    }
    Ok(shards)
}

/// Number of documents worker `rank` receives from a round-robin split
#[inline]
pub fn shard_len(total: usize, workers: usize, rank: usize) -> usize {
    total / workers + usize::from(rank < total % workers)
}
