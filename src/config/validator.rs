//! Configuration validation

use super::*;
use anyhow::Result;

/// Validate configuration for a single pipeline run
pub fn validate_config(config: &Config) -> Result<()> {
    validate_corpus(&config.corpus)?;
    validate_counting(&config.counting)?;
    validate_sync(&config.sync)?;
    validate_workers(&config.workers)?;

    Ok(())
}

/// Validate configuration for a parameter search
pub fn validate_tuning_config(config: &Config) -> Result<()> {
    validate_corpus(&config.corpus)?;
    validate_counting(&config.counting)?;
    validate_tuner(&config.tuner)?;

    Ok(())
}

pub fn validate_corpus(corpus: &CorpusConfig) -> Result<()> {
    if corpus.roots.is_empty() {
        anyhow::bail!("At least one corpus root must be specified");
    }
    Ok(())
}

pub fn validate_counting(counting: &CountingConfig) -> Result<()> {
    if counting.mode == CountMode::Ngram && counting.ngram_size == 0 {
        anyhow::bail!("ngram_size must be at least 1");
    }
    Ok(())
}

pub fn validate_sync(sync: &SyncConfig) -> Result<()> {
    if sync.broadcast_rate == 0 {
        anyhow::bail!("broadcast_rate must be at least 1");
    }
    Ok(())
}

pub fn validate_workers(workers: &WorkerConfig) -> Result<()> {
    if workers.count == 0 {
        anyhow::bail!("Worker count must be at least 1");
    }
    Ok(())
}

pub fn validate_tuner(tuner: &TunerConfig) -> Result<()> {
    validate_bounds("granularity", &tuner.granularity, 0)?;
    validate_bounds("broadcast_rate", &tuner.broadcast_rate, 1)?;
    validate_bounds("workers", &tuner.workers, 1)?;

    if tuner.samples == 0 {
        anyhow::bail!("Tuner samples must be at least 1");
    }
    if tuner.max_evaluations < tuner.samples {
        anyhow::bail!(
            "max_evaluations ({}) must be at least samples ({})",
            tuner.max_evaluations,
            tuner.samples
        );
    }
    Ok(())
}

fn validate_bounds(name: &str, bounds: &Bounds, floor: u64) -> Result<()> {
    if bounds.min > bounds.max {
        anyhow::bail!(
            "{} range is empty: min {} > max {}",
            name,
            bounds.min,
            bounds.max
        );
    }
    if bounds.min < floor {
        anyhow::bail!("{} range must start at {} or above, got {}", name, floor, bounds.min);
    }
    if bounds.max > i64::MAX as u64 {
        anyhow::bail!("{} range max {} is too large", name, bounds.max);
    }
    Ok(())
}
