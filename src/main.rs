//! gramsync CLI entry point

use anyhow::{Context, Result};
use gramsync::bench::BenchmarkHarness;
use gramsync::config::cli::{Cli, Command, CountArgs, ReportArgs, TuneArgs};
use gramsync::config::{toml, validator, Config};
use gramsync::corpus;
use gramsync::distributed;
use gramsync::output::json::ResultStore;
use gramsync::output::text;
use gramsync::tuner::{ParameterTuner, PipelineEvaluator};
use gramsync::util::logging::init_logging;
use log::info;
use std::path::PathBuf;

fn main() -> Result<()> {
    println!("gramsync v{}", env!("CARGO_PKG_VERSION"));
    println!("Bulk-synchronous n-gram counting benchmark");
    println!();

    let cli = Cli::parse_args();
    init_logging(cli.log_level(), cli.log_file.as_deref())
        .context("Failed to initialize logging")?;

    let config = toml::load_config(cli.config.as_deref())?;

    match &cli.command {
        Command::Count(args) => run_count(args, config),
        Command::Tune(args) => run_tune(args, config),
        Command::Report(args) => run_report(args, &config),
        Command::Hello { workers } => run_hello(*workers),
    }
}

/// One benchmarked pipeline run
fn run_count(args: &CountArgs, config: Config) -> Result<()> {
    let config = toml::merge_count_args(args, config)?;
    validator::validate_config(&config).context("Configuration validation failed")?;

    let documents = list_documents(&config)?;
    let params = config.run_parameters();

    print_configuration(&config);
    println!("Parameters: {}", params);
    text::print_assignment(documents.len(), params.workers);
    println!();

    let mut harness = BenchmarkHarness::open(&config.output.results_file)?;
    let (outcome, record) = harness.run(&documents, &config.counting, params)?;
    text::print_run_summary(&outcome, &record);

    if let Some(ref path) = config.output.dictionary {
        text::write_dictionary(&outcome.result.table, path, config.output.dictionary_format)?;
        println!(
            "Dictionary written to {} ({})",
            path.display(),
            config.output.dictionary_format
        );
    }
    println!("Results written to {}", config.output.results_file.display());

    Ok(())
}

/// Parameter search over repeated pipeline runs
fn run_tune(args: &TuneArgs, config: Config) -> Result<()> {
    let config = toml::merge_tune_args(args, config)?;
    validator::validate_tuning_config(&config).context("Configuration validation failed")?;

    let documents = list_documents(&config)?;
    print_configuration(&config);
    println!(
        "Search: {} samples, {} evaluations max, granularity {}..={}, broadcast_rate {}..={}, processes {}..={}",
        config.tuner.samples,
        config.tuner.max_evaluations,
        config.tuner.granularity.min,
        config.tuner.granularity.max,
        config.tuner.broadcast_rate.min,
        config.tuner.broadcast_rate.max,
        config.tuner.workers.min,
        config.tuner.workers.max
    );
    println!();

    let store = ResultStore::load(&config.output.tuning_results_file)?;
    let mut evaluator = PipelineEvaluator::new(&documents, &config.counting, store);
    let outcome = ParameterTuner::new(&config.tuner).tune(&mut evaluator)?;

    println!(
        "Search finished after {} evaluations ({} samples)",
        outcome.evaluations(),
        outcome.samples.len()
    );
    println!(
        "Best of this search: {} ({:.3}s)",
        outcome.best.params, outcome.best.elapsed
    );

    let store = evaluator.into_store();
    if let Some((key, record)) = store.best_by_time() {
        text::print_best(key, record);
    }
    println!();
    println!("Trials written to {}", store.path().display());

    Ok(())
}

/// Print the records of a result store
fn run_report(args: &ReportArgs, config: &Config) -> Result<()> {
    let path = args
        .results
        .clone()
        .unwrap_or_else(|| config.output.results_file.clone());
    let store = ResultStore::load(&path)?;

    if store.is_empty() {
        println!("No records in {}", path.display());
        return Ok(());
    }

    text::print_store(&store, args.sort);
    if store.iter().any(|(_, r)| r.parameters().is_some()) {
        if let Some((key, record)) = store.best_by_time() {
            text::print_best(key, record);
        }
    }
    Ok(())
}

/// Start a group and have every rank report in
fn run_hello(workers: usize) -> Result<()> {
    let greetings = distributed::greet(workers)?;
    for greeting in &greetings {
        println!("{}", greeting);
    }
    info!("{} ranks reported in", greetings.len());
    Ok(())
}

fn list_documents(config: &Config) -> Result<Vec<PathBuf>> {
    let documents = corpus::list_all_documents(&config.corpus.roots)?;
    info!(
        "Found {} documents under {} root(s)",
        documents.len(),
        config.corpus.roots.len()
    );
    Ok(documents)
}

fn print_configuration(config: &Config) {
    println!("Configuration:");
    for root in &config.corpus.roots {
        println!("  Corpus: {}", root.display());
    }
    println!(
        "  Counting: {:?} (n = {}), min count {}",
        config.counting.mode, config.counting.ngram_size, config.counting.min_count
    );
    println!();
}
