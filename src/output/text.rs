//! Human-readable text output and dictionary dumps

use crate::config::cli::SortOrder;
use crate::config::DictionaryFormat;
use crate::corpus;
use crate::counter::FrequencyTable;
use crate::distributed::RunOutcome;
use crate::output::json::{BenchmarkRecord, ResultStore};
use crate::util::time::{calculate_rate, format_duration};
use crate::Result;
use anyhow::Context;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const RULE: &str = "═══════════════════════════════════════════════════════════";

/// Print how many documents each rank will receive
pub fn print_assignment(total: usize, workers: usize) {
    for rank in 0..workers {
        println!(
            "  Process {}: {} files assigned",
            rank,
            corpus::shard_len(total, workers, rank)
        );
    }
}

/// Print the summary of a finished benchmark run
pub fn print_run_summary(outcome: &RunOutcome, record: &BenchmarkRecord) {
    let stats = &outcome.stats;
    let elapsed = outcome.elapsed();

    println!("{}", RULE);
    println!("                    RUN RESULTS");
    println!("{}", RULE);
    println!();
    println!("Parameters: {}", outcome.params);
    println!("Elapsed Time: {:.3}s", elapsed.as_secs_f64());
    if let Some(speedup) = record.speedup {
        println!("Speedup: {:.2}x", speedup);
    }
    println!();

    println!("Documents:");
    println!(
        "  Counted: {} ({:.1} docs/s)",
        format_number(stats.documents_counted()),
        calculate_rate(stats.documents_counted(), elapsed)
    );
    if stats.documents_failed() > 0 {
        println!("  Skipped: {}", stats.documents_failed());
    }
    println!(
        "  Sync rounds: {} ({} broadcasts)",
        stats.sync_rounds(),
        stats.broadcasts()
    );
    println!();

    println!("Per worker:");
    for report in &stats.workers {
        println!(
            "  Rank {:>3}: {} docs, {} skipped, {} idle rounds, {}",
            report.rank,
            report.documents_counted,
            report.documents_failed(),
            report.idle_rounds,
            format_duration(report.elapsed)
        );
        for failure in &report.failures {
            println!("            skipped {}: {}", failure.path.display(), failure.reason);
        }
    }
    println!();

    println!(
        "Keys: {} kept of {} counted",
        format_number(outcome.result.table.len() as u64),
        format_number(outcome.result.keys_before_filter as u64)
    );
    match &outcome.result.most_frequent {
        Some(key) => println!(
            "Most frequent: \"{}\" ({} occurrences)",
            key, outcome.result.most_frequent_count
        ),
        None => println!("Most frequent: none (no key reached the minimum count)"),
    }
    println!("{}", RULE);
}

/// Print every record of a store
pub fn print_store(store: &ResultStore, order: SortOrder) {
    println!("Results from {} ({} records)", store.path().display(), store.len());
    println!();

    let records = match order {
        SortOrder::Workers => store.sorted_by_key(),
        SortOrder::Time => store.sorted_by_time(),
    };

    println!("{:>6}  {:>10}  {:>8}  {:>8}  {}", "key", "time (s)", "speedup", "count", "most frequent");
    for (key, record) in records {
        let speedup = record
            .speedup
            .map_or_else(|| "-".to_string(), |s| format!("{:.2}", s));
        let key_text = record
            .most_frequent_ngram
            .as_ref()
            .map_or_else(|| "-".to_string(), |k| k.to_string());
        print!(
            "{:>6}  {:>10.3}  {:>8}  {:>8}  {}",
            key, record.time, speedup, record.ngram_count, key_text
        );
        if let Some(params) = record.parameters() {
            print!("  [{}]", params);
        }
        println!();
    }
}

/// Print the fastest tuning trial
pub fn print_best(key: &str, record: &BenchmarkRecord) {
    println!();
    println!("BEST (trial {}, {:.3}s):", key, record.time);
    match record.parameters() {
        Some(params) => println!("  {}", params),
        None => println!("  record carries no tuning parameters"),
    }
}

/// Write the final table to `path` in the given format
pub fn write_dictionary(table: &FrequencyTable, path: &Path, format: DictionaryFormat) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create dictionary file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    render_dictionary(table, format, &mut writer)
        .with_context(|| format!("Failed to write dictionary file: {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

/// Render the table, entries ordered by descending count
pub fn render_dictionary<W: Write>(
    table: &FrequencyTable,
    format: DictionaryFormat,
    writer: &mut W,
) -> Result<()> {
    match format {
        DictionaryFormat::Json => {
            let map: BTreeMap<String, u64> =
                table.iter().map(|(k, &c)| (k.to_string(), c)).collect();
            serde_json::to_writer_pretty(&mut *writer, &map)?;
            writeln!(writer)?;
        }
        DictionaryFormat::Readable => {
            for (key, count) in table.sorted_by_count() {
                writeln!(writer, "{}: {}", key, count)?;
            }
        }
        DictionaryFormat::Csv => {
            writeln!(writer, "Key,Value")?;
            for (key, count) in table.sorted_by_count() {
                writeln!(writer, "{},{}", csv_field(&key.to_string()), count)?;
            }
        }
    }
    Ok(())
}

/// Quote a CSV field when it contains a separator or a quote
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}
