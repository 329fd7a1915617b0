//! TOML configuration file parsing

use super::*;
use crate::config::cli::{CorpusArgs, CountArgs, TuneArgs};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Load the configuration file if one was given, defaults otherwise
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => parse_toml_file(path),
        None => Ok(Config::default()),
    }
}

/// Merge corpus and counting flags (CLI takes precedence)
fn merge_corpus_args(args: &CorpusArgs, config: &mut Config) {
    if !args.roots.is_empty() {
        config.corpus.roots = args.roots.clone();
    }
    if let Some(mode) = args.mode {
        config.counting.mode = mode;
    }
    if let Some(size) = args.ngram_size {
        config.counting.ngram_size = size;
    }
    if let Some(min_count) = args.min_count {
        config.counting.min_count = min_count;
    }
}

/// Merge `count` arguments with TOML configuration (CLI takes precedence)
pub fn merge_count_args(args: &CountArgs, mut config: Config) -> Result<Config> {
    merge_corpus_args(&args.corpus, &mut config);

    if let Some(workers) = args.workers {
        config.workers.count = workers;
    }
    if let Some(granularity) = args.granularity {
        config.sync.granularity = granularity;
    }
    if let Some(rate) = args.broadcast_rate {
        config.sync.broadcast_rate = rate;
    }
    if let Some(ref results) = args.results {
        config.output.results_file = results.clone();
    }
    if let Some(ref dictionary) = args.dictionary {
        config.output.dictionary = Some(dictionary.clone());
    }
    if let Some(format) = args.dictionary_format {
        config.output.dictionary_format = format;
    }

    Ok(config)
}

/// Merge `tune` arguments with TOML configuration (CLI takes precedence)
pub fn merge_tune_args(args: &TuneArgs, mut config: Config) -> Result<Config> {
    merge_corpus_args(&args.corpus, &mut config);

    if let Some(samples) = args.samples {
        config.tuner.samples = samples;
    }
    if let Some(max) = args.max_evaluations {
        config.tuner.max_evaluations = max;
    }
    if args.seed.is_some() {
        config.tuner.seed = args.seed;
    }
    if let Some((min, max)) = args.granularity {
        config.tuner.granularity = Bounds::new(min, max);
    }
    if let Some((min, max)) = args.broadcast_rate {
        config.tuner.broadcast_rate = Bounds::new(min, max);
    }
    if let Some((min, max)) = args.workers {
        config.tuner.workers = Bounds::new(min, max);
    }
    if let Some(ref results) = args.results {
        config.output.tuning_results_file = results.clone();
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_toml_basic() {
        let toml = r#"
            [corpus]
            roots = ["data/docs"]

            [counting]
            mode = "word"
            min_count = 2

            [sync]
            granularity = 10
            broadcast_rate = 3

            [workers]
            count = 4

            [output]
            dictionary = "dict.csv"
            dictionary_format = "csv"
        "#;

        let config = parse_toml_string(toml).unwrap();
        assert_eq!(config.corpus.roots, vec![PathBuf::from("data/docs")]);
        assert_eq!(config.counting.mode, CountMode::Word);
        assert_eq!(config.counting.ngram_size, 4);
        assert_eq!(config.counting.min_count, 2);
        assert_eq!(config.sync.granularity, 10);
        assert_eq!(config.sync.broadcast_rate, 3);
        assert_eq!(config.workers.count, 4);
        assert_eq!(config.output.dictionary, Some(PathBuf::from("dict.csv")));
        assert_eq!(config.output.dictionary_format, DictionaryFormat::Csv);
        assert_eq!(config.output.results_file, PathBuf::from("results.json"));
    }

    #[test]
    fn test_parse_toml_tuner_section() {
        let toml = r#"
            [tuner]
            samples = 5
            seed = 42
            granularity = { min = 2, max = 8 }
            workers = { min = 1, max = 3 }
        "#;

        let config = parse_toml_string(toml).unwrap();
        assert_eq!(config.tuner.samples, 5);
        assert_eq!(config.tuner.max_evaluations, 40);
        assert_eq!(config.tuner.seed, Some(42));
        assert_eq!(config.tuner.granularity, Bounds::new(2, 8));
        assert_eq!(config.tuner.broadcast_rate, Bounds::new(1, 10));
        assert_eq!(config.tuner.workers, Bounds::new(1, 3));
    }

    #[test]
    fn test_parse_toml_empty_uses_defaults() {
        let config = parse_toml_string("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_toml_rejects_unknown_mode() {
        assert!(parse_toml_string("[counting]\nmode = \"letters\"\n").is_err());
    }

    #[test]
    fn test_parse_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\ngranularity = 5").unwrap();

        let config = parse_toml_file(file.path()).unwrap();
        assert_eq!(config.sync.granularity, 5);

        assert!(parse_toml_file(Path::new("/nonexistent/gramsync.toml")).is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let mut config = Config::default();
        config.workers.count = 8;
        config.sync.granularity = 3;
        config.corpus.roots = vec![PathBuf::from("from_file")];

        let args = CountArgs {
            corpus: CorpusArgs {
                roots: vec![PathBuf::from("from_cli")],
                ..Default::default()
            },
            workers: Some(2),
            ..Default::default()
        };

        let merged = merge_count_args(&args, config).unwrap();
        assert_eq!(merged.workers.count, 2);
        assert_eq!(merged.sync.granularity, 3);
        assert_eq!(merged.corpus.roots, vec![PathBuf::from("from_cli")]);
    }

    #[test]
    fn test_merge_tune_args() {
        let args = TuneArgs {
            samples: Some(3),
            seed: Some(9),
            broadcast_rate: Some((2, 4)),
            results: Some(PathBuf::from("trials.json")),
            ..Default::default()
        };

        let merged = merge_tune_args(&args, Config::default()).unwrap();
        assert_eq!(merged.tuner.samples, 3);
        assert_eq!(merged.tuner.seed, Some(9));
        assert_eq!(merged.tuner.broadcast_rate, Bounds::new(2, 4));
        assert_eq!(merged.tuner.granularity, Bounds::new(1, 20));
        assert_eq!(merged.output.tuning_results_file, PathBuf::from("trials.json"));
    }
}
