//! Logger setup
//!
//! Log records go to stderr by default so they never interleave with the
//! report printed on stdout. With a log file, records are written there
//! instead and the file is truncated on startup.

use log::{LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, CombinedLogger, SharedLogger, TermLogger, TerminalMode, WriteLogger};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("cannot open log file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("set_logger error: {0}")]
    Init(#[from] SetLoggerError),
}

/// Install the global logger
pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<(), LoggingError> {
    let log_conf = simplelog::ConfigBuilder::new()
        .set_thread_level(LevelFilter::Debug)
        .set_target_level(LevelFilter::Off)
        .build();

    let logger: Box<dyn SharedLogger> = match log_file {
        None => TermLogger::new(level, log_conf, TerminalMode::Stderr, ColorChoice::Auto),
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .map_err(|source| LoggingError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            WriteLogger::new(level, log_conf, file)
        }
    };

    CombinedLogger::init(vec![logger])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwritable_log_file() {
        let err = init_logging(
            LevelFilter::Info,
            Some(Path::new("/nonexistent/dir/gramsync.log")),
        )
        .unwrap_err();
        assert!(matches!(err, LoggingError::Io { .. }));
        assert!(err.to_string().contains("gramsync.log"));
    }
}
