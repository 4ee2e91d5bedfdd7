//! Process-wide logger setup.
//!
//! Library code only talks to the `log` facade. The binary calls
//! [`init_logging`] once to route records to stderr, and to a file when
//! `[logging].file` is set. `RUST_LOG` takes precedence over the configured
//! level.

use crate::config::{ConfigError, LoggingConfig};
use std::fs;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot open log file {path}: {source}")]
    File {
        path: String,
        source: std::io::Error,
    },
    #[error("logger already installed: {0}")]
    Install(#[from] log::SetLoggerError),
}

/// Effective level: `RUST_LOG` when it parses, the configured level otherwise.
pub fn effective_level(config: &LoggingConfig) -> Result<log::LevelFilter, ConfigError> {
    let from_env = std::env::var("RUST_LOG")
        .ok()
        .and_then(|var| var.parse::<log::LevelFilter>().ok());
    match from_env {
        Some(level) => Ok(level),
        None => config.level_filter(),
    }
}

pub fn format_line(level: log::Level, target: &str, message: &std::fmt::Arguments) -> String {
    format!(
        "{} [{}] {}: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        level,
        target,
        message
    )
}

/// Install the global logger.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let level = effective_level(config)?;

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}",
                format_line(record.level(), record.target(), message)
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Some(file) = &config.file {
        let path = Path::new(file);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| LoggingError::File {
                path: file.clone(),
                source,
            })?;
        }
        let log_file = fern::log_file(path).map_err(|source| LoggingError::File {
            path: file.clone(),
            source,
        })?;
        dispatch = dispatch.chain(log_file);
    }

    dispatch.apply()?;
    log::debug!("logging at {level}");
    Ok(())
}
