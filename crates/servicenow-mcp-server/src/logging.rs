//! Logging initialization.
//!
//! stdout is the MCP channel, so every layer writes to stderr. Setting a log
//! directory adds a daily rolling file next to stderr.
//!
//! # When is a Guard Needed?
//!
//! | Output | Guard Required |
//! |--------|----------------|
//! | stderr only | No |
//! | stderr + file | **Yes**, non-blocking writers buffer until it drops |

use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Default `EnvFilter` directive
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// File name prefix for rolling log files
pub const LOG_FILE_PREFIX: &str = "servicenow-mcp.log";

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected pretty or json)")),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    /// Line format
    pub format: LogFormat,
    /// Directory for daily rolling files; `None` logs to stderr only
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::Pretty,
            directory: None,
        }
    }
}

/// Flushes buffered log lines when dropped. Hold it until `main` returns.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    _stderr_guard: WorkerGuard,
}

impl LoggingConfig {
    /// Build the filter: `RUST_LOG` wins over the configured level.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
    }

    /// Install the global subscriber.
    ///
    /// Returns a guard when file logging is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the log directory cannot be created or a global
    /// subscriber is already installed.
    pub fn init(&self) -> io::Result<Option<LoggingGuard>> {
        let filter = self.filter();
        match &self.directory {
            None => {
                init_stderr(self.format, filter)?;
                Ok(None)
            }
            Some(dir) => init_stderr_and_file(self.format, dir, filter).map(Some),
        }
    }
}

fn init_stderr(format: LogFormat, filter: EnvFilter) -> io::Result<()> {
    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().with_writer(io::stderr))
            .try_init(),
    }
    .map_err(|e| io::Error::other(e.to_string()))
}

fn init_stderr_and_file(
    format: LogFormat,
    dir: &std::path::Path,
    filter: EnvFilter,
) -> io::Result<LoggingGuard> {
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(io::stderr());
    let combined = file_writer.and(stderr_writer);

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_writer(combined))
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().with_ansi(false).with_writer(combined))
            .try_init(),
    }
    .map_err(|e| io::Error::other(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        _stderr_guard: stderr_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Pretty ".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_defaults_log_to_stderr() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.directory.is_none());
    }
}
