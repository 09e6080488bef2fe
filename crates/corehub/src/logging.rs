//! Process-wide `tracing` subscriber.

use crate::config::{LogFormat, LoggingConfig};
use thiserror::Error as ThisError;
use tracing_subscriber::EnvFilter;

///
/// LoggingError
///

#[derive(Debug, ThisError)]
pub enum LoggingError {
    #[error("invalid log filter '{level}': {reason}")]
    Filter { level: String, reason: String },

    #[error("cannot install log subscriber: {0}")]
    Install(String),
}

/// Build the filter from the configured level; a valid `RUST_LOG` wins.
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(level).map_err(|err| LoggingError::Filter {
        level: level.to_string(),
        reason: err.to_string(),
    })
}

/// Install the global subscriber. Events go to stderr; stdout is reserved
/// for command output.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(&config.level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };

    installed.map_err(|err| LoggingError::Install(err.to_string()))
}

///
/// TESTS
///
