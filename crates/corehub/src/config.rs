//! Service configuration.
//!
//! Loaded from a TOML file, then overridden from the environment:
//! - `COREHUB_DATABASE_PATH` overrides `database.path`
//! - `COREHUB_BPNL` overrides `seed.bpnl`
//! - `COREHUB_LOG_LEVEL` overrides `logging.level`
//! - `COREHUB_LOG_FORMAT` overrides `logging.format`
//!
//! `seed.bpnl` may be absent here; startup diagnoses that itself.

use corehub_core::startup::UnmanagedSchemaPolicy;
use serde::Deserialize;
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error as ThisError;
use tracing_subscriber::EnvFilter;

/// Config file read when `--config` is not given. Its absence is not an error.
pub const DEFAULT_CONFIG_PATH: &str = "corehub.toml";

pub const ENV_DATABASE_PATH: &str = "COREHUB_DATABASE_PATH";
pub const ENV_BPNL: &str = "COREHUB_BPNL";
pub const ENV_LOG_LEVEL: &str = "COREHUB_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "COREHUB_LOG_FORMAT";

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("environment variable {var}='{value}' is invalid: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

///
/// Config
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: DatabaseConfig,
    pub seed: SeedConfig,
    pub schema: SchemaConfig,
    pub logging: LoggingConfig,
}

///
/// DatabaseConfig
///

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite database file; `:memory:` opens a private in-memory database.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("corehub.db"),
        }
    }
}

///
/// SeedConfig
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SeedConfig {
    /// Business partner number of the operating legal entity.
    pub bpnl: Option<String>,
}

///
/// SchemaConfig
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaConfig {
    pub unmanaged: UnmanagedSchemaPolicy,
}

///
/// LoggingConfig
///

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `corehub_core=debug,info`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

///
/// LogFormat
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" | "jsonl" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Compact => "compact",
            Self::Json => "json",
        };
        write!(f, "{label}")
    }
}

impl Config {
    /// Load, override from the process environment, and validate.
    ///
    /// With `path = None` the default file is read if present; an explicit
    /// path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATABASE_PATH) {
            self.database.path = PathBuf::from(path);
        }

        if let Some(bpnl) = lookup(ENV_BPNL) {
            self.seed.bpnl = Some(bpnl);
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }

        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.logging.format = format.parse().map_err(|reason| ConfigError::InvalidEnv {
                var: ENV_LOG_FORMAT,
                value: format.clone(),
                reason,
            })?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path is empty".to_string()));
        }

        EnvFilter::try_new(&self.logging.level).map_err(|err| {
            ConfigError::Invalid(format!(
                "logging.level '{}' is not a valid filter: {err}",
                self.logging.level
            ))
        })?;

        Ok(())
    }
}

///
/// TESTS
///
