use clap::{Parser, Subcommand};
use std::path::PathBuf;

///
/// Cli
///

#[derive(Debug, Parser)]
#[command(
    name = "corehub",
    version,
    about = "Verify the corehub schema and provision its seed entities"
)]
pub struct Cli {
    /// TOML config file (default: ./corehub.toml if present)
    #[arg(short, long, value_name = "PATH", env = "COREHUB_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Requested command; `start` when none was given.
    #[must_use]
    pub fn subcommand(&self) -> Command {
        self.command.unwrap_or_default()
    }
}

///
/// Command
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Subcommand)]
pub enum Command {
    /// Run the startup bootstrap: schema guard, then seed provisioning
    #[default]
    Start,

    /// Print the revision recorded in the database
    Current,

    /// Print the head revision of the declared history
    Heads,

    /// Record the head revision without running any migration
    Stamp,
}

///
/// TESTS
///
