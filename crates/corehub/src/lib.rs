//! Process shell around `corehub-core`: configuration, logging, the command
//! line, and the mapping from startup halts to exit codes.

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
