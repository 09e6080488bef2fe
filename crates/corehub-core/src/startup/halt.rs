use crate::error::InternalError;
use std::fmt;
use thiserror::Error as ThisError;
use tracing::error;

///
/// HaltReason
///
/// Why startup refused to continue. Each reason owns a distinct process
/// exit code so operators can tell failures apart without reading logs.
/// Codes 1 and 2 belong to the binary (bootstrap and usage errors).
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HaltReason {
    AmbiguousSchemaState,
    SchemaOutdated,
    UpgradeFailure,
    MissingConfiguration,
    NamingConflict,
    StoreFailure,
}

impl HaltReason {
    pub const ALL: [Self; 6] = [
        Self::AmbiguousSchemaState,
        Self::SchemaOutdated,
        Self::UpgradeFailure,
        Self::MissingConfiguration,
        Self::NamingConflict,
        Self::StoreFailure,
    ];

    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::AmbiguousSchemaState => 3,
            Self::SchemaOutdated => 4,
            Self::UpgradeFailure => 5,
            Self::MissingConfiguration => 6,
            Self::NamingConflict => 7,
            Self::StoreFailure => 8,
        }
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AmbiguousSchemaState => "ambiguous_schema_state",
            Self::SchemaOutdated => "schema_outdated",
            Self::UpgradeFailure => "upgrade_failure",
            Self::MissingConfiguration => "missing_configuration",
            Self::NamingConflict => "naming_conflict",
            Self::StoreFailure => "store_failure",
        };
        write!(f, "{label}")
    }
}

///
/// Halt
///
/// Terminal startup outcome. Components log at the point of detection and
/// return this value; only the binary turns it into a process exit.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("startup halted ({reason}): {message}")]
pub struct Halt {
    pub reason: HaltReason,
    pub message: String,
}

impl Halt {
    pub fn new(reason: HaltReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    /// Log a store error at the point of detection and halt on it.
    pub(crate) fn store_failure(action: &str, err: &InternalError) -> Self {
        error!(error = %err.display_with_class(), "cannot {action}");

        Self::new(HaltReason::StoreFailure, format!("cannot {action}: {err}"))
    }

    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.reason.exit_code()
    }
}

///
/// TESTS
///
