//! Core of the corehub startup bootstrap: the declared schema history, the
//! store collaborators it runs against, and the guard and seed steps that
//! must pass before the service takes any work.

// public exports are one module level down
pub mod error;
pub mod migrations;
pub mod model;
pub mod revision;
pub mod startup;
pub mod store;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Everything a binary needs to run the bootstrap.
///

pub mod prelude {
    pub use crate::{
        error::InternalError,
        model::Bpnl,
        revision::{MigrationHistory, Revision, RevisionGraph},
        startup::{Halt, HaltReason, Startup, StartupOutcome, UnmanagedSchemaPolicy},
        store::{EntityStore, MigrationTarget, SchemaIntrospection, SqliteStore},
    };
}
