//! Store collaborators.
//!
//! The startup components only see the traits in this module. Two backends
//! are provided: `MemoryStore` for tests and dry runs, and `SqliteStore` for
//! the service's real database.

mod memory;
mod sqlite;

use crate::{
    error::InternalError,
    model::{Bpnl, EnablementServiceStack, LegalEntity, LegalEntityId, NewEnablementServiceStack},
    revision::{Migration, Revision},
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

///
/// SchemaIntrospection
///
/// Read-only view of what the store physically holds.
///

pub trait SchemaIntrospection {
    /// Recorded version marker; `None` when the store was never stamped.
    fn current_revision(&self) -> Result<Option<Revision>, InternalError>;

    /// Names of the user tables physically present, sorted.
    fn table_names(&self) -> Result<Vec<String>, InternalError>;
}

///
/// MigrationTarget
///
/// Store side of the upgrade procedure.
///

pub trait MigrationTarget: SchemaIntrospection {
    /// Apply one step and record its revision as the version marker.
    /// The step and the marker update commit together or not at all.
    fn apply_migration(&mut self, migration: &Migration) -> Result<(), InternalError>;

    /// Record `revision` as the version marker without running any step.
    fn stamp(&mut self, revision: &Revision) -> Result<(), InternalError>;
}

///
/// EntityStore
///
/// Find/create access to the seed entities. Inserts commit immediately and
/// return the row as read back, including its generated identity.
///

pub trait EntityStore {
    fn find_legal_entity_by_bpnl(&self, bpnl: &Bpnl) -> Result<Option<LegalEntity>, InternalError>;

    fn insert_legal_entity(&mut self, bpnl: &Bpnl) -> Result<LegalEntity, InternalError>;

    fn find_stack_by_legal_entity(
        &self,
        legal_entity_id: LegalEntityId,
    ) -> Result<Option<EnablementServiceStack>, InternalError>;

    fn find_stack_by_name(&self, name: &str)
    -> Result<Option<EnablementServiceStack>, InternalError>;

    fn insert_stack(
        &mut self,
        stack: NewEnablementServiceStack,
    ) -> Result<EnablementServiceStack, InternalError>;
}
