use crate::{
    error::InternalError,
    migrations::{LEGAL_ENTITY_TABLE, STACK_TABLE, VERSION_TABLE},
    model::{
        Bpnl, EnablementServiceStack, LegalEntity, LegalEntityId, NewEnablementServiceStack,
        StackId,
    },
    revision::{Migration, Revision},
    store::{EntityStore, MigrationTarget, SchemaIntrospection},
};
use std::collections::{BTreeMap, BTreeSet};

///
/// MemoryStore
///
/// In-process store with the same observable contract as the SQLite backend:
/// entity tables must exist before rows are written, names and business keys
/// are unique, and identities are assigned from 1 upward.
///
/// Every successful mutation bumps `writes`, so callers can assert that a
/// code path left the store untouched.
///

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    marker: Option<Revision>,
    tables: BTreeSet<String>,
    legal_entities: BTreeMap<LegalEntityId, LegalEntity>,
    stacks: BTreeMap<StackId, EnablementServiceStack>,
    next_legal_entity_id: i64,
    next_stack_id: i64,
    writes: u64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a pre-existing table, as found in an unmanaged legacy store.
    #[must_use]
    pub fn with_table(mut self, name: impl Into<String>) -> Self {
        self.tables.insert(name.into());
        self
    }

    /// Seed a pre-existing version marker.
    #[must_use]
    pub fn with_marker(mut self, revision: impl Into<Revision>) -> Self {
        self.tables.insert(VERSION_TABLE.to_string());
        self.marker = Some(revision.into());
        self
    }

    /// Number of successful mutations since construction.
    #[must_use]
    pub const fn writes(&self) -> u64 {
        self.writes
    }

    #[must_use]
    pub fn legal_entities(&self) -> Vec<&LegalEntity> {
        self.legal_entities.values().collect()
    }

    #[must_use]
    pub fn stacks(&self) -> Vec<&EnablementServiceStack> {
        self.stacks.values().collect()
    }

    fn require_table(&self, table: &str) -> Result<(), InternalError> {
        if self.tables.contains(table) {
            Ok(())
        } else {
            Err(InternalError::store_unsupported(format!(
                "no such table: {table}"
            )))
        }
    }
}

impl SchemaIntrospection for MemoryStore {
    fn current_revision(&self) -> Result<Option<Revision>, InternalError> {
        Ok(self.marker.clone())
    }

    fn table_names(&self) -> Result<Vec<String>, InternalError> {
        Ok(self.tables.iter().cloned().collect())
    }
}

impl MigrationTarget for MemoryStore {
    fn apply_migration(&mut self, migration: &Migration) -> Result<(), InternalError> {
        if self.marker != migration.down_revision {
            return Err(InternalError::migration_invariant(format!(
                "cannot apply '{}' on top of {:?}; expected {:?}",
                migration.revision, self.marker, migration.down_revision
            )));
        }
        if let Some(table) = migration.tables.iter().find(|t| self.tables.contains(**t)) {
            return Err(InternalError::store_conflict(format!(
                "table {table} already exists"
            )));
        }

        self.tables
            .extend(migration.tables.iter().map(ToString::to_string));
        self.tables.insert(VERSION_TABLE.to_string());
        self.marker = Some(migration.revision.clone());
        self.writes += 1;

        Ok(())
    }

    fn stamp(&mut self, revision: &Revision) -> Result<(), InternalError> {
        self.tables.insert(VERSION_TABLE.to_string());
        self.marker = Some(revision.clone());
        self.writes += 1;

        Ok(())
    }
}

impl EntityStore for MemoryStore {
    fn find_legal_entity_by_bpnl(&self, bpnl: &Bpnl) -> Result<Option<LegalEntity>, InternalError> {
        self.require_table(LEGAL_ENTITY_TABLE)?;

        Ok(self
            .legal_entities
            .values()
            .find(|entity| &entity.bpnl == bpnl)
            .cloned())
    }

    fn insert_legal_entity(&mut self, bpnl: &Bpnl) -> Result<LegalEntity, InternalError> {
        self.require_table(LEGAL_ENTITY_TABLE)?;
        if self.find_legal_entity_by_bpnl(bpnl)?.is_some() {
            return Err(InternalError::store_conflict(format!(
                "UNIQUE constraint failed: {LEGAL_ENTITY_TABLE}.bpnl ({bpnl})"
            )));
        }

        self.next_legal_entity_id += 1;
        let entity = LegalEntity {
            id: LegalEntityId(self.next_legal_entity_id),
            bpnl: bpnl.clone(),
        };
        self.legal_entities.insert(entity.id, entity.clone());
        self.writes += 1;

        Ok(entity)
    }

    fn find_stack_by_legal_entity(
        &self,
        legal_entity_id: LegalEntityId,
    ) -> Result<Option<EnablementServiceStack>, InternalError> {
        self.require_table(STACK_TABLE)?;

        Ok(self
            .stacks
            .values()
            .find(|stack| stack.legal_entity_id == legal_entity_id)
            .cloned())
    }

    fn find_stack_by_name(
        &self,
        name: &str,
    ) -> Result<Option<EnablementServiceStack>, InternalError> {
        self.require_table(STACK_TABLE)?;

        Ok(self.stacks.values().find(|stack| stack.name == name).cloned())
    }

    fn insert_stack(
        &mut self,
        stack: NewEnablementServiceStack,
    ) -> Result<EnablementServiceStack, InternalError> {
        self.require_table(STACK_TABLE)?;
        if self.find_stack_by_name(&stack.name)?.is_some() {
            return Err(InternalError::store_conflict(format!(
                "UNIQUE constraint failed: {STACK_TABLE}.name ({})",
                stack.name
            )));
        }
        if !self.legal_entities.contains_key(&stack.legal_entity_id) {
            return Err(InternalError::store_conflict(format!(
                "FOREIGN KEY constraint failed: {STACK_TABLE}.legal_entity_id ({})",
                stack.legal_entity_id
            )));
        }

        self.next_stack_id += 1;
        let stack = stack.into_stack(StackId(self.next_stack_id));
        self.stacks.insert(stack.id, stack.clone());
        self.writes += 1;

        Ok(stack)
    }
}

///
/// TESTS
///
