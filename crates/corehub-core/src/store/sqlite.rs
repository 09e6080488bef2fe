use crate::{
    error::InternalError,
    migrations::VERSION_TABLE,
    model::{
        Bpnl, EnablementServiceStack, LegalEntity, LegalEntityId, NewEnablementServiceStack,
        StackId,
    },
    revision::{Migration, Revision},
    store::{EntityStore, MigrationTarget, SchemaIntrospection},
};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use std::path::Path;
use tracing::debug;

///
/// SqliteStore
///
/// SQLite-backed store. Owns one connection for its whole lifetime; open it
/// at process start and `close` it at shutdown. Every mutation runs in its
/// own transaction.
///

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, InternalError> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|err| db_error(&format!("open {}", path.display()), err))?;
        debug!(path = %path.display(), "sqlite store opened");

        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, InternalError> {
        let conn = Connection::open_in_memory().map_err(|err| db_error("open :memory:", err))?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, InternalError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|err| db_error("enable foreign keys", err))?;

        Ok(Self { conn })
    }

    /// Close the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<(), InternalError> {
        self.conn
            .close()
            .map_err(|(_, err)| db_error("close connection", err))
    }

    fn legal_entity_by_id(&self, id: LegalEntityId) -> Result<LegalEntity, InternalError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, bpnl FROM legal_entity WHERE id = ?1",
                params![id.0],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .map_err(|err| db_error("read back legal_entity", err))?;

        legal_entity_from_row(row)
    }

    fn stack_where(
        &self,
        clause: &str,
        param: &dyn rusqlite::ToSql,
    ) -> Result<Option<EnablementServiceStack>, InternalError> {
        let sql = format!(
            "SELECT id, name, connection_settings, legal_entity_id \
             FROM enablement_service_stack WHERE {clause} ORDER BY id LIMIT 1"
        );
        let row = self
            .conn
            .query_row(&sql, [param], |row| {
                Ok(StackRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    connection_settings: row.get(2)?,
                    legal_entity_id: row.get(3)?,
                })
            })
            .optional()
            .map_err(|err| db_error("query enablement_service_stack", err))?;

        row.map(StackRow::into_stack).transpose()
    }
}

impl SchemaIntrospection for SqliteStore {
    fn current_revision(&self) -> Result<Option<Revision>, InternalError> {
        read_marker(&self.conn)
    }

    fn table_names(&self) -> Result<Vec<String>, InternalError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .map_err(|err| db_error("list tables", err))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|err| db_error("list tables", err))?;

        Ok(names)
    }
}

impl MigrationTarget for SqliteStore {
    fn apply_migration(&mut self, migration: &Migration) -> Result<(), InternalError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|err| db_error("begin migration", err))?;

        let current = read_marker(&tx)?;
        if current != migration.down_revision {
            return Err(InternalError::migration_invariant(format!(
                "cannot apply '{}' on top of {:?}; expected {:?}",
                migration.revision, current, migration.down_revision
            )));
        }

        tx.execute_batch(migration.sql)
            .map_err(|err| db_error(&format!("migration {}", migration.revision), err))?;
        write_marker(&tx, &migration.revision)?;
        tx.commit()
            .map_err(|err| db_error(&format!("commit migration {}", migration.revision), err))?;

        Ok(())
    }

    fn stamp(&mut self, revision: &Revision) -> Result<(), InternalError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|err| db_error("begin stamp", err))?;
        write_marker(&tx, revision)?;
        tx.commit().map_err(|err| db_error("commit stamp", err))
    }
}

impl EntityStore for SqliteStore {
    fn find_legal_entity_by_bpnl(&self, bpnl: &Bpnl) -> Result<Option<LegalEntity>, InternalError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, bpnl FROM legal_entity WHERE bpnl = ?1",
                params![bpnl.as_str()],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .map_err(|err| db_error("query legal_entity", err))?;

        row.map(legal_entity_from_row).transpose()
    }

    fn insert_legal_entity(&mut self, bpnl: &Bpnl) -> Result<LegalEntity, InternalError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|err| db_error("begin insert legal_entity", err))?;
        tx.execute(
            "INSERT INTO legal_entity (bpnl) VALUES (?1)",
            params![bpnl.as_str()],
        )
        .map_err(|err| db_error("insert legal_entity", err))?;
        let id = LegalEntityId(tx.last_insert_rowid());
        tx.commit()
            .map_err(|err| db_error("commit insert legal_entity", err))?;

        self.legal_entity_by_id(id)
    }

    fn find_stack_by_legal_entity(
        &self,
        legal_entity_id: LegalEntityId,
    ) -> Result<Option<EnablementServiceStack>, InternalError> {
        self.stack_where("legal_entity_id = ?1", &legal_entity_id.0)
    }

    fn find_stack_by_name(
        &self,
        name: &str,
    ) -> Result<Option<EnablementServiceStack>, InternalError> {
        self.stack_where("name = ?1", &name)
    }

    fn insert_stack(
        &mut self,
        stack: NewEnablementServiceStack,
    ) -> Result<EnablementServiceStack, InternalError> {
        let settings = stack
            .connection_settings
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|err| {
                InternalError::store_internal(format!("encode connection_settings: {err}"))
            })?;

        let tx = self
            .conn
            .transaction()
            .map_err(|err| db_error("begin insert enablement_service_stack", err))?;
        tx.execute(
            "INSERT INTO enablement_service_stack (name, connection_settings, legal_entity_id) \
             VALUES (?1, ?2, ?3)",
            params![stack.name, settings, stack.legal_entity_id.0],
        )
        .map_err(|err| db_error("insert enablement_service_stack", err))?;
        let id = StackId(tx.last_insert_rowid());
        tx.commit()
            .map_err(|err| db_error("commit insert enablement_service_stack", err))?;

        self.stack_where("id = ?1", &id.0)?.ok_or_else(|| {
            InternalError::store_internal(format!(
                "enablement_service_stack {id} missing after commit"
            ))
        })
    }
}

///
/// StackRow
///

struct StackRow {
    id: i64,
    name: String,
    connection_settings: Option<String>,
    legal_entity_id: i64,
}

impl StackRow {
    fn into_stack(self) -> Result<EnablementServiceStack, InternalError> {
        let connection_settings = self
            .connection_settings
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|err| {
                InternalError::store_corruption(format!(
                    "enablement_service_stack {} has invalid connection_settings: {err}",
                    self.id
                ))
            })?;

        Ok(EnablementServiceStack {
            id: StackId(self.id),
            name: self.name,
            legal_entity_id: LegalEntityId(self.legal_entity_id),
            connection_settings,
        })
    }
}

fn legal_entity_from_row((id, bpnl): (i64, String)) -> Result<LegalEntity, InternalError> {
    let bpnl = Bpnl::parse(&bpnl).map_err(|err| {
        InternalError::store_corruption(format!("legal_entity {id} has invalid bpnl: {err}"))
    })?;

    Ok(LegalEntity {
        id: LegalEntityId(id),
        bpnl,
    })
}

// A missing version table and an empty one both mean "no marker".
fn read_marker(conn: &Connection) -> Result<Option<Revision>, InternalError> {
    let exists: bool = conn
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![VERSION_TABLE],
            |row| row.get(0),
        )
        .map_err(|err| db_error("probe version table", err))?;
    if !exists {
        return Ok(None);
    }

    let mut stmt = conn
        .prepare(&format!("SELECT version_num FROM {VERSION_TABLE}"))
        .map_err(|err| db_error("read version marker", err))?;
    let mut versions = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(|err| db_error("read version marker", err))?;

    match versions.len() {
        0 => Ok(None),
        1 => Ok(versions.pop().map(Revision::new)),
        n => Err(InternalError::store_corruption(format!(
            "{VERSION_TABLE} holds {n} rows ({}); expected at most one",
            versions.join(", ")
        ))),
    }
}

fn write_marker(conn: &Connection, revision: &Revision) -> Result<(), InternalError> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {VERSION_TABLE} (version_num TEXT PRIMARY KEY NOT NULL);
         DELETE FROM {VERSION_TABLE};"
    ))
    .map_err(|err| db_error("reset version marker", err))?;
    conn.execute(
        &format!("INSERT INTO {VERSION_TABLE} (version_num) VALUES (?1)"),
        params![revision.as_str()],
    )
    .map_err(|err| db_error("write version marker", err))?;

    Ok(())
}

// Constraint violations surface as conflicts; everything else is internal.
fn db_error(context: &str, err: rusqlite::Error) -> InternalError {
    let is_constraint = matches!(
        &err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    );
    let message = format!("sqlite {context}: {err}");

    if is_constraint {
        InternalError::store_conflict(message)
    } else {
        InternalError::store_internal(message)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        migrations::{self, LEGAL_ENTITY_TABLE, STACK_TABLE},
        revision::MigrationHistory,
    };
    use serde_json::json;

    fn migrated() -> SqliteStore {
        let graph = migrations::declared().unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();
        graph.upgrade_to_head(&mut store).unwrap();
        store
    }

    #[test]
    fn fresh_database_has_no_marker_and_no_tables() {
        let store = SqliteStore::open_in_memory().unwrap();

        assert_eq!(store.current_revision().unwrap(), None);
        assert!(store.table_names().unwrap().is_empty());
    }

    #[test]
    fn upgrade_records_head_and_creates_declared_tables() {
        let graph = migrations::declared().unwrap();
        let store = migrated();

        assert_eq!(store.current_revision().unwrap().as_ref(), Some(graph.head()));
        assert_eq!(
            store.table_names().unwrap(),
            vec![VERSION_TABLE, STACK_TABLE, LEGAL_ENTITY_TABLE]
        );
    }

    #[test]
    fn upgrade_is_a_no_op_at_head() {
        let graph = migrations::declared().unwrap();
        let mut store = migrated();

        graph.upgrade_to_head(&mut store).unwrap();

        assert_eq!(store.current_revision().unwrap().as_ref(), Some(graph.head()));
    }

    #[test]
    fn failing_step_rolls_back_with_its_marker() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let broken = Migration::new("0001_broken", None, "broken", "CREATE TABLE (", &[]);

        let err = store.apply_migration(&broken).unwrap_err();

        assert_eq!(err.class, crate::error::ErrorClass::Internal);
        assert_eq!(store.current_revision().unwrap(), None);
        assert!(store.table_names().unwrap().is_empty());
    }

    #[test]
    fn empty_version_table_reads_as_no_marker() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .execute_batch(&format!(
                "CREATE TABLE {VERSION_TABLE} (version_num TEXT PRIMARY KEY NOT NULL);"
            ))
            .unwrap();

        assert_eq!(store.current_revision().unwrap(), None);
        assert_eq!(store.table_names().unwrap(), vec![VERSION_TABLE]);
    }

    #[test]
    fn multiple_marker_rows_are_corruption() {
        let store = migrated();
        store
            .conn
            .execute(
                &format!("INSERT INTO {VERSION_TABLE} (version_num) VALUES ('stray')"),
                [],
            )
            .unwrap();

        let err = store.current_revision().unwrap_err();

        assert_eq!(err.class, crate::error::ErrorClass::Corruption);
    }

    #[test]
    fn stamp_replaces_the_marker_without_running_steps() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.stamp(&Revision::from("0001_initial")).unwrap();
        store.stamp(&Revision::from("0002_stack_owner_index")).unwrap();

        assert_eq!(
            store.current_revision().unwrap(),
            Some(Revision::from("0002_stack_owner_index"))
        );
        assert_eq!(store.table_names().unwrap(), vec![VERSION_TABLE]);
    }

    #[test]
    fn legal_entity_insert_reads_back_identity() {
        let mut store = migrated();
        let bpnl = Bpnl::parse("BPNL123").unwrap();

        let created = store.insert_legal_entity(&bpnl).unwrap();
        let found = store.find_legal_entity_by_bpnl(&bpnl).unwrap();

        assert_eq!(created.id, LegalEntityId(1));
        assert_eq!(found, Some(created));
        assert!(store.insert_legal_entity(&bpnl).unwrap_err().is_conflict());
    }

    #[test]
    fn stack_lookup_by_owner_and_name() {
        let mut store = migrated();
        let owner = store
            .insert_legal_entity(&Bpnl::parse("BPNL123").unwrap())
            .unwrap();
        let mut payload = NewEnablementServiceStack::new("EDC/DTR Default", owner.id);
        payload.connection_settings = Some(json!({ "edc": { "url": "http://edc" } }));

        let created = store.insert_stack(payload).unwrap();

        assert_eq!(
            store.find_stack_by_legal_entity(owner.id).unwrap().as_ref(),
            Some(&created)
        );
        assert_eq!(
            store.find_stack_by_name("EDC/DTR Default").unwrap().as_ref(),
            Some(&created)
        );
        assert_eq!(
            created.connection_settings,
            Some(json!({ "edc": { "url": "http://edc" } }))
        );
        assert_eq!(store.find_stack_by_name("other").unwrap(), None);
    }

    #[test]
    fn stack_insert_enforces_owner_foreign_key() {
        let mut store = migrated();

        let err = store
            .insert_stack(NewEnablementServiceStack::new("orphan", LegalEntityId(42)))
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(store.find_stack_by_name("orphan").unwrap(), None);
    }

    #[test]
    fn close_releases_the_connection() {
        let store = migrated();

        store.close().unwrap();
    }
}
