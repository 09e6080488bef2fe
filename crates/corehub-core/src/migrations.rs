//! The schema history this service ships with.

use crate::revision::{Migration, RevisionGraph, RevisionGraphError};

/// Table holding the version marker.
pub const VERSION_TABLE: &str = "corehub_version";

pub const LEGAL_ENTITY_TABLE: &str = "legal_entity";
pub const STACK_TABLE: &str = "enablement_service_stack";

const INITIAL_SQL: &str = "
CREATE TABLE legal_entity (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bpnl TEXT NOT NULL UNIQUE
);
CREATE TABLE enablement_service_stack (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    connection_settings TEXT,
    legal_entity_id INTEGER NOT NULL REFERENCES legal_entity (id)
);
";

const STACK_OWNER_INDEX_SQL: &str = "
CREATE INDEX ix_enablement_service_stack_legal_entity_id
    ON enablement_service_stack (legal_entity_id);
";

/// Build the declared revision chain.
pub fn declared() -> Result<RevisionGraph, RevisionGraphError> {
    RevisionGraph::new(vec![
        Migration::new(
            "0001_initial",
            None,
            "legal entity and enablement service stack tables",
            INITIAL_SQL,
            &[LEGAL_ENTITY_TABLE, STACK_TABLE],
        ),
        Migration::new(
            "0002_stack_owner_index",
            Some("0001_initial"),
            "index enablement service stacks by owning legal entity",
            STACK_OWNER_INDEX_SQL,
            &[],
        ),
    ])
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_history_is_a_valid_chain() {
        let graph = declared().unwrap();

        assert_eq!(graph.base().as_str(), "0001_initial");
        assert_eq!(graph.head().as_str(), "0002_stack_owner_index");
        assert_eq!(
            graph.declared_tables().into_iter().collect::<Vec<_>>(),
            vec![STACK_TABLE, LEGAL_ENTITY_TABLE]
        );
    }
}
