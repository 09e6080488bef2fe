//! Declared migration history.
//!
//! A `RevisionGraph` is a validated, strictly linear chain of `Migration`
//! steps. Its terminal node is the head revision every store is expected to
//! record once initialized. The graph is read-only; applying steps is
//! delegated to a `MigrationTarget` store.

mod graph;

use derive_more::{Deref, Display};
use serde::{Deserialize, Serialize};

pub use graph::{RevisionGraph, RevisionGraphError};

///
/// Revision
///
/// Identifier of one migration step, as recorded in a store's version marker.
///

#[derive(
    Clone, Debug, Deref, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Revision {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

///
/// Migration
///
/// One declared schema step. `sql` runs as a single batch; `tables` lists the
/// tables the step creates so backends without a SQL engine can keep an
/// accurate inventory.
///

#[derive(Clone, Debug)]
pub struct Migration {
    pub revision: Revision,
    pub down_revision: Option<Revision>,
    pub description: &'static str,
    pub sql: &'static str,
    pub tables: &'static [&'static str],
}

impl Migration {
    #[must_use]
    pub fn new(
        revision: &str,
        down_revision: Option<&str>,
        description: &'static str,
        sql: &'static str,
        tables: &'static [&'static str],
    ) -> Self {
        Self {
            revision: Revision::new(revision),
            down_revision: down_revision.map(Revision::new),
            description,
            sql,
            tables,
        }
    }
}

///
/// MigrationHistory
///
/// Migration-history collaborator seen by the schema guard: it names the
/// expected head revision and can bring an empty store up to it.
///

pub trait MigrationHistory<S: ?Sized> {
    /// Terminal revision of the declared chain.
    fn head(&self) -> &Revision;

    /// Whether `revision` appears anywhere in the declared chain.
    fn knows(&self, revision: &Revision) -> bool {
        revision == self.head()
    }

    /// Apply every pending step up to `head`. Must fail cleanly.
    fn upgrade_to_head(&self, store: &mut S) -> Result<(), crate::error::InternalError>;
}
