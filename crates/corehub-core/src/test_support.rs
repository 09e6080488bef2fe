//! Shared fixtures for unit tests.

use crate::{
    error::InternalError,
    migrations,
    revision::{Migration, MigrationHistory, Revision, RevisionGraph},
    store::MigrationTarget,
};
use std::cell::Cell;

/// Linear chain `r0 <- r1 <- ... <- r{len-1}`, each step creating one table.
pub fn linear_graph(len: usize) -> RevisionGraph {
    const TABLES: [&[&str]; 8] = [
        &["t0"],
        &["t1"],
        &["t2"],
        &["t3"],
        &["t4"],
        &["t5"],
        &["t6"],
        &["t7"],
    ];

    let steps = (0..len)
        .map(|i| {
            let down = i.checked_sub(1).map(|p| format!("r{p}"));
            Migration::new(&format!("r{i}"), down.as_deref(), "fixture step", "", TABLES[i])
        })
        .collect();

    RevisionGraph::new(steps).unwrap()
}

///
/// CountingHistory
/// Real history that records how often an upgrade was requested.
///

pub struct CountingHistory {
    inner: RevisionGraph,
    upgrades: Cell<usize>,
}

impl CountingHistory {
    pub fn new(inner: RevisionGraph) -> Self {
        Self {
            inner,
            upgrades: Cell::new(0),
        }
    }

    pub fn declared() -> Self {
        Self::new(migrations::declared().unwrap())
    }

    pub fn upgrades(&self) -> usize {
        self.upgrades.get()
    }
}

impl<S: MigrationTarget + ?Sized> MigrationHistory<S> for CountingHistory {
    fn head(&self) -> &Revision {
        self.inner.head()
    }

    fn knows(&self, revision: &Revision) -> bool {
        self.inner.contains(revision)
    }

    fn upgrade_to_head(&self, store: &mut S) -> Result<(), InternalError> {
        self.upgrades.set(self.upgrades.get() + 1);
        self.inner.upgrade_to_head(store)
    }
}

///
/// FailingHistory
/// Upgrade always errors without touching the store.
///

pub struct FailingHistory {
    pub head: Revision,
}

impl<S: ?Sized> MigrationHistory<S> for FailingHistory {
    fn head(&self) -> &Revision {
        &self.head
    }

    fn upgrade_to_head(&self, _store: &mut S) -> Result<(), InternalError> {
        Err(InternalError::migration_internal("disk full"))
    }
}

///
/// SilentHistory
/// Upgrade reports success but never records a marker.
///

pub struct SilentHistory {
    pub head: Revision,
}

impl<S: ?Sized> MigrationHistory<S> for SilentHistory {
    fn head(&self) -> &Revision {
        &self.head
    }

    fn upgrade_to_head(&self, _store: &mut S) -> Result<(), InternalError> {
        Ok(())
    }
}
