use crate::{
    error::{ErrorClass, ErrorOrigin, InternalError},
    revision::{Migration, MigrationHistory, Revision},
    store::MigrationTarget,
};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error as ThisError;
use tracing::info;

///
/// RevisionGraphError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum RevisionGraphError {
    #[error("revision graph declares no migrations")]
    Empty,

    #[error("revision '{0}' is declared more than once")]
    DuplicateRevision(Revision),

    #[error("revision '{revision}' points at unknown down-revision '{down_revision}'")]
    UnknownDownRevision {
        revision: Revision,
        down_revision: Revision,
    },

    #[error("revision graph has {} base revisions, expected exactly one: {}", .0.len(), join(.0))]
    MultipleBases(Vec<Revision>),

    #[error("revision '{parent}' branches into {}", join(.children))]
    Branch {
        parent: Revision,
        children: Vec<Revision>,
    },

    #[error("revision graph is not a single chain; unreachable: {}", join(.0))]
    Disconnected(Vec<Revision>),

    #[error("revision '{0}' is not part of the declared history")]
    UnknownRevision(Revision),
}

impl From<RevisionGraphError> for InternalError {
    fn from(err: RevisionGraphError) -> Self {
        let class = match err {
            RevisionGraphError::UnknownRevision(_) => ErrorClass::Unsupported,
            _ => ErrorClass::InvariantViolation,
        };

        Self::new(class, ErrorOrigin::Migration, err.to_string())
    }
}

fn join(revisions: &[Revision]) -> String {
    revisions
        .iter()
        .map(Revision::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

///
/// RevisionGraph
///
/// Validated linear migration chain, ordered base first.
///

#[derive(Clone, Debug)]
pub struct RevisionGraph {
    chain: Vec<Migration>,
}

impl RevisionGraph {
    /// Validate and order a set of declared migrations.
    ///
    /// The declaration order is irrelevant; ordering is derived from
    /// `down_revision` links. Exactly one base, no branches, and no
    /// unreachable steps are accepted.
    pub fn new(migrations: Vec<Migration>) -> Result<Self, RevisionGraphError> {
        if migrations.is_empty() {
            return Err(RevisionGraphError::Empty);
        }

        // Phase 1: index by revision and reject duplicates.
        let mut by_revision = BTreeMap::new();
        for migration in migrations {
            let revision = migration.revision.clone();
            if by_revision.insert(revision.clone(), migration).is_some() {
                return Err(RevisionGraphError::DuplicateRevision(revision));
            }
        }

        // Phase 2: resolve parent links.
        let mut bases = Vec::new();
        let mut children: BTreeMap<Revision, Vec<Revision>> = BTreeMap::new();
        for migration in by_revision.values() {
            match &migration.down_revision {
                None => bases.push(migration.revision.clone()),
                Some(down) if !by_revision.contains_key(down) => {
                    return Err(RevisionGraphError::UnknownDownRevision {
                        revision: migration.revision.clone(),
                        down_revision: down.clone(),
                    });
                }
                Some(down) => children
                    .entry(down.clone())
                    .or_default()
                    .push(migration.revision.clone()),
            }
        }

        if let Some((parent, forks)) = children.iter().find(|(_, forks)| forks.len() > 1) {
            return Err(RevisionGraphError::Branch {
                parent: parent.clone(),
                children: forks.clone(),
            });
        }

        let base = match bases.as_slice() {
            [base] => base.clone(),
            // Every step has a parent, so the steps can only form cycles.
            [] => {
                return Err(RevisionGraphError::Disconnected(
                    by_revision.keys().cloned().collect(),
                ));
            }
            _ => return Err(RevisionGraphError::MultipleBases(bases)),
        };

        // Phase 3: walk the chain from the base.
        let mut chain = Vec::with_capacity(by_revision.len());
        let mut cursor = Some(base);
        while let Some(revision) = cursor {
            cursor = children
                .get(&revision)
                .and_then(|forks| forks.first())
                .cloned();
            if let Some(migration) = by_revision.remove(&revision) {
                chain.push(migration);
            }
        }

        if !by_revision.is_empty() {
            return Err(RevisionGraphError::Disconnected(
                by_revision.into_keys().collect(),
            ));
        }

        Ok(Self { chain })
    }

    /// Terminal revision of the chain.
    #[must_use]
    pub fn head(&self) -> &Revision {
        // `new` rejects empty chains.
        &self.chain[self.chain.len() - 1].revision
    }

    /// First revision of the chain.
    #[must_use]
    pub fn base(&self) -> &Revision {
        &self.chain[0].revision
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Iterate migrations base first.
    pub fn iter(&self) -> impl Iterator<Item = &Migration> {
        self.chain.iter()
    }

    #[must_use]
    pub fn contains(&self, revision: &Revision) -> bool {
        self.position(revision).is_some()
    }

    fn position(&self, revision: &Revision) -> Option<usize> {
        self.chain.iter().position(|m| &m.revision == revision)
    }

    /// Steps still to apply for a store recording `current`.
    pub fn pending_after(
        &self,
        current: Option<&Revision>,
    ) -> Result<&[Migration], RevisionGraphError> {
        match current {
            None => Ok(&self.chain),
            Some(revision) => {
                let index = self
                    .position(revision)
                    .ok_or_else(|| RevisionGraphError::UnknownRevision(revision.clone()))?;

                Ok(&self.chain[index + 1..])
            }
        }
    }

    /// Every table the declared chain creates, sorted.
    #[must_use]
    pub fn declared_tables(&self) -> BTreeSet<&'static str> {
        self.chain
            .iter()
            .flat_map(|m| m.tables.iter().copied())
            .collect()
    }
}

impl<S: MigrationTarget + ?Sized> MigrationHistory<S> for RevisionGraph {
    fn head(&self) -> &Revision {
        Self::head(self)
    }

    fn knows(&self, revision: &Revision) -> bool {
        self.contains(revision)
    }

    fn upgrade_to_head(&self, store: &mut S) -> Result<(), InternalError> {
        let current = store.current_revision()?;
        let pending = self.pending_after(current.as_ref())?;

        for migration in pending {
            info!(
                revision = %migration.revision,
                down_revision = migration.down_revision.as_ref().map_or("<base>", |r| r.as_str()),
                description = migration.description,
                "applying migration"
            );
            store.apply_migration(migration)?;
        }

        Ok(())
    }
}
