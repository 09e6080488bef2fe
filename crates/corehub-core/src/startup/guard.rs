//! Schema version guard.
//!
//! Compares the store's recorded version marker against the head of the
//! declared history and decides whether startup may continue.
//!
//! Important semantic notes:
//! - Only a virgin store (no marker, no tables) is ever upgraded.
//! - An initialized store behind or beside head is never touched; the
//!   operator migrates it explicitly.
//! - A store with tables but no marker is reported, not repaired.

use crate::{
    revision::{MigrationHistory, Revision},
    startup::halt::{Halt, HaltReason},
    store::SchemaIntrospection,
};
use tracing::{error, info, warn};

///
/// GuardDecision
///
/// Which branch the guard took when it let startup proceed.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GuardDecision {
    /// Marker already equals head; the store was not touched.
    UpToDate,

    /// Virgin store brought up to head.
    Initialized,

    /// No marker but tables exist. Soft halt: the caller's policy decides.
    Unmanaged { tables: Vec<String> },
}

///
/// SchemaGuard
///

pub struct SchemaGuard<'a, H: ?Sized> {
    history: &'a H,
}

impl<'a, H: ?Sized> SchemaGuard<'a, H> {
    pub const fn new(history: &'a H) -> Self {
        Self { history }
    }

    /// Verify the store is at head, initializing it when it is empty.
    pub fn ensure_schema_ready<S>(&self, store: &mut S) -> Result<GuardDecision, Halt>
    where
        S: SchemaIntrospection + ?Sized,
        H: MigrationHistory<S>,
    {
        let head = self.history.head();
        let current = store
            .current_revision()
            .map_err(|err| Halt::store_failure("read version marker", &err))?;

        match current {
            Some(current) if &current == head => {
                info!(current = %current, head = %head, "schema is up to date");

                Ok(GuardDecision::UpToDate)
            }
            Some(current) => Err(self.outdated::<S>(&current, head)),
            None => {
                let tables = store
                    .table_names()
                    .map_err(|err| Halt::store_failure("read table inventory", &err))?;

                if tables.is_empty() {
                    self.initialize(store, head)?;

                    Ok(GuardDecision::Initialized)
                } else {
                    warn!(
                        head = %head,
                        tables = %tables.join(", "),
                        "store has tables but no version marker; stamp it at head \
                         if the schema matches, otherwise reconcile it manually"
                    );

                    Ok(GuardDecision::Unmanaged { tables })
                }
            }
        }
    }

    fn outdated<S>(&self, current: &Revision, head: &Revision) -> Halt
    where
        S: ?Sized,
        H: MigrationHistory<S>,
    {
        if self.history.knows(current) {
            error!(
                current = %current,
                head = %head,
                "schema is out of date; run the migrations to head before starting"
            );
        } else {
            error!(
                current = %current,
                head = %head,
                "schema is on a divergent revision this build does not know; \
                 reconcile the store with the declared history"
            );
        }

        Halt::new(
            HaltReason::SchemaOutdated,
            format!("store is at revision '{current}', expected head '{head}'"),
        )
    }

    fn initialize<S>(&self, store: &mut S, head: &Revision) -> Result<(), Halt>
    where
        S: SchemaIntrospection + ?Sized,
        H: MigrationHistory<S>,
    {
        info!(head = %head, "empty store; upgrading to head");

        if let Err(err) = self.history.upgrade_to_head(store) {
            error!(
                head = %head,
                error = %err.display_with_class(),
                "schema upgrade failed"
            );

            return Err(Halt::new(
                HaltReason::UpgradeFailure,
                format!("upgrade to '{head}' failed: {err}"),
            ));
        }

        // The upgrade must have recorded head.
        let recorded = store.current_revision().map_err(|err| {
            error!(head = %head, error = %err.display_with_class(), "cannot verify upgrade");
            Halt::new(
                HaltReason::UpgradeFailure,
                format!("cannot verify upgrade to '{head}': {err}"),
            )
        })?;

        if recorded.as_ref() != Some(head) {
            let recorded = recorded.as_ref().map_or("<none>", Revision::as_str);
            error!(
                current = recorded,
                head = %head,
                "upgrade finished but the version marker is not at head"
            );

            return Err(Halt::new(
                HaltReason::UpgradeFailure,
                format!("after upgrade the store records '{recorded}', expected '{head}'"),
            ));
        }

        info!(current = %head, head = %head, "store initialized at head");

        Ok(())
    }
}
