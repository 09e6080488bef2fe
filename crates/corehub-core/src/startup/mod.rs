//! Startup bootstrap.
//!
//! Runs once, before the service accepts any work:
//! 1. validate the configured business key,
//! 2. make sure the schema is at head (`SchemaGuard`),
//! 3. make sure the seed entities exist (`SeedProvisioner`).
//!
//! Each step is its own transaction boundary. A halt in a later step does
//! not undo the earlier ones; they are idempotent on the next run.

mod guard;
mod halt;
mod seed;


pub use guard::{GuardDecision, SchemaGuard};
pub use halt::{Halt, HaltReason};
pub use seed::{DEFAULT_STACK_NAME, Provisioned, SeedProvisioner, SeedReport};

use crate::{
    model::Bpnl,
    revision::MigrationHistory,
    store::{EntityStore, SchemaIntrospection},
};
use serde::Deserialize;
use tracing::{error, info, info_span, warn};

///
/// UnmanagedSchemaPolicy
///
/// What to do with a store that has tables but no version marker.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum UnmanagedSchemaPolicy {
    /// Refuse to start until the operator stamps or reconciles the store.
    #[default]
    Halt,

    /// Log the warning and carry on to seeding.
    Continue,
}

///
/// StartupOutcome
///

#[derive(Clone, Debug, PartialEq)]
pub struct StartupOutcome {
    pub schema: GuardDecision,
    pub seed: SeedReport,
}

///
/// Startup
///

pub struct Startup<H> {
    history: H,
    policy: UnmanagedSchemaPolicy,
}

impl<H> Startup<H> {
    pub const fn new(history: H) -> Self {
        Self {
            history,
            policy: UnmanagedSchemaPolicy::Halt,
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: UnmanagedSchemaPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub const fn history(&self) -> &H {
        &self.history
    }

    /// Run the whole bootstrap against `store`.
    pub fn run<S>(&self, store: &mut S, business_key: Option<&str>) -> Result<StartupOutcome, Halt>
    where
        S: SchemaIntrospection + EntityStore + ?Sized,
        H: MigrationHistory<S>,
    {
        let span = info_span!("startup", head = %self.history.head());
        let _enter = span.enter();

        // Phase 1: configuration, before anything touches the store.
        let bpnl = Bpnl::from_config(business_key).map_err(|err| {
            error!(error = %err, "seed business key is not usable");
            Halt::new(HaltReason::MissingConfiguration, err.to_string())
        })?;

        // Phase 2: schema.
        let schema = SchemaGuard::new(&self.history).ensure_schema_ready(store)?;
        if let GuardDecision::Unmanaged { tables } = &schema {
            match self.policy {
                UnmanagedSchemaPolicy::Halt => {
                    return Err(Halt::new(
                        HaltReason::AmbiguousSchemaState,
                        format!(
                            "store has tables ({}) but no version marker; \
                             stamp it at '{}' or reconcile it manually",
                            tables.join(", "),
                            self.history.head()
                        ),
                    ));
                }
                UnmanagedSchemaPolicy::Continue => {
                    warn!(
                        tables = %tables.join(", "),
                        "continuing with an unmanaged schema as configured"
                    );
                }
            }
        }

        // Phase 3: seed entities.
        let seed = SeedProvisioner::new(store).provision(&bpnl)?;

        info!(
            bpnl = %bpnl,
            legal_entity_id = %seed.legal_entity.entity().id,
            stack_id = %seed.stack.entity().id,
            inserts = seed.inserts(),
            "startup complete"
        );

        Ok(StartupOutcome { schema, seed })
    }
}
