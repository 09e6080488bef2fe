use crate::{
    model::{Bpnl, EnablementServiceStack, LegalEntity, NewEnablementServiceStack},
    startup::halt::{Halt, HaltReason},
    store::EntityStore,
};
use tracing::{error, info};

/// Name given to the enablement service stack created for the seed entity.
pub const DEFAULT_STACK_NAME: &str = "EDC/DTR Default";

///
/// Provisioned
///
/// A seed entity together with whether this run created it.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Provisioned<T> {
    Created(T),
    Existing(T),
}

impl<T> Provisioned<T> {
    #[must_use]
    pub const fn entity(&self) -> &T {
        match self {
            Self::Created(entity) | Self::Existing(entity) => entity,
        }
    }

    #[must_use]
    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

///
/// SeedReport
///

#[derive(Clone, Debug, PartialEq)]
pub struct SeedReport {
    pub legal_entity: Provisioned<LegalEntity>,
    pub stack: Provisioned<EnablementServiceStack>,
}

impl SeedReport {
    /// Number of rows this run inserted.
    #[must_use]
    pub fn inserts(&self) -> usize {
        usize::from(self.legal_entity.is_created()) + usize::from(self.stack.is_created())
    }
}

///
/// SeedProvisioner
///
/// Find-or-create for the legal entity named by the configured BPNL and its
/// default enablement service stack. Each insert commits before the next
/// lookup depends on it; there is no rollback across the two.
///

pub struct SeedProvisioner<'a, S: ?Sized> {
    store: &'a mut S,
}

impl<'a, S: EntityStore + ?Sized> SeedProvisioner<'a, S> {
    pub const fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Validate the configured business key, then provision.
    pub fn ensure_seed_entities(&mut self, business_key: Option<&str>) -> Result<SeedReport, Halt> {
        let bpnl = Bpnl::from_config(business_key).map_err(|err| {
            error!(error = %err, "seed business key is not usable");
            Halt::new(HaltReason::MissingConfiguration, err.to_string())
        })?;

        self.provision(&bpnl)
    }

    pub fn provision(&mut self, bpnl: &Bpnl) -> Result<SeedReport, Halt> {
        let legal_entity = self.ensure_legal_entity(bpnl)?;
        let stack = self.ensure_stack(legal_entity.entity())?;

        Ok(SeedReport {
            legal_entity,
            stack,
        })
    }

    fn ensure_legal_entity(&mut self, bpnl: &Bpnl) -> Result<Provisioned<LegalEntity>, Halt> {
        if let Some(existing) = self
            .store
            .find_legal_entity_by_bpnl(bpnl)
            .map_err(|err| Halt::store_failure("look up legal entity", &err))?
        {
            info!(bpnl = %bpnl, legal_entity_id = %existing.id, "legal entity exists");

            return Ok(Provisioned::Existing(existing));
        }

        let created = self
            .store
            .insert_legal_entity(bpnl)
            .map_err(|err| Halt::store_failure("create legal entity", &err))?;
        info!(bpnl = %bpnl, legal_entity_id = %created.id, "legal entity created");

        Ok(Provisioned::Created(created))
    }

    fn ensure_stack(
        &mut self,
        owner: &LegalEntity,
    ) -> Result<Provisioned<EnablementServiceStack>, Halt> {
        if let Some(existing) = self
            .store
            .find_stack_by_legal_entity(owner.id)
            .map_err(|err| Halt::store_failure("look up enablement service stack", &err))?
        {
            info!(
                legal_entity_id = %owner.id,
                stack_id = %existing.id,
                name = %existing.name,
                "enablement service stack exists"
            );

            return Ok(Provisioned::Existing(existing));
        }

        // The default name is unique across all owners.
        if let Some(taken) = self
            .store
            .find_stack_by_name(DEFAULT_STACK_NAME)
            .map_err(|err| Halt::store_failure("look up enablement service stack", &err))?
        {
            error!(
                name = DEFAULT_STACK_NAME,
                stack_id = %taken.id,
                owner_legal_entity_id = %taken.legal_entity_id,
                legal_entity_id = %owner.id,
                bpnl = %owner.bpnl,
                "default stack name is owned by another legal entity"
            );

            return Err(Halt::new(
                HaltReason::NamingConflict,
                format!(
                    "stack '{DEFAULT_STACK_NAME}' already belongs to legal entity {}, \
                     cannot create it for legal entity {} ({})",
                    taken.legal_entity_id, owner.id, owner.bpnl
                ),
            ));
        }

        let created = self
            .store
            .insert_stack(NewEnablementServiceStack::new(DEFAULT_STACK_NAME, owner.id))
            .map_err(|err| Halt::store_failure("create enablement service stack", &err))?;
        info!(
            legal_entity_id = %owner.id,
            stack_id = %created.id,
            name = %created.name,
            "enablement service stack created"
        );

        Ok(Provisioned::Created(created))
    }
}
