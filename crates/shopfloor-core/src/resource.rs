//! Raw-material stock held in the warehouse.

use serde::{Deserialize, Serialize};

use crate::config::ResourceDef;
use crate::error::CommandError;
use crate::finance::FinanceLedger;
use crate::fixed::{from_units, Money};
use crate::id::ResourceKind;

/// One raw material's stock level. Invariant: `quantity <= capacity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub name: String,
    pub icon: String,
    quantity: u32,
    capacity: u32,
    pub unit_cost: Money,
}

impl Resource {
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Units that can still be stored.
    pub fn headroom(&self) -> u32 {
        self.capacity - self.quantity
    }
}

/// Stock of every [`ResourceKind`], indexed by [`ResourceKind::index`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLedger {
    resources: Vec<Resource>,
}

impl ResourceLedger {
    /// Build from validated definitions. Definitions may come in any order.
    pub fn from_defs(defs: &[ResourceDef]) -> Self {
        let mut resources: Vec<Resource> = defs
            .iter()
            .map(|def| Resource {
                kind: def.kind,
                name: def.name.clone(),
                icon: def.icon.clone(),
                quantity: def.quantity.min(def.capacity),
                capacity: def.capacity,
                unit_cost: def.unit_cost,
            })
            .collect();
        resources.sort_by_key(|r| r.kind);
        Self { resources }
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&Resource> {
        self.resources.get(kind.index()).filter(|r| r.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub fn quantity(&self, kind: ResourceKind) -> u32 {
        self.get(kind).map_or(0, Resource::quantity)
    }

    /// Total price of `amount` units of `kind`.
    pub fn purchase_cost(&self, kind: ResourceKind, amount: u32) -> Money {
        self.get(kind)
            .map_or(Money::ZERO, |r| r.unit_cost.saturating_mul(from_units(amount)))
    }

    /// Buy `amount` units, debiting `finance`. Returns the cost paid.
    pub fn buy(
        &mut self,
        kind: ResourceKind,
        amount: u32,
        finance: &mut FinanceLedger,
    ) -> Result<Money, CommandError> {
        if amount == 0 {
            return Err(CommandError::Malformed("cannot buy zero units"));
        }
        let cost = self.purchase_cost(kind, amount);
        let slot = self
            .resources
            .get_mut(kind.index())
            .ok_or(CommandError::Malformed("unknown resource"))?;

        finance.ensure(cost)?;
        if amount > slot.headroom() {
            return Err(CommandError::CapacityExceeded {
                kind,
                held: slot.quantity,
                requested: amount,
                capacity: slot.capacity,
            });
        }

        finance.spend(cost)?;
        slot.quantity += amount;
        Ok(cost)
    }

    /// Fail with the first resource that cannot cover its requirement.
    pub fn check(&self, requirements: &[(ResourceKind, u32)]) -> Result<(), CommandError> {
        for &(kind, needed) in requirements {
            let available = self.quantity(kind);
            if available < needed {
                return Err(CommandError::InsufficientStock {
                    kind,
                    needed,
                    available,
                });
            }
        }
        Ok(())
    }

    /// Debit every requirement, or nothing if any is short.
    pub fn consume(&mut self, requirements: &[(ResourceKind, u32)]) -> Result<(), CommandError> {
        self.check(requirements)?;
        for &(kind, needed) in requirements {
            if let Some(slot) = self.resources.get_mut(kind.index()) {
                slot.quantity -= needed;
            }
        }
        Ok(())
    }

    /// Σ amount × unit cost.
    pub fn material_cost(&self, requirements: &[(ResourceKind, u32)]) -> Money {
        requirements
            .iter()
            .map(|&(kind, amount)| self.purchase_cost(kind, amount))
            .sum()
    }
}
