//! Product catalog (recipes, prices, unlocks) and finished-goods inventory.

use serde::{Deserialize, Serialize};

use crate::config::ProductDef;
use crate::error::CommandError;
use crate::fixed::{from_units, Money};
use crate::id::{ProductKind, ResourceKind};
use crate::resource::ResourceLedger;

/// A product the factory knows how to build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub kind: ProductKind,
    pub name: String,
    pub icon: String,
    pub price: Money,
    pub production_time: u32,
    pub requires: Vec<(ResourceKind, u32)>,
    pub unlocked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCatalog {
    products: Vec<Product>,
}

impl ProductCatalog {
    pub fn from_defs(defs: &[ProductDef]) -> Self {
        let mut products: Vec<Product> = defs
            .iter()
            .map(|def| Product {
                kind: def.kind,
                name: def.name.clone(),
                icon: def.icon.clone(),
                price: def.price,
                production_time: def.production_time,
                requires: def.requires.clone(),
                unlocked: def.unlocked,
            })
            .collect();
        products.sort_by_key(|p| p.kind);
        Self { products }
    }

    pub fn get(&self, kind: ProductKind) -> Option<&Product> {
        self.products.get(kind.index()).filter(|p| p.kind == kind)
    }

    fn get_mut(&mut self, kind: ProductKind) -> Option<&mut Product> {
        self.products.get_mut(kind.index()).filter(|p| p.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.iter()
    }

    pub fn unlocked(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.unlocked)
    }

    /// The product, or an error if it is missing or still locked.
    pub fn require_unlocked(&self, kind: ProductKind) -> Result<&Product, CommandError> {
        match self.get(kind) {
            Some(product) if product.unlocked => Ok(product),
            _ => Err(CommandError::ProductLocked(kind)),
        }
    }

    /// Allowed price range `[material cost, markup × material cost]`.
    pub fn price_bounds(
        &self,
        kind: ProductKind,
        resources: &ResourceLedger,
        max_markup: u32,
    ) -> Option<(Money, Money)> {
        let product = self.get(kind)?;
        let min = resources.material_cost(&product.requires);
        Some((min, min.saturating_mul(from_units(max_markup))))
    }

    pub fn set_price(
        &mut self,
        kind: ProductKind,
        price: Money,
        resources: &ResourceLedger,
        max_markup: u32,
    ) -> Result<(), CommandError> {
        let (min, max) = self
            .price_bounds(kind, resources, max_markup)
            .ok_or(CommandError::Malformed("unknown product"))?;
        if price < min || price > max {
            return Err(CommandError::PriceOutOfRange { price, min, max });
        }
        if let Some(product) = self.get_mut(kind) {
            product.price = price;
        }
        Ok(())
    }

    /// Cost to unlock a locked product: its price times `multiple`.
    pub fn unlock_cost(&self, kind: ProductKind, multiple: u32) -> Result<Money, CommandError> {
        let product = self
            .get(kind)
            .ok_or(CommandError::Malformed("unknown product"))?;
        if product.unlocked {
            return Err(CommandError::ProductAlreadyUnlocked(kind));
        }
        Ok(product.price.saturating_mul(from_units(multiple)))
    }

    pub(crate) fn mark_unlocked(&mut self, kind: ProductKind) {
        if let Some(product) = self.get_mut(kind) {
            product.unlocked = true;
        }
    }
}

/// Finished units per product, indexed by [`ProductKind::index`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    counts: [u32; 3],
}

impl Inventory {
    pub fn count(&self, kind: ProductKind) -> u32 {
        self.counts[kind.index()]
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProductKind, u32)> + '_ {
        ProductKind::ALL.iter().map(|&k| (k, self.counts[k.index()]))
    }

    pub fn add(&mut self, kind: ProductKind, amount: u32) {
        let slot = &mut self.counts[kind.index()];
        *slot = slot.saturating_add(amount);
    }

    /// Remove exactly `amount` units or nothing.
    pub fn remove(&mut self, kind: ProductKind, amount: u32) -> Result<(), CommandError> {
        let slot = &mut self.counts[kind.index()];
        if *slot < amount {
            return Err(CommandError::InsufficientInventory {
                product: kind,
                needed: amount,
                available: *slot,
            });
        }
        *slot -= amount;
        Ok(())
    }

    /// Remove up to `amount` units and return how many were taken.
    pub fn take_up_to(&mut self, kind: ProductKind, amount: u32) -> u32 {
        let slot = &mut self.counts[kind.index()];
        let taken = amount.min(*slot);
        *slot -= taken;
        taken
    }
}
