//! Customer orders: the available list, the active list, and the archive.
//!
//! An order lives in exactly one of the three lists. Archived orders are
//! terminal and never touched again, so a reward is credited at most once.

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::config::OrderConfig;
use crate::error::CommandError;
use crate::fixed::{from_units, Day, Fixed64, Money};
use crate::id::{OrderId, ProductKind};
use crate::product::{Inventory, ProductCatalog};
use crate::rng::SimRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    InProduction,
    Completed,
    Failed,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Failed | OrderStatus::Rejected
        )
    }
}

/// An escalation opened when an accepted order misses its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complaint {
    pub opened_day: Day,
    /// The order auto-cancels on this day if still unresolved.
    pub expires_day: Day,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub product: ProductKind,
    pub quantity: u32,
    /// Units already shipped against this order.
    pub fulfilled: u32,
    pub deadline: Day,
    pub status: OrderStatus,
    pub reward: Money,
    pub created_day: Day,
    pub accepted_day: Option<Day>,
    pub complaint: Option<Complaint>,
}

impl Order {
    pub fn remaining(&self) -> u32 {
        self.quantity - self.fulfilled
    }
}

/// Result of shipping inventory against one order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shipment {
    pub product: ProductKind,
    pub units: u32,
    /// Set when this shipment completed the order.
    pub reward: Option<Money>,
}

/// What one order-book tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderReport {
    pub shipped: Vec<(OrderId, Shipment)>,
    pub completed: Vec<(OrderId, Money)>,
    /// Accepted orders that failed, with the penalty owed (zero when
    /// complaints are disabled).
    pub failed: Vec<(OrderId, Money)>,
    /// Available orders that expired before being accepted.
    pub expired: Vec<OrderId>,
    pub complaints: Vec<OrderId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    orders: SlotMap<OrderId, Order>,
    available: Vec<OrderId>,
    active: Vec<OrderId>,
    archived: Vec<OrderId>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(id)
    }

    fn lookup(&self, id: OrderId) -> Result<&Order, CommandError> {
        self.orders.get(id).ok_or(CommandError::OrderNotFound(id))
    }

    fn listed<'a>(&'a self, ids: &'a [OrderId]) -> impl Iterator<Item = (OrderId, &'a Order)> {
        ids.iter()
            .filter_map(move |id| self.orders.get(*id).map(|o| (*id, o)))
    }

    pub fn available(&self) -> impl Iterator<Item = (OrderId, &Order)> {
        self.listed(&self.available)
    }

    /// Accepted orders, in acceptance order.
    pub fn active(&self) -> impl Iterator<Item = (OrderId, &Order)> {
        self.listed(&self.active)
    }

    pub fn archived(&self) -> impl Iterator<Item = (OrderId, &Order)> {
        self.listed(&self.archived)
    }

    /// Available plus active orders.
    pub fn open_count(&self) -> u32 {
        (self.available.len() + self.active.len()) as u32
    }

    fn archive(&mut self, id: OrderId, status: OrderStatus) {
        self.available.retain(|o| *o != id);
        self.active.retain(|o| *o != id);
        if let Some(order) = self.orders.get_mut(id) {
            order.status = status;
            order.complaint = None;
        }
        self.archived.push(id);
    }

    // -----------------------------------------------------------------------
    // Demand
    // -----------------------------------------------------------------------

    /// Largest quantity a new order may ask for, given how many assembly
    /// machines are currently working.
    pub fn quantity_cap(working_machines: u32, worker_factor: Fixed64, config: &OrderConfig) -> u32 {
        let raw = from_units(working_machines) * (Fixed64::ONE + worker_factor) * Fixed64::from_num(2);
        raw.round()
            .to_num::<i64>()
            .clamp(1, i64::from(config.max_quantity.max(1))) as u32
    }

    /// Create a random order for one of the unlocked products.
    pub fn generate(
        &mut self,
        rng: &mut SimRng,
        today: Day,
        catalog: &ProductCatalog,
        quantity_cap: u32,
        config: &OrderConfig,
    ) -> Option<OrderId> {
        let unlocked: Vec<(ProductKind, Money)> =
            catalog.unlocked().map(|p| (p.kind, p.price)).collect();
        let &(product, price) = rng.pick(&unlocked)?;
        let quantity = rng.range_inclusive(1, quantity_cap.max(1));
        let slack = rng.below(config.lead_spread_days);
        let deadline = today
            .saturating_add(config.min_lead_days)
            .saturating_add(slack);
        let urgency_days = config
            .lead_spread_days
            .saturating_sub(1)
            .saturating_sub(slack);
        let urgency = Fixed64::ONE + config.urgency_step * from_units(urgency_days);
        let reward = price
            .saturating_mul(from_units(quantity))
            .saturating_mul(config.reward_margin)
            .saturating_mul(urgency);

        Some(self.insert_available(Order {
            product,
            quantity,
            fulfilled: 0,
            deadline,
            status: OrderStatus::Pending,
            reward,
            created_day: today,
            accepted_day: None,
            complaint: None,
        }))
    }

    /// List a prepared order as available.
    pub(crate) fn insert_available(&mut self, order: Order) -> OrderId {
        let id = self.orders.insert(order);
        self.available.push(id);
        id
    }

    /// Roll for a new order if there is room in the book.
    pub fn maybe_spawn(
        &mut self,
        rng: &mut SimRng,
        today: Day,
        catalog: &ProductCatalog,
        quantity_cap: u32,
        config: &OrderConfig,
    ) -> Option<OrderId> {
        if self.open_count() >= config.max_open_orders {
            return None;
        }
        if !rng.chance(config.spawn_chance) {
            return None;
        }
        self.generate(rng, today, catalog, quantity_cap, config)
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    pub fn accept(&mut self, id: OrderId, today: Day) -> Result<(), CommandError> {
        let order = self.lookup(id)?;
        if !self.available.contains(&id) || order.status != OrderStatus::Pending {
            return Err(CommandError::OrderNotOpen);
        }
        if today > order.deadline {
            return Err(CommandError::DeadlineExpired {
                deadline: order.deadline,
                day: today,
            });
        }
        self.available.retain(|o| *o != id);
        self.active.push(id);
        if let Some(order) = self.orders.get_mut(id) {
            order.status = OrderStatus::InProduction;
            order.accepted_day = Some(today);
        }
        Ok(())
    }

    pub fn reject(&mut self, id: OrderId) -> Result<(), CommandError> {
        let order = self.lookup(id)?;
        if !self.available.contains(&id) || order.status != OrderStatus::Pending {
            return Err(CommandError::OrderNotOpen);
        }
        self.archive(id, OrderStatus::Rejected);
        Ok(())
    }

    /// Ship whatever inventory covers for one active order right now.
    pub fn ship(&mut self, id: OrderId, inventory: &mut Inventory) -> Result<Shipment, CommandError> {
        let order = self.lookup(id)?;
        if !self.active.contains(&id) {
            return Err(CommandError::OrderNotOpen);
        }
        let available = inventory.count(order.product);
        if available == 0 {
            return Err(CommandError::InsufficientInventory {
                product: order.product,
                needed: order.remaining(),
                available,
            });
        }
        Ok(self.settle(id, inventory))
    }

    /// Push the deadline back in exchange for a smaller reward.
    pub fn negotiate(&mut self, id: OrderId, today: Day, config: &OrderConfig) -> Result<Day, CommandError> {
        self.require_complaint(id)?;
        let order = self
            .orders
            .get_mut(id)
            .ok_or(CommandError::OrderNotFound(id))?;
        order.deadline = today.saturating_add(config.renegotiate_extension_days);
        order.reward = order.reward * (Fixed64::ONE - config.renegotiate_penalty);
        order.complaint = None;
        Ok(order.deadline)
    }

    /// Give up on a complained-about order. Returns the penalty owed.
    pub fn cancel(&mut self, id: OrderId, config: &OrderConfig) -> Result<Money, CommandError> {
        let order = self.require_complaint(id)?;
        let penalty = order.reward * config.cancel_penalty;
        self.archive(id, OrderStatus::Failed);
        Ok(penalty)
    }

    fn require_complaint(&self, id: OrderId) -> Result<&Order, CommandError> {
        let order = self.lookup(id)?;
        if !self.active.contains(&id) {
            return Err(CommandError::OrderNotOpen);
        }
        if order.complaint.is_none() {
            return Err(CommandError::NoComplaint);
        }
        Ok(order)
    }

    fn settle(&mut self, id: OrderId, inventory: &mut Inventory) -> Shipment {
        let Some(order) = self.orders.get_mut(id) else {
            return Shipment {
                product: ProductKind::Phone,
                units: 0,
                reward: None,
            };
        };
        let units = inventory.take_up_to(order.product, order.remaining());
        order.fulfilled += units;
        let product = order.product;
        let reward = (order.remaining() == 0).then_some(order.reward);
        if reward.is_some() {
            self.archive(id, OrderStatus::Completed);
        }
        Shipment {
            product,
            units,
            reward,
        }
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Settle active orders against inventory and expire late ones.
    pub fn tick(&mut self, today: Day, inventory: &mut Inventory, config: &OrderConfig) -> OrderReport {
        let mut report = OrderReport::default();

        for id in self.active.clone() {
            let shipment = self.settle(id, inventory);
            if shipment.units > 0 {
                report.shipped.push((id, shipment));
            }
            if let Some(reward) = shipment.reward {
                report.completed.push((id, reward));
                continue;
            }

            let Some(order) = self.orders.get_mut(id) else {
                continue;
            };
            if today <= order.deadline {
                continue;
            }
            if config.complaint_window_days == 0 {
                self.archive(id, OrderStatus::Failed);
                report.failed.push((id, Money::ZERO));
                continue;
            }
            match order.complaint {
                None => {
                    order.complaint = Some(Complaint {
                        opened_day: today,
                        expires_day: today.saturating_add(config.complaint_window_days),
                    });
                    report.complaints.push(id);
                }
                Some(complaint) if today >= complaint.expires_day => {
                    let penalty = order.reward * config.cancel_penalty;
                    self.archive(id, OrderStatus::Failed);
                    report.failed.push((id, penalty));
                }
                Some(_) => {}
            }
        }

        for id in self.available.clone() {
            let late = self
                .orders
                .get(id)
                .is_some_and(|o| o.status == OrderStatus::Pending && today > o.deadline);
            if late {
                self.archive(id, OrderStatus::Failed);
                report.expired.push(id);
            }
        }

        report
    }
}
