//! The root simulation state and its read-only view.
//!
//! [`EngineState`] owns every component. The engine mutates it through
//! commands; everyone else reads it through the accessors here.

use serde::{Deserialize, Serialize};
use slotmap::Key;

use crate::config::EngineConfig;
use crate::finance::{FinanceLedger, Loan};
use crate::fixed::{Day, Fixed64, Money};
use crate::id::{LoanId, MachineId, OrderId, WorkerId};
use crate::machine::{Machine, MachineState, StallReason};
use crate::order::{Order, OrderBook};
use crate::pipeline::ProductionPipeline;
use crate::product::{Inventory, Product, ProductCatalog};
use crate::resource::{Resource, ResourceLedger};
use crate::rng::SimRng;
use crate::sim::StateHash;
use crate::workforce::{Worker, WorkforceModel};

/// Running counters for the whole campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub orders_completed: u32,
    /// Orders that expired before the player accepted them.
    pub orders_late: u32,
    /// Accepted orders that were not fulfilled in time.
    pub orders_failed: u32,
    pub orders_rejected: u32,
    pub machines_bought: u32,
    pub machines_repaired: u32,
    pub workers_hired: u32,
    pub workers_motivated: u32,
    pub workers_trained: u32,
    pub loans_taken: u32,
    pub loans_repaid: u32,
    pub units_started: u32,
    pub units_produced: u32,
    pub units_defective: u32,
    pub units_discarded: u32,
    pub units_sold: u32,
    /// Units delivered against orders.
    pub units_shipped: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    pub(crate) day: Day,
    pub(crate) started: bool,
    pub(crate) bankrupt: bool,
    pub(crate) game_pace: Fixed64,
    pub(crate) resources: ResourceLedger,
    pub(crate) catalog: ProductCatalog,
    pub(crate) inventory: Inventory,
    pub(crate) pipeline: ProductionPipeline,
    pub(crate) workforce: WorkforceModel,
    pub(crate) orders: OrderBook,
    pub(crate) finance: FinanceLedger,
    pub(crate) stats: Stats,
    pub(crate) rng: SimRng,
}

impl EngineState {
    /// Fresh state from a validated config. No machines, workers or orders
    /// yet; the engine seeds those.
    pub(crate) fn from_config(config: &EngineConfig) -> Self {
        Self {
            day: config.starting_day,
            started: false,
            bankrupt: false,
            game_pace: config.game_pace,
            resources: ResourceLedger::from_defs(&config.resources),
            catalog: ProductCatalog::from_defs(&config.products),
            inventory: Inventory::default(),
            pipeline: ProductionPipeline::new(),
            workforce: WorkforceModel::new(config.starting_morale),
            orders: OrderBook::new(),
            finance: FinanceLedger::new(config.starting_cash),
            stats: Stats::default(),
            rng: SimRng::new(config.seed),
        }
    }

    // -----------------------------------------------------------------------
    // Query API (read-only)
    // -----------------------------------------------------------------------

    pub fn day(&self) -> Day {
        self.day
    }

    pub fn cash(&self) -> Money {
        self.finance.cash()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_bankrupt(&self) -> bool {
        self.bankrupt
    }

    pub fn game_pace(&self) -> Fixed64 {
        self.game_pace
    }

    pub fn morale(&self) -> Fixed64 {
        self.workforce.morale()
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn resources(&self) -> &ResourceLedger {
        &self.resources
    }

    pub fn resource_list(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.catalog.iter()
    }

    pub fn unlocked_products(&self) -> impl Iterator<Item = &Product> {
        self.catalog.unlocked()
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn pipeline(&self) -> &ProductionPipeline {
        &self.pipeline
    }

    pub fn machines(&self) -> impl Iterator<Item = (MachineId, &Machine)> {
        self.pipeline.iter()
    }

    pub fn machine(&self, id: MachineId) -> Option<&Machine> {
        self.pipeline.get(id)
    }

    pub fn workforce(&self) -> &WorkforceModel {
        &self.workforce
    }

    pub fn workers(&self) -> impl Iterator<Item = (WorkerId, &Worker)> {
        self.workforce.hired()
    }

    pub fn candidates(&self) -> impl Iterator<Item = (WorkerId, &Worker)> {
        self.workforce.candidates()
    }

    pub fn worker(&self, id: WorkerId) -> Option<&Worker> {
        self.workforce.get(id)
    }

    pub fn orders(&self) -> &OrderBook {
        &self.orders
    }

    pub fn available_orders(&self) -> impl Iterator<Item = (OrderId, &Order)> {
        self.orders.available()
    }

    pub fn active_orders(&self) -> impl Iterator<Item = (OrderId, &Order)> {
        self.orders.active()
    }

    pub fn archived_orders(&self) -> impl Iterator<Item = (OrderId, &Order)> {
        self.orders.archived()
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(id)
    }

    pub fn finance(&self) -> &FinanceLedger {
        &self.finance
    }

    pub fn loans(&self) -> impl Iterator<Item = (LoanId, &Loan)> {
        self.finance.loans()
    }

    /// Seed-derived RNG position. Two states with equal RNG state will make
    /// the same random draws.
    pub fn rng_state(&self) -> u64 {
        self.rng.state()
    }

    // -----------------------------------------------------------------------
    // State hash
    // -----------------------------------------------------------------------

    /// Deterministic hash of everything a tick can change.
    ///
    /// Entities are visited in slot-map iteration order, which is stable for
    /// a given history of inserts and removals.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();

        h.write_u32(self.day);
        h.write_bool(self.started);
        h.write_bool(self.bankrupt);
        h.write_fixed64(self.game_pace);
        h.write_u64(self.rng.state());

        h.write_fixed64(self.finance.cash());
        h.write_fixed64(self.finance.total_earned());
        h.write_fixed64(self.finance.total_spent());
        for (id, loan) in self.finance.loans() {
            write_key(&mut h, id);
            h.write_fixed64(loan.total_paid);
            h.write_u32(loan.remaining_days);
        }

        for resource in self.resources.iter() {
            h.write_u32(resource.quantity());
        }
        for product in self.catalog.iter() {
            h.write_fixed64(product.price);
            h.write_bool(product.unlocked);
        }
        for (_, count) in self.inventory.iter() {
            h.write_u32(count);
        }

        for (id, machine) in self.pipeline.iter() {
            write_key(&mut h, id);
            hash_machine(&mut h, machine);
        }

        h.write_fixed64(self.workforce.morale());
        for (id, worker) in self.workforce.iter() {
            write_key(&mut h, id);
            h.write_u32(worker.skill_level);
            h.write_fixed64(worker.motivation);
            h.write_u32(worker.status as u32);
            h.write_bool(worker.is_hired());
            match worker.machine {
                Some(machine) => write_key(&mut h, machine),
                None => h.write_u64(0),
            }
        }

        for (id, order) in self
            .orders
            .available()
            .chain(self.orders.active())
            .chain(self.orders.archived())
        {
            write_key(&mut h, id);
            h.write_u32(order.fulfilled);
            h.write_u32(order.deadline);
            h.write_u32(order.status as u32);
            h.write_fixed64(order.reward);
            match order.complaint {
                Some(complaint) => {
                    h.write_bool(true);
                    h.write_u32(complaint.opened_day);
                    h.write_u32(complaint.expires_day);
                }
                None => h.write_bool(false),
            }
        }

        hash_stats(&mut h, &self.stats);
        h.finish()
    }
}

fn write_key<K: Key>(h: &mut StateHash, key: K) {
    h.write_u64(key.data().as_ffi());
}

fn hash_machine(h: &mut StateHash, machine: &Machine) {
    h.write_u32(machine.level);
    h.write_fixed64(machine.rated_efficiency);
    h.write_fixed64(machine.efficiency);
    h.write_fixed64(machine.speed);
    h.write_u32(machine.booster_until.unwrap_or(0));
    h.write_u32(machine.cycles);
    h.write_u32(machine.assigned_workers.len() as u32);
    for &worker in &machine.assigned_workers {
        write_key(h, worker);
    }
    match machine.state {
        MachineState::Idle => h.write_u32(0),
        MachineState::Working(job) => {
            h.write_u32(1);
            h.write_u32(job.product.index() as u32);
            h.write_fixed64(job.progress);
        }
        MachineState::Stalled { job, reason } => {
            h.write_u32(match reason {
                StallReason::Defect => 2,
                StallReason::AwaitingHandoff => 3,
            });
            h.write_u32(job.product.index() as u32);
        }
        MachineState::Maintenance { job, until_day } => {
            h.write_u32(4);
            h.write_u32(until_day);
            h.write_bool(job.is_some());
        }
    }
}

fn hash_stats(h: &mut StateHash, stats: &Stats) {
    for count in [
        stats.orders_completed,
        stats.orders_late,
        stats.orders_failed,
        stats.orders_rejected,
        stats.machines_bought,
        stats.machines_repaired,
        stats.workers_hired,
        stats.workers_motivated,
        stats.workers_trained,
        stats.loans_taken,
        stats.loans_repaid,
        stats.units_started,
        stats.units_produced,
        stats.units_defective,
        stats.units_discarded,
        stats.units_sold,
        stats.units_shipped,
    ] {
        h.write_u32(count);
    }
}
