//! Shopfloor Core -- the simulation engine for a factory-management game.
//!
//! This crate owns the whole economic model of a small electronics factory:
//! raw materials, a three-stage production line, a workforce, customer
//! orders and a cash ledger with loans. Everything advances in discrete
//! daily ticks, driven by [`command::Command`]s, with deterministic
//! fixed-point arithmetic and a seeded RNG so runs are reproducible.
//!
//! # Six-Phase Tick
//!
//! Each [`command::Command::Tick`] advances the simulation by one day:
//!
//! 1. **Workforce** -- Motivation decays, statuses and morale update.
//! 2. **Production** -- Machines advance their jobs, roll defects and hand
//!    units downstream. Finished units enter inventory.
//! 3. **Orders** -- Active orders are filled from inventory, paid or failed.
//! 4. **Finance** -- Payroll and loan installments are charged.
//! 5. **Spawns** -- New order offers and job candidates may appear.
//! 6. **Bookkeeping** -- Day counter, maintenance, bankruptcy check, hash.
//!
//! Events raised while a command runs are delivered to listeners when the
//! command returns.
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Owns the state and applies commands.
//! - [`state::EngineState`] -- Read-only view of the simulation.
//! - [`config::EngineConfig`] -- Balance constants and starting scenario.
//! - [`pipeline::ProductionPipeline`] -- The machine fleet and stage handoff.
//! - [`workforce::WorkforceModel`] -- Candidates, hired workers and morale.
//! - [`order::OrderBook`] -- Offered, active and archived customer orders.
//! - [`finance::FinanceLedger`] -- Cash, totals and loans.
//! - [`event::EventBus`] -- Subscription-based event bus with buffered delivery.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`serialize`] -- Versioned snapshots via bitcode.
//! - [`replay`] -- Command logs that replay to the same state hash.

pub mod command;
pub mod config;
#[cfg(feature = "data-loader")]
pub mod data_loader;
pub mod engine;
pub mod error;
pub mod event;
pub mod finance;
pub mod fixed;
pub mod id;
pub mod machine;
pub mod order;
pub mod pipeline;
pub mod product;
pub mod replay;
pub mod resource;
pub mod rng;
pub mod serialize;
pub mod sim;
pub mod state;
pub mod workforce;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
