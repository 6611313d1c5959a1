//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature). They reach into crate-private state to set up
//! situations that would otherwise take many ticks of random play.

use crate::command::Command;
use crate::config::EngineConfig;
use crate::engine::{CommandOutcome, Engine};
use crate::fixed::{from_units, Day, Fixed64, Money};
use crate::id::{MachineId, OrderId, ProductKind, Stage, WorkerId};
use crate::machine::{Job, MachineState};
use crate::order::{Order, OrderStatus};
use crate::pipeline::ProductionPipeline;
use crate::workforce::{Worker, WorkerStatus};

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

pub fn money(v: i32) -> Money {
    Money::from_num(v)
}

// ===========================================================================
// Engine builders
// ===========================================================================

/// The stock config at 100 progress a day, so a product's `production_time`
/// is the number of ticks it spends on an assembly line.
pub fn brisk_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.pipeline.progress_per_day = Fixed64::from_num(100);
    config
}

/// [`brisk_config`] with every random spawn switched off: no initial orders
/// or candidates and zero spawn chances. Defect rolls still happen.
pub fn test_config() -> EngineConfig {
    let mut config = brisk_config();
    config.seed = 42;
    config.orders.initial_orders = 0;
    config.orders.spawn_chance = Fixed64::ZERO;
    config.workforce.initial_candidates = 0;
    config.workforce.candidate_spawn_chance = Fixed64::ZERO;
    config
}

/// [`test_config`] with defects disabled too, for exact production timing.
pub fn flawless_config() -> EngineConfig {
    let mut config = test_config();
    config.pipeline.base_defect_chance = Fixed64::ZERO;
    config.pipeline.min_defect_chance = Fixed64::ZERO;
    config
}

pub fn quiet_engine() -> Engine {
    engine_with(test_config())
}

/// A quiet engine that has already received `StartSimulation`.
pub fn started_engine() -> Engine {
    start(quiet_engine())
}

/// A started engine that never rolls defects.
pub fn flawless_engine() -> Engine {
    start(engine_with(flawless_config()))
}

pub fn engine_with(config: EngineConfig) -> Engine {
    match Engine::new(config) {
        Ok(engine) => engine,
        Err(err) => panic!("test config rejected: {err}"),
    }
}

fn start(mut engine: Engine) -> Engine {
    if let Err(err) = engine.apply(Command::StartSimulation) {
        panic!("could not start: {err}");
    }
    engine
}

// ===========================================================================
// Ticking
// ===========================================================================

/// Apply `n` ticks, panicking on the first rejection.
pub fn tick_n(engine: &mut Engine, n: u32) {
    for _ in 0..n {
        match engine.apply(Command::Tick) {
            Ok(CommandOutcome::Ticked(_)) => {}
            other => panic!("tick failed: {other:?}"),
        }
    }
}

// ===========================================================================
// Machines
// ===========================================================================

/// The first machine of `stage` in fleet order.
pub fn first_machine(engine: &Engine, stage: Stage) -> MachineId {
    machines_in(engine, stage)
        .first()
        .copied()
        .unwrap_or_else(|| panic!("no {stage:?} machine"))
}

pub fn machines_in(engine: &Engine, stage: Stage) -> Vec<MachineId> {
    engine
        .snapshot()
        .machines()
        .filter(|(_, m)| m.stage == stage)
        .map(|(id, _)| id)
        .collect()
}

/// Install a machine without paying for it.
pub fn install_machine(engine: &mut Engine, stage: Stage) -> MachineId {
    engine
        .state
        .pipeline
        .install(crate::machine::MachineSpec::new(stage))
}

/// Overwrite a machine's state.
pub fn force_machine_state(engine: &mut Engine, id: MachineId, state: MachineState) {
    let Some(machine) = engine.state.pipeline.get_mut(id) else {
        panic!("machine {id:?} not found");
    };
    machine.state = state;
}

/// Put `product` on a machine with progress `remaining` short of its target.
pub fn force_job(engine: &mut Engine, id: MachineId, product: ProductKind, remaining: Fixed64) {
    let stage = match engine.snapshot().machine(id) {
        Some(machine) => machine.stage,
        None => panic!("machine {id:?} not found"),
    };
    let production_time = engine
        .snapshot()
        .catalog()
        .get(product)
        .map_or(1, |p| p.production_time);
    let target =
        ProductionPipeline::target_for(production_time, stage, &engine.config().pipeline);
    let job = Job {
        product,
        progress: (target - remaining).max(Fixed64::ZERO),
        target,
    };
    force_machine_state(engine, id, MachineState::Working(job));
}

// ===========================================================================
// Inventory and orders
// ===========================================================================

pub fn add_inventory(engine: &mut Engine, product: ProductKind, units: u32) {
    engine.state.inventory.add(product, units);
}

/// List a pending order with a fixed reward of `price × quantity`.
pub fn add_order(engine: &mut Engine, product: ProductKind, quantity: u32, deadline: Day) -> OrderId {
    let price = engine
        .snapshot()
        .catalog()
        .get(product)
        .map_or(Money::ZERO, |p| p.price);
    let today = engine.snapshot().day();
    engine.state.orders.insert_available(Order {
        product,
        quantity,
        fulfilled: 0,
        deadline,
        status: OrderStatus::Pending,
        reward: price * from_units(quantity),
        created_day: today,
        accepted_day: None,
        complaint: None,
    })
}

/// [`add_order`] then accept it.
pub fn add_active_order(
    engine: &mut Engine,
    product: ProductKind,
    quantity: u32,
    deadline: Day,
) -> OrderId {
    let id = add_order(engine, product, quantity, deadline);
    if let Err(err) = engine.apply(Command::AcceptOrder { order: id }) {
        panic!("accept failed: {err}");
    }
    id
}

// ===========================================================================
// Workers
// ===========================================================================

/// Add a candidate with a known skill, full motivation and the stock salary.
pub fn spawn_worker(engine: &mut Engine, skill: Stage, skill_level: u32) -> WorkerId {
    let config = &engine.config().workforce;
    let salary = config.base_salary + config.salary_per_skill_level * from_units(skill_level);
    engine.state.workforce.insert_candidate(Worker {
        name: format!("Test {skill:?} {skill_level}"),
        skill,
        skill_level,
        motivation: Fixed64::from_num(100),
        salary,
        status: WorkerStatus::Working,
        hire_day: None,
        machine: None,
    })
}

/// [`spawn_worker`] then hire through the normal command.
pub fn hire_worker(engine: &mut Engine, skill: Stage, skill_level: u32) -> WorkerId {
    let id = spawn_worker(engine, skill, skill_level);
    if let Err(err) = engine.apply(Command::HireWorker { worker: id }) {
        panic!("hire failed: {err}");
    }
    id
}
