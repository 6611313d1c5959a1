//! Headless campaign integration tests.
//!
//! Drives full campaigns with a simple scripted player and checks the core
//! ledger against the reporting stats fed from engine listeners, plus
//! replay and snapshot determinism over long runs.

use std::cell::RefCell;
use std::rc::Rc;

use shopfloor_core::command::Command;
use shopfloor_core::engine::{CommandOutcome, Engine};
use shopfloor_core::error::CommandError;
use shopfloor_core::event::Expense;
use shopfloor_core::fixed::Money;
use shopfloor_core::id::*;
use shopfloor_core::order::OrderStatus;
use shopfloor_core::replay::{ReplayLog, replay, replay_and_verify};
use shopfloor_core::test_utils::*;
use shopfloor_stats::{CostCategory, FactoryStats, StatsConfig};

// ===========================================================================
// Scripted player
// ===========================================================================

/// Keep at least two units' worth of materials in stock.
fn restock(engine: &mut Engine, product: ProductKind) {
    let requires = match engine.snapshot().catalog().get(product) {
        Some(p) => p.requires.clone(),
        None => return,
    };
    for (kind, amount) in requires {
        let have = engine.snapshot().resources().quantity(kind);
        if have < amount * 2 {
            let _ = engine.apply(Command::BuyResource {
                kind,
                amount: amount * 4,
            });
        }
    }
}

/// One day of play: clear defects, restart idle assembly machines, take
/// every offered order, sell surplus stock, then tick.
fn play_day(engine: &mut Engine) -> Result<CommandOutcome, CommandError> {
    let machines: Vec<_> = engine
        .snapshot()
        .machines()
        .map(|(id, m)| (id, m.stage, m.is_idle(), m.has_defect()))
        .collect();
    for (id, stage, idle, defect) in machines {
        if defect {
            if engine.apply(Command::FixDefect { machine: id }).is_err() {
                let _ = engine.apply(Command::DiscardDefect { machine: id });
            }
        }
        if idle && stage == Stage::Assembly {
            restock(engine, ProductKind::Phone);
            let _ = engine.apply(Command::AssignMachine {
                machine: id,
                product: ProductKind::Phone,
            });
        }
    }

    let offers: Vec<OrderId> = engine
        .snapshot()
        .available_orders()
        .map(|(id, _)| id)
        .collect();
    for order in offers {
        let _ = engine.apply(Command::AcceptOrder { order });
    }

    let committed: u32 = engine
        .snapshot()
        .active_orders()
        .filter(|(_, o)| o.product == ProductKind::Phone)
        .map(|(_, o)| o.quantity - o.fulfilled)
        .sum();
    let stock = engine.snapshot().inventory().count(ProductKind::Phone);
    if stock > committed + 2 {
        let _ = engine.apply(Command::SellProduct {
            product: ProductKind::Phone,
            amount: stock - committed - 2,
        });
    }

    engine.apply(Command::Tick)
}

/// Feed every tracked event kind into a shared stats aggregator.
fn attach_stats(engine: &mut Engine, config: StatsConfig) -> Rc<RefCell<FactoryStats>> {
    let stats = Rc::new(RefCell::new(FactoryStats::new(config)));
    for kind in FactoryStats::TRACKED_KINDS {
        let stats = Rc::clone(&stats);
        engine.on_passive(
            kind,
            Box::new(move |event| stats.borrow_mut().process_event(event)),
        );
    }
    stats
}

fn campaign(seed: u64) -> Engine {
    let mut config = brisk_config();
    config.seed = seed;
    engine_with(config)
}

// ===========================================================================
// Stats against the ledger
// ===========================================================================

#[test]
fn stats_totals_match_ledger() {
    let mut engine = campaign(7);
    let stats = attach_stats(&mut engine, StatsConfig::default());
    let start = engine.snapshot().cash();

    // A staffed assembly line from day one.
    let assembly = first_machine(&engine, Stage::Assembly);
    let worker = hire_worker(&mut engine, Stage::Assembly, 2);
    engine
        .apply(Command::AssignWorker {
            worker,
            machine: assembly,
        })
        .unwrap();
    engine.apply(Command::StartSimulation).unwrap();

    for _ in 0..60 {
        play_day(&mut engine).unwrap();
    }

    let state = engine.snapshot();
    let finance = state.finance();
    let stats = stats.borrow();

    assert_eq!(stats.total_revenue(), finance.total_earned());
    assert_eq!(stats.total_expenses(), finance.total_spent());
    assert_eq!(
        start + stats.total_revenue() - stats.total_expenses() + stats.total_borrowed(),
        state.cash()
    );
    assert_eq!(stats.cash_history().len(), 60);
    assert_eq!(stats.cash_history().last().copied(), Some(state.cash()));

    // Payroll for the hired worker shows up every day.
    assert!(stats.spent_on(CostCategory::Payroll) > Money::ZERO);
    assert!(stats.spent_on(CostCategory::Purchase(Expense::Hiring)) > Money::ZERO);

    // Every unit entering inventory is counted once.
    let produced: u32 = stats
        .output_history(ProductKind::Phone)
        .iter()
        .map(|v| v.to_num::<u32>())
        .sum();
    assert_eq!(produced, state.stats().units_produced);
    assert!(produced > 0, "a staffed line should finish phones in 60 days");
}

#[test]
fn order_outcomes_match_archive() {
    let mut engine = campaign(11);
    let stats = attach_stats(
        &mut engine,
        StatsConfig {
            window_days: 365,
            history_capacity: 365,
        },
    );
    engine.apply(Command::StartSimulation).unwrap();
    for _ in 0..120 {
        play_day(&mut engine).unwrap();
    }

    let state = engine.snapshot();
    let stats = stats.borrow();
    let completed = state
        .archived_orders()
        .filter(|(_, o)| o.status == OrderStatus::Completed)
        .count();
    let failed = state
        .archived_orders()
        .filter(|(_, o)| o.status == OrderStatus::Failed)
        .count();

    assert_eq!(stats.orders_completed().to_num::<usize>(), completed);
    // Offers that lapse unaccepted are archived as failed too.
    assert_eq!(
        (stats.orders_failed() + stats.orders_expired()).to_num::<usize>(),
        failed
    );
    assert_eq!(
        stats.orders_completed().to_num::<u32>(),
        state.stats().orders_completed
    );
}

#[test]
fn defects_are_reported_per_machine() {
    let mut config = test_config();
    config.pipeline.base_defect_chance = fixed(1.0);
    config.pipeline.min_defect_chance = fixed(1.0);
    let mut engine = engine_with(config);
    let stats = attach_stats(&mut engine, StatsConfig::default());
    let assembly = first_machine(&engine, Stage::Assembly);
    engine.apply(Command::StartSimulation).unwrap();

    for _ in 0..20 {
        play_day(&mut engine).unwrap();
    }

    let stats = stats.borrow();
    assert!(stats.machine_defect_rate(assembly) > fixed(0.0));
    assert!(stats.defect_rate() > fixed(0.0));
    assert!(stats.spent_on(CostCategory::Purchase(Expense::Rework)) > Money::ZERO);
}

// ===========================================================================
// Determinism
// ===========================================================================

#[test]
fn recorded_campaign_replays_exactly() {
    let mut engine = campaign(2024);
    let mut log = ReplayLog::new(&engine).unwrap();

    log.apply(&mut engine, Command::StartSimulation).unwrap();
    let assembly = first_machine(&engine, Stage::Assembly);
    for day in 0..90u32 {
        if engine.snapshot().machine(assembly).is_some_and(|m| m.is_idle()) {
            let _ = log.apply(
                &mut engine,
                Command::BuyResource {
                    kind: ResourceKind::Electronics,
                    amount: 5,
                },
            );
            let _ = log.apply(
                &mut engine,
                Command::AssignMachine {
                    machine: assembly,
                    product: ProductKind::Tablet,
                },
            );
        }
        if day % 10 == 0 {
            // Rejected once the first loan is open; replay must reject it too.
            let _ = log.apply(
                &mut engine,
                Command::TakeLoan {
                    amount: money(5000),
                    days: 20,
                    rate: fixed(0.05),
                },
            );
        }
        log.apply(&mut engine, Command::Tick).unwrap();
    }

    let bytes = log.serialize().unwrap();
    let restored = ReplayLog::deserialize(&bytes).unwrap();
    let result = replay_and_verify(&restored).unwrap();
    assert!(result.is_verified, "mismatch: {:?}", result.first_mismatch);
    assert_eq!(result.commands_executed, log.command_count());

    let replayed = replay(&restored).unwrap();
    assert_eq!(replayed.state_hash(), engine.state_hash());
    assert_eq!(replayed.subsystem_hashes(), engine.subsystem_hashes());
}

#[test]
fn snapshot_mid_campaign_continues_identically() {
    let mut engine = campaign(99);
    engine.apply(Command::StartSimulation).unwrap();
    for _ in 0..30 {
        play_day(&mut engine).unwrap();
    }

    let mut restored = Engine::deserialize(&engine.serialize().unwrap()).unwrap();
    for _ in 0..30 {
        let a = play_day(&mut engine);
        let b = play_day(&mut restored);
        assert_eq!(a.is_ok(), b.is_ok());
        assert_eq!(engine.state_hash(), restored.state_hash());
    }
}

#[test]
fn real_time_driving_matches_ticks() {
    let mut ticked = campaign(5);
    let mut timed = campaign(5);
    ticked.apply(Command::StartSimulation).unwrap();
    timed.apply(Command::StartSimulation).unwrap();

    let day_ms = timed.config().day_length_ms;
    tick_n(&mut ticked, 12);

    let result = timed.advance(day_ms * 12 - 1);
    assert_eq!(result.ticks.len(), 11);
    assert_eq!(timed.pending_ms(), day_ms - 1);
    assert_eq!(timed.advance(1).ticks.len(), 1);
    assert_eq!(timed.pending_ms(), 0);

    assert_eq!(timed.snapshot().day(), ticked.snapshot().day());
    assert_eq!(timed.state_hash(), ticked.state_hash());
}
