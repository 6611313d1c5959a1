//! First week example: a stock campaign with event listeners.
//!
//! Buys materials, starts a phone on the assembly line, hires the best
//! candidate and runs seven days, printing what the engine reports.
//!
//! Run with: `cargo run -p shopfloor-core --example first_week`

use std::cell::RefCell;
use std::rc::Rc;

use shopfloor_core::command::Command;
use shopfloor_core::config::EngineConfig;
use shopfloor_core::engine::{CommandOutcome, Engine};
use shopfloor_core::event::{Event, EventKind};
use shopfloor_core::fixed::Fixed64;
use shopfloor_core::id::*;

fn main() {
    // Stock rules at campaign pacing: a phone spends three days per line.
    let mut config = EngineConfig::default();
    config.pipeline.progress_per_day = Fixed64::from_num(100);
    let mut engine = Engine::new(config).unwrap();

    // --- Listen for production and money events ---

    let log: Rc<RefCell<Vec<Event>>> = Rc::new(RefCell::new(Vec::new()));
    for kind in [
        EventKind::UnitHandedOff,
        EventKind::UnitProduced,
        EventKind::UnitDefective,
        EventKind::OrderCompleted,
        EventKind::OrderFailed,
        EventKind::PayrollPaid,
    ] {
        let log = Rc::clone(&log);
        engine.on_passive(kind, Box::new(move |e| log.borrow_mut().push(e.clone())));
    }

    // --- Set up the line ---

    let assembly = engine
        .snapshot()
        .machines()
        .find(|(_, m)| m.stage == Stage::Assembly)
        .map(|(id, _)| id)
        .unwrap();

    engine
        .apply(Command::BuyResource {
            kind: ResourceKind::Electronics,
            amount: 20,
        })
        .unwrap();
    engine
        .apply(Command::AssignMachine {
            machine: assembly,
            product: ProductKind::Phone,
        })
        .unwrap();

    let best = engine
        .snapshot()
        .candidates()
        .max_by_key(|(_, w)| w.skill_level)
        .map(|(id, _)| id);
    if let Some(worker) = best {
        engine.apply(Command::HireWorker { worker }).unwrap();
        engine
            .apply(Command::AssignWorker {
                worker,
                machine: assembly,
            })
            .unwrap();
    }

    let offers: Vec<OrderId> = engine
        .snapshot()
        .available_orders()
        .map(|(id, _)| id)
        .collect();
    for order in offers {
        match engine.apply(Command::AcceptOrder { order }) {
            Ok(_) => println!("accepted {order:?}"),
            Err(err) => println!("could not accept {order:?}: {err}"),
        }
    }

    // --- Run a week ---

    engine.apply(Command::StartSimulation).unwrap();
    for _ in 0..7 {
        let Ok(CommandOutcome::Ticked(summary)) = engine.apply(Command::Tick) else {
            break;
        };
        println!(
            "day {:>2}: produced {}, defective {}, payroll {}, cash {}",
            summary.day,
            summary.units_produced,
            summary.units_defective,
            summary.payroll,
            engine.snapshot().cash()
        );
        for event in log.borrow_mut().drain(..) {
            println!("    {event:?}");
        }
    }

    let state = engine.snapshot();
    println!("\n--- After one week ---");
    for resource in state.resource_list() {
        println!(
            "  {:<12} {:>4}/{}",
            resource.name,
            resource.quantity(),
            resource.capacity()
        );
    }
    for kind in ProductKind::ALL {
        println!("  {:<12} {:>4} in stock", format!("{kind:?}"), state.inventory().count(kind));
    }
    println!("  morale {}", state.morale());
}
