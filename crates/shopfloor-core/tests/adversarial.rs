//! Adversarial input tests for the shopfloor engine.
//!
//! Unknown ids, zero or extreme amounts and commands issued in the wrong
//! state must come back as errors, never as panics, and must leave the state
//! hash unchanged.

use shopfloor_core::command::Command;
use shopfloor_core::error::{CommandError, ErrorClass};
use shopfloor_core::fixed::{Fixed64, Money};
use shopfloor_core::id::*;
use shopfloor_core::machine::MachineState;
use shopfloor_core::test_utils::*;

/// Apply `command` and assert it was rejected without touching state.
fn assert_rejected(engine: &mut shopfloor_core::engine::Engine, command: Command) -> CommandError {
    let before = engine.state_hash();
    let name = command.name();
    match engine.apply(command) {
        Ok(outcome) => panic!("{name} unexpectedly accepted: {outcome:?}"),
        Err(err) => {
            assert_eq!(engine.state_hash(), before, "{name} changed state");
            err
        }
    }
}

/// Null keys never resolve to an entity.
#[test]
fn unknown_ids_are_not_found() {
    let mut engine = quiet_engine();
    let machine = MachineId::default();
    let worker = WorkerId::default();
    let order = OrderId::default();

    let commands = vec![
        Command::AssignMachine {
            machine,
            product: ProductKind::Phone,
        },
        Command::UnassignMachine { machine },
        Command::UpgradeMachine { machine },
        Command::RepairMachine { machine },
        Command::FixDefect { machine },
        Command::DiscardDefect { machine },
        Command::ApplyBooster { machine, days: 2 },
        Command::AcceptOrder { order },
        Command::RejectOrder { order },
        Command::ShipOrder { order },
        Command::NegotiateDeadline { order },
        Command::CancelOrder { order },
        Command::HireWorker { worker },
        Command::UnassignWorker { worker },
        Command::MotivateWorker { worker, amount: 1 },
        Command::TrainWorker { worker },
    ];
    for command in commands {
        let err = assert_rejected(&mut engine, command);
        assert_eq!(err.class(), ErrorClass::NotFound, "{err}");
    }
}

#[test]
fn assigning_worker_to_unknown_machine() {
    let mut engine = quiet_engine();
    let worker = hire_worker(&mut engine, Stage::Assembly, 1);
    let err = assert_rejected(
        &mut engine,
        Command::AssignWorker {
            worker,
            machine: MachineId::default(),
        },
    );
    assert_eq!(err, CommandError::MachineNotFound(MachineId::default()));
}

/// Zero, negative and nonsensical amounts are malformed.
#[test]
fn zero_and_negative_amounts_are_malformed() {
    let mut engine = quiet_engine();
    let assembly = first_machine(&engine, Stage::Assembly);
    let worker = hire_worker(&mut engine, Stage::Assembly, 1);

    let commands = vec![
        Command::BuyResource {
            kind: ResourceKind::Glass,
            amount: 0,
        },
        Command::SellProduct {
            product: ProductKind::Phone,
            amount: 0,
        },
        Command::ApplyBooster {
            machine: assembly,
            days: 0,
        },
        Command::MotivateWorker { worker, amount: 0 },
        Command::TakeLoan {
            amount: Money::ZERO,
            days: 30,
            rate: fixed(0.1),
        },
        Command::TakeLoan {
            amount: money(-100),
            days: 30,
            rate: fixed(0.1),
        },
        Command::TakeLoan {
            amount: money(1000),
            days: 0,
            rate: fixed(0.1),
        },
        Command::TakeLoan {
            amount: money(1000),
            days: 30,
            rate: fixed(-0.1),
        },
        Command::AdjustGamePace {
            pace: Fixed64::ZERO,
        },
    ];
    for command in commands {
        let err = assert_rejected(&mut engine, command);
        assert_eq!(err.class(), ErrorClass::Malformed, "{err}");
    }
}

#[test]
fn extreme_amounts_do_not_overflow() {
    let mut engine = quiet_engine();
    let err = assert_rejected(
        &mut engine,
        Command::BuyResource {
            kind: ResourceKind::Metal,
            amount: u32::MAX,
        },
    );
    assert_eq!(err.class(), ErrorClass::Validation);

    let err = assert_rejected(
        &mut engine,
        Command::TakeLoan {
            amount: Money::MAX,
            days: u32::MAX,
            rate: Fixed64::MAX,
        },
    );
    assert_eq!(err, CommandError::Malformed("loan terms overflow"));

    let err = assert_rejected(
        &mut engine,
        Command::SellProduct {
            product: ProductKind::Laptop,
            amount: u32::MAX,
        },
    );
    assert!(matches!(err, CommandError::InsufficientInventory { .. }));
}

#[test]
fn wrong_stage_and_wrong_state() {
    let mut engine = quiet_engine();
    let assembly = first_machine(&engine, Stage::Assembly);
    let packaging = first_machine(&engine, Stage::Packaging);

    let err = assert_rejected(
        &mut engine,
        Command::AssignMachine {
            machine: packaging,
            product: ProductKind::Phone,
        },
    );
    assert_eq!(
        err,
        CommandError::WrongStage {
            expected: Stage::Assembly,
            actual: Stage::Packaging,
        }
    );

    assert_eq!(
        assert_rejected(&mut engine, Command::UnassignMachine { machine: assembly }),
        CommandError::MachineIdle
    );
    assert_eq!(
        assert_rejected(&mut engine, Command::FixDefect { machine: assembly }),
        CommandError::NoDefect
    );
    assert_eq!(
        assert_rejected(&mut engine, Command::DiscardDefect { machine: assembly }),
        CommandError::NoDefect
    );

    force_machine_state(
        &mut engine,
        assembly,
        MachineState::Maintenance {
            job: None,
            until_day: 9,
        },
    );
    assert_eq!(
        assert_rejected(
            &mut engine,
            Command::AssignMachine {
                machine: assembly,
                product: ProductKind::Phone,
            }
        ),
        CommandError::UnderMaintenance
    );
    assert_eq!(
        assert_rejected(&mut engine, Command::RepairMachine { machine: assembly }),
        CommandError::UnderMaintenance
    );
}

#[test]
fn worker_commands_need_a_hired_worker() {
    let mut engine = quiet_engine();
    let candidate = spawn_worker(&mut engine, Stage::Packaging, 2);
    let packaging = first_machine(&engine, Stage::Packaging);

    for command in [
        Command::AssignWorker {
            worker: candidate,
            machine: packaging,
        },
        Command::UnassignWorker { worker: candidate },
        Command::MotivateWorker {
            worker: candidate,
            amount: 1,
        },
        Command::TrainWorker { worker: candidate },
    ] {
        assert_eq!(
            assert_rejected(&mut engine, command),
            CommandError::WorkerNotHired
        );
    }

    engine
        .apply(Command::HireWorker { worker: candidate })
        .unwrap();
    assert_eq!(
        assert_rejected(&mut engine, Command::HireWorker { worker: candidate }),
        CommandError::WorkerAlreadyHired
    );
    assert_eq!(
        assert_rejected(&mut engine, Command::UnassignWorker { worker: candidate }),
        CommandError::NotAssigned
    );
    // Fresh test workers start at full motivation.
    assert_eq!(
        assert_rejected(
            &mut engine,
            Command::MotivateWorker {
                worker: candidate,
                amount: 3,
            }
        ),
        CommandError::MotivationMaxed
    );
}

#[test]
fn price_outside_markup_band_is_rejected() {
    let mut engine = quiet_engine();
    // Phone materials cost 2×10 + 3×5 + 5×20 + 1×15 = 150.
    for price in [money(149), money(601)] {
        let err = assert_rejected(
            &mut engine,
            Command::SetProductPrice {
                product: ProductKind::Phone,
                price,
            },
        );
        assert_eq!(
            err,
            CommandError::PriceOutOfRange {
                price,
                min: money(150),
                max: money(600),
            }
        );
    }
    engine
        .apply(Command::SetProductPrice {
            product: ProductKind::Phone,
            price: money(600),
        })
        .unwrap();
}

#[test]
fn order_commands_respect_lifecycle() {
    let mut engine = quiet_engine();
    let order = add_order(&mut engine, ProductKind::Phone, 1, 10);
    assert_eq!(
        assert_rejected(&mut engine, Command::ShipOrder { order }),
        CommandError::OrderNotOpen
    );
    assert_eq!(
        assert_rejected(&mut engine, Command::CancelOrder { order }),
        CommandError::OrderNotOpen
    );
    engine.apply(Command::AcceptOrder { order }).unwrap();
    assert_eq!(
        assert_rejected(&mut engine, Command::AcceptOrder { order }),
        CommandError::OrderNotOpen
    );
    assert_eq!(
        assert_rejected(&mut engine, Command::RejectOrder { order }),
        CommandError::OrderNotOpen
    );
    assert_eq!(
        assert_rejected(&mut engine, Command::CancelOrder { order }),
        CommandError::NoComplaint
    );
}

#[test]
fn accepting_a_late_order_is_refused() {
    let mut engine = started_engine();
    let order = add_order(&mut engine, ProductKind::Tablet, 1, 1);
    // The deadline passes on day 2 but the order only expires during the
    // next tick's order phase.
    tick_n(&mut engine, 1);
    let err = assert_rejected(&mut engine, Command::AcceptOrder { order });
    assert_eq!(err, CommandError::DeadlineExpired { deadline: 1, day: 2 });
}

#[test]
fn clock_commands_in_wrong_state() {
    let mut engine = quiet_engine();
    assert_eq!(
        assert_rejected(&mut engine, Command::Tick),
        CommandError::NotStarted
    );
    engine.apply(Command::StartSimulation).unwrap();
    assert_eq!(
        assert_rejected(&mut engine, Command::StartSimulation),
        CommandError::AlreadyStarted
    );
    let err = assert_rejected(
        &mut engine,
        Command::AdjustGamePace {
            pace: Fixed64::from_num(100),
        },
    );
    assert_eq!(err.class(), ErrorClass::Malformed);
}

/// A long unattended run with debt piling up never panics.
#[test]
fn long_run_in_debt_is_stable() {
    let mut config = test_config();
    config.starting_cash = money(1000);
    config.orders.spawn_chance = fixed(1.0);
    config.workforce.candidate_spawn_chance = fixed(1.0);
    let mut engine = engine_with(config);
    let worker = spawn_worker(&mut engine, Stage::Quality, 1);
    engine.apply(Command::HireWorker { worker }).unwrap();
    engine.apply(Command::StartSimulation).unwrap();

    tick_n(&mut engine, 1000);
    let state = engine.snapshot();
    assert_eq!(state.day(), 1001);
    assert!(state.cash() < Money::ZERO);
    assert!(!state.is_bankrupt());
    assert!(state.available_orders().count() + state.active_orders().count() <= 5);
    assert!(state.candidates().count() <= 5);
}
