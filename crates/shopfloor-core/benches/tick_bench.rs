//! Criterion benchmarks for the shopfloor engine.
//!
//! Three benchmark groups:
//! - `tick`: one day on a stock campaign and on a large staffed factory
//! - `commands`: a buy-and-assign round trip
//! - `snapshot`: serialize and deserialize a factory mid-campaign

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use shopfloor_core::command::Command;
use shopfloor_core::config::EngineConfig;
use shopfloor_core::engine::Engine;
use shopfloor_core::id::*;
use shopfloor_core::test_utils::*;

// ===========================================================================
// Factory builders
// ===========================================================================

/// The stock campaign, started, with the assembly machine busy.
fn build_stock_factory() -> Engine {
    let mut engine = engine_with(EngineConfig::default());
    let assembly = first_machine(&engine, Stage::Assembly);
    engine
        .apply(Command::AssignMachine {
            machine: assembly,
            product: ProductKind::Laptop,
        })
        .unwrap();
    engine.apply(Command::StartSimulation).unwrap();
    engine
}

/// 60 machines per stage, each assembly machine on a job, 100 hired workers
/// spread over the fleet.
fn build_large_factory() -> Engine {
    let mut config = flawless_config();
    config.starting_fleet.clear();
    config.starting_cash = money(1_000_000);
    let mut engine = engine_with(config);

    for stage in Stage::ALL {
        for _ in 0..60 {
            install_machine(&mut engine, stage);
        }
    }
    let assembly = machines_in(&engine, Stage::Assembly);
    for (i, machine) in assembly.iter().enumerate() {
        let product = ProductKind::ALL[i % 3];
        force_job(&mut engine, *machine, product, fixed(100.0 + i as f64));
    }

    let fleet: Vec<MachineId> = engine.snapshot().machines().map(|(id, _)| id).collect();
    for i in 0..100 {
        let stage = Stage::ALL[i % 3];
        let worker = hire_worker(&mut engine, stage, 1 + (i as u32 % 3));
        engine
            .apply(Command::AssignWorker {
                worker,
                machine: fleet[i % fleet.len()],
            })
            .unwrap();
    }
    engine.apply(Command::StartSimulation).unwrap();
    engine
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    let mut stock = build_stock_factory();
    group.bench_function("stock_campaign", |b| {
        b.iter(|| stock.apply(Command::Tick).unwrap());
    });

    let large = build_large_factory();
    group.bench_function("large_factory_180_machines", |b| {
        b.iter_batched(
            || large.serialize().map(|d| Engine::deserialize(&d).unwrap()).unwrap(),
            |mut e| {
                for _ in 0..10 {
                    e.apply(Command::Tick).unwrap();
                }
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn bench_commands(c: &mut Criterion) {
    let mut group = c.benchmark_group("commands");
    let engine = quiet_engine();
    let assembly = first_machine(&engine, Stage::Assembly);

    group.bench_function("buy_assign_unassign", |b| {
        b.iter_batched(
            quiet_engine,
            |mut e| {
                e.apply(Command::BuyResource {
                    kind: ResourceKind::Electronics,
                    amount: 10,
                })
                .unwrap();
                e.apply(Command::AssignMachine {
                    machine: assembly,
                    product: ProductKind::Phone,
                })
                .unwrap();
                e.apply(Command::UnassignMachine { machine: assembly })
                    .unwrap();
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    let mut engine = build_large_factory();
    tick_n(&mut engine, 20);

    group.bench_function("serialize_large_factory", |b| {
        b.iter(|| engine.serialize().unwrap());
    });

    let data = engine.serialize().unwrap();
    group.bench_function("deserialize_large_factory", |b| {
        b.iter(|| Engine::deserialize(&data).unwrap());
    });

    group.bench_function("state_hash_large_factory", |b| {
        b.iter(|| engine.state_hash());
    });

    group.finish();
}

criterion_group!(benches, bench_tick, bench_commands, bench_snapshot);
criterion_main!(benches);
