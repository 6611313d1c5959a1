//! Save/load example: snapshots, replay logs and desync diagnosis.
//!
//! Records a short campaign, saves it mid-way, restores the snapshot and
//! shows that the restored engine and a replay of the log both end on the
//! same state hash.
//!
//! Run with: `cargo run -p shopfloor-core --example save_load`

use shopfloor_core::command::Command;
use shopfloor_core::config::EngineConfig;
use shopfloor_core::engine::Engine;
use shopfloor_core::id::*;
use shopfloor_core::replay::{ReplayLog, replay_and_verify};
use shopfloor_core::serialize::read_snapshot_header;

fn main() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    let mut log = ReplayLog::new(&engine).unwrap();

    let assembly = engine
        .snapshot()
        .machines()
        .find(|(_, m)| m.stage == Stage::Assembly)
        .map(|(id, _)| id)
        .unwrap();

    log.apply(&mut engine, Command::StartSimulation).unwrap();
    log.apply(
        &mut engine,
        Command::AssignMachine {
            machine: assembly,
            product: ProductKind::Tablet,
        },
    )
    .unwrap();
    for _ in 0..10 {
        log.apply(&mut engine, Command::Tick).unwrap();
    }

    // --- Save ---

    let save = engine.serialize().unwrap();
    let header = read_snapshot_header(&save).unwrap();
    println!(
        "saved day {} ({} bytes, format v{})",
        header.day,
        save.len(),
        header.version
    );

    // --- Continue both the original and the restored copy ---

    let mut restored = Engine::deserialize(&save).unwrap();
    for _ in 0..10 {
        log.apply(&mut engine, Command::Tick).unwrap();
        restored.apply(Command::Tick).unwrap();
    }
    println!("original hash: {:#018x}", engine.state_hash());
    println!("restored hash: {:#018x}", restored.state_hash());

    let diff = engine.subsystem_hashes().diff(&restored.subsystem_hashes());
    if diff.is_empty() {
        println!("no desync");
    } else {
        println!("desync in: {}", diff.join(", "));
    }

    // --- Replay the whole log from its initial snapshot ---

    let result = replay_and_verify(&log).unwrap();
    println!(
        "replayed {} commands, verified: {}",
        result.commands_executed, result.is_verified
    );
}
