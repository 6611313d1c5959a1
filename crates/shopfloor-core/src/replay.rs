//! Replay recording and playback for debugging and determinism checks.
//!
//! Records the commands applied to an engine, starting from a serialized
//! snapshot. Playing the log back reproduces the exact same simulation, with
//! optional hash verification at checkpoints. Rejected commands are recorded
//! too; they must be rejected again on playback.

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::engine::{CommandOutcome, Engine};
use crate::error::CommandError;
use crate::serialize::{DeserializeError, SerializeError};

// ---------------------------------------------------------------------------
// ReplayCommand
// ---------------------------------------------------------------------------

/// A recorded input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplayCommand {
    Apply(Command),
    Advance { elapsed_ms: u64 },
}

// ---------------------------------------------------------------------------
// ReplayMismatch
// ---------------------------------------------------------------------------

/// Where replay verification failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayMismatch {
    pub command_index: usize,
    pub expected_hash: u64,
    pub actual_hash: u64,
}

// ---------------------------------------------------------------------------
// ReplayLog
// ---------------------------------------------------------------------------

/// A recorded sequence of commands starting from a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayLog {
    /// Serialized engine at the start of recording.
    pub initial_snapshot: Vec<u8>,
    pub commands: Vec<ReplayCommand>,
    /// Hash checkpoints: (command_index, state_hash).
    pub hash_checkpoints: Vec<(usize, u64)>,
}

impl ReplayLog {
    /// Start a log from the engine's current state.
    pub fn new(engine: &Engine) -> Result<Self, SerializeError> {
        Ok(Self {
            initial_snapshot: engine.serialize()?,
            commands: Vec::new(),
            hash_checkpoints: Vec::new(),
        })
    }

    pub fn record(&mut self, cmd: ReplayCommand) {
        self.commands.push(cmd);
    }

    pub fn record_with_hash(&mut self, cmd: ReplayCommand, hash: u64) {
        let index = self.commands.len();
        self.commands.push(cmd);
        self.hash_checkpoints.push((index, hash));
    }

    /// Apply `command` to `engine` and record it with the resulting hash.
    pub fn apply(
        &mut self,
        engine: &mut Engine,
        command: Command,
    ) -> Result<CommandOutcome, CommandError> {
        let result = engine.apply(command.clone());
        self.record_with_hash(ReplayCommand::Apply(command), engine.state_hash());
        result
    }

    /// Advance `engine` by wall-clock time and record it with the resulting hash.
    pub fn advance(&mut self, engine: &mut Engine, elapsed_ms: u64) {
        engine.advance(elapsed_ms);
        self.record_with_hash(ReplayCommand::Advance { elapsed_ms }, engine.state_hash());
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        bitcode::serialize(self).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, DeserializeError> {
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// ReplayResult
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ReplayResult {
    pub commands_executed: usize,
    /// Whether all hash checkpoints matched.
    pub is_verified: bool,
    pub first_mismatch: Option<ReplayMismatch>,
}

// ---------------------------------------------------------------------------
// Replay execution
// ---------------------------------------------------------------------------

fn apply_command(engine: &mut Engine, cmd: &ReplayCommand) {
    match cmd {
        ReplayCommand::Apply(command) => {
            // Rejections are part of the recording; the state is unchanged.
            let _ = engine.apply(command.clone());
        }
        ReplayCommand::Advance { elapsed_ms } => {
            engine.advance(*elapsed_ms);
        }
    }
}

/// Replay a log and verify hash checkpoints.
pub fn replay_and_verify(log: &ReplayLog) -> Result<ReplayResult, DeserializeError> {
    let mut engine = Engine::deserialize(&log.initial_snapshot)?;

    let mut first_mismatch: Option<ReplayMismatch> = None;
    let mut checkpoint_idx = 0;

    for (i, cmd) in log.commands.iter().enumerate() {
        apply_command(&mut engine, cmd);

        while checkpoint_idx < log.hash_checkpoints.len()
            && log.hash_checkpoints[checkpoint_idx].0 == i
        {
            let (_, expected_hash) = log.hash_checkpoints[checkpoint_idx];
            let actual_hash = engine.state_hash();
            if actual_hash != expected_hash && first_mismatch.is_none() {
                log::warn!(
                    "replay diverged at command {i}: expected {expected_hash:#018x}, got {actual_hash:#018x}"
                );
                first_mismatch = Some(ReplayMismatch {
                    command_index: i,
                    expected_hash,
                    actual_hash,
                });
            }
            checkpoint_idx += 1;
        }
    }

    Ok(ReplayResult {
        commands_executed: log.commands.len(),
        is_verified: first_mismatch.is_none(),
        first_mismatch,
    })
}

/// Replay a log without verification, returning the final engine.
pub fn replay(log: &ReplayLog) -> Result<Engine, DeserializeError> {
    let mut engine = Engine::deserialize(&log.initial_snapshot)?;
    for cmd in &log.commands {
        apply_command(&mut engine, cmd);
    }
    Ok(engine)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{ProductKind, ResourceKind, Stage};
    use crate::test_utils::*;

    fn campaign() -> Engine {
        engine_with(brisk_config())
    }

    fn record_session(engine: &mut Engine) -> ReplayLog {
        let mut log = ReplayLog::new(engine).unwrap();
        let assembly = first_machine(engine, Stage::Assembly);
        log.apply(
            engine,
            Command::BuyResource {
                kind: ResourceKind::Electronics,
                amount: 20,
            },
        )
        .unwrap();
        log.apply(
            engine,
            Command::AssignMachine {
                machine: assembly,
                product: ProductKind::Phone,
            },
        )
        .unwrap();
        log.apply(engine, Command::StartSimulation).unwrap();
        for _ in 0..12 {
            log.apply(engine, Command::Tick).unwrap();
        }
        log.advance(engine, 35_000);
        log
    }

    #[test]
    fn replay_log_captures_initial_state() {
        let engine = campaign();
        let log = ReplayLog::new(&engine).unwrap();
        assert!(!log.initial_snapshot.is_empty());
        assert_eq!(log.command_count(), 0);
        assert!(log.hash_checkpoints.is_empty());
    }

    #[test]
    fn replay_empty_log_returns_initial_state() {
        let engine = campaign();
        let log = ReplayLog::new(&engine).unwrap();
        let replayed = replay(&log).unwrap();
        assert_eq!(replayed.state_hash(), engine.state_hash());
    }

    #[test]
    fn recorded_session_verifies() {
        let mut engine = campaign();
        let log = record_session(&mut engine);
        assert_eq!(log.command_count(), 16);

        let result = replay_and_verify(&log).unwrap();
        assert!(result.is_verified, "mismatch: {:?}", result.first_mismatch);
        assert_eq!(result.commands_executed, 16);
        assert_eq!(replay(&log).unwrap().state_hash(), engine.state_hash());
    }

    #[test]
    fn rejected_commands_replay_as_rejections() {
        let mut engine = campaign();
        let mut log = ReplayLog::new(&engine).unwrap();
        assert!(log.apply(&mut engine, Command::Tick).is_err());
        log.apply(&mut engine, Command::StartSimulation).unwrap();
        log.apply(&mut engine, Command::Tick).unwrap();
        assert!(replay_and_verify(&log).unwrap().is_verified);
    }

    #[test]
    fn tampered_checkpoint_is_reported() {
        let mut engine = campaign();
        let mut log = record_session(&mut engine);
        log.hash_checkpoints[5].1 ^= 1;

        let result = replay_and_verify(&log).unwrap();
        assert!(!result.is_verified);
        let mismatch = result.first_mismatch.unwrap();
        assert_eq!(mismatch.command_index, 5);
    }

    #[test]
    fn log_survives_serialization() {
        let mut engine = campaign();
        let log = record_session(&mut engine);
        let restored = ReplayLog::deserialize(&log.serialize().unwrap()).unwrap();
        assert_eq!(restored.commands, log.commands);
        assert_eq!(restored.hash_checkpoints, log.hash_checkpoints);
        assert!(replay_and_verify(&restored).unwrap().is_verified);
    }
}
